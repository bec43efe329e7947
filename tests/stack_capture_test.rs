//! Stack capture over synthetic call chains.

mod common;

use common::chain::descend;
use opcursor::StackCapture;

fn in_chain(frame: &opcursor::StackFrame) -> bool {
    frame
        .file
        .as_deref()
        .is_some_and(|f| f.to_string_lossy().ends_with("chain.rs"))
}

#[test]
fn test_capture_stops_at_first_external_frame() {
    // everything outside chain.rs counts as external, so the walk must end
    // at this test function
    let capture = StackCapture::default()
        .with_boundary(|path| !path.to_string_lossy().ends_with("chain.rs"));

    let frames = descend(&capture, 5);

    assert_eq!(frames.len(), 6, "{:#?}", frames);
    assert!(frames.iter().all(in_chain), "{:#?}", frames);
}

#[test]
fn test_capture_never_exceeds_max_depth() {
    let capture = StackCapture::default().with_boundary(|_| false);
    assert_eq!(capture.max_depth(), 32);

    let frames = descend(&capture, 50);

    assert_eq!(frames.len(), 32);
    assert!(frames.iter().all(in_chain));
}

#[test]
fn test_shallow_chain_with_default_boundary() {
    let capture = StackCapture::default();

    let frames = descend(&capture, 2);

    assert!(frames.len() >= 3, "{:#?}", frames);
    assert!(frames[..3].iter().all(in_chain));
    // the test harness frames that follow live in toolchain sources
    for frame in &frames {
        assert!(!capture.is_external(frame), "{:?}", frame);
    }
}

#[test]
fn test_rendered_lines_are_indexed() {
    let capture = StackCapture::default().with_boundary(|_| false);
    let frames = descend(&capture, 3);
    let rendered = StackCapture::render(&frames);

    assert_eq!(rendered.len(), frames.len());
    assert!(rendered[0].starts_with("0)\t"));
    assert!(rendered[0].contains("chain.rs:"));
    assert!(rendered[3].starts_with("3)\t"));
}
