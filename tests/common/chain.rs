//! Recursive call chain living in its own source file, so stack tests can
//! tell its frames apart from the test function's.

use opcursor::{StackCapture, StackFrame};
use std::hint::black_box;

/// Recurse `depth` times, then capture from the innermost call.
#[inline(never)]
pub fn descend(capture: &StackCapture, depth: usize) -> Vec<StackFrame> {
    if depth == 0 {
        // not a tail call, so this frame survives optimization
        let frames = capture.capture(0);
        return black_box(frames);
    }
    let frames = descend(capture, black_box(depth - 1));
    black_box(frames)
}
