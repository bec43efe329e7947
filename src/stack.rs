//! Failure stack capture.
//!
//! Walks the stack above the caller, expanding inlined calls into their own
//! logical frames, and keeps frames only until the first one whose source
//! file lies outside the application (dependency registry or toolchain
//! sources by default). The boundary test is injectable.

use crate::config::{CursorConfig, DEFAULT_EXTERNAL_PATH_MARKERS, DEFAULT_MAX_STACK_DEPTH};
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound on physical frames inspected in one walk
const WALK_LIMIT: usize = 256;

const CAPTURE_PATH: &str = concat!(module_path!(), "::StackCapture::capture");

/// Decides whether a frame's source file is outside the application.
pub type FrameBoundary = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// One logical frame. Inlined calls share the `ip` of their physical frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub ip: usize,
    pub function: Option<String>,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl StackFrame {
    /// `file:line`, or `unknown` when the frame has no source location.
    pub fn location(&self) -> String {
        match &self.file {
            Some(file) => format!("{}:{}", file.display(), self.line.unwrap_or(0)),
            None => "unknown".to_string(),
        }
    }
}

/// The `#[inline(never)]` function a walk starts above.
///
/// Matched on its entry address first. Symbol names are only a fallback:
/// with `debug = "line-tables-only"` they come back without a module path,
/// so the bare last segment is accepted as well.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Anchor {
    addr: usize,
    path: &'static str,
}

impl Anchor {
    pub(crate) const fn new(addr: usize, path: &'static str) -> Self {
        Self { addr, path }
    }

    fn matches_address(&self, addr: Option<usize>) -> bool {
        self.addr != 0 && addr == Some(self.addr)
    }

    fn matches_name(&self, function: &str) -> bool {
        let bare = self.path.rsplit("::").next().unwrap_or(self.path);
        function == self.path || function == bare
    }
}

fn address(ptr: *mut c_void) -> Option<usize> {
    (!ptr.is_null()).then_some(ptr as usize)
}

/// Logical frames for one physical frame, innermost first. Never empty.
fn resolve_physical(ip: usize, anchor: &Anchor) -> (Vec<StackFrame>, bool) {
    let mut symbols = Vec::new();
    let mut anchored = false;
    // resolve() aligns the return address onto the call instruction
    backtrace::resolve(ip as *mut c_void, |symbol| {
        let function = symbol.name().map(|name| format!("{:#}", name));
        anchored |= anchor.matches_address(symbol.addr().and_then(address))
            || function.as_deref().is_some_and(|f| anchor.matches_name(f));
        symbols.push(StackFrame {
            ip,
            function,
            file: symbol.filename().map(Path::to_path_buf),
            line: symbol.lineno(),
        });
    });
    if symbols.is_empty() {
        symbols.push(StackFrame {
            ip,
            function: None,
            file: None,
            line: None,
        });
    }
    (symbols, anchored)
}

/// Logical frames above the physical frame of `anchor`, after skipping `skip`
/// more, at most `limit` of them. Empty only when the anchor's frame cannot
/// be found at all; frames that fail to resolve are kept without a location.
pub(crate) fn frames_above(anchor: &Anchor, skip: usize, limit: usize) -> Vec<StackFrame> {
    let mut walked = Vec::with_capacity(64);
    backtrace::trace(|frame| {
        walked.push((frame.ip() as usize, address(frame.symbol_address())));
        walked.len() < WALK_LIMIT
    });

    let mut frames = Vec::new();
    let mut anchored = false;
    let mut skipped = 0;

    'walk: for (ip, symbol_address) in walked {
        let (symbols, is_anchor) = resolve_physical(ip, anchor);
        if !anchored {
            // the anchor is never inlined, so nothing of its caller shares
            // this physical frame
            anchored = anchor.matches_address(symbol_address) || is_anchor;
            continue;
        }

        for frame in symbols {
            if skipped < skip {
                skipped += 1;
                continue;
            }
            if frames.len() >= limit {
                break 'walk;
            }
            frames.push(frame);
        }
    }

    frames
}

/// True when the path contains one of the markers. Windows separators are
/// normalised first.
pub fn path_has_marker<S: AsRef<str>>(path: &Path, markers: &[S]) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/");
    markers
        .iter()
        .any(|marker| normalized.contains(marker.as_ref()))
}

#[derive(Clone)]
pub struct StackCapture {
    max_depth: usize,
    boundary: FrameBoundary,
}

impl fmt::Debug for StackCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackCapture")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Default for StackCapture {
    fn default() -> Self {
        Self::with_markers(
            DEFAULT_MAX_STACK_DEPTH,
            DEFAULT_EXTERNAL_PATH_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        )
    }
}

impl StackCapture {
    /// Boundary decided by path markers
    pub fn with_markers(max_depth: usize, markers: Vec<String>) -> Self {
        Self {
            max_depth,
            boundary: Arc::new(move |path: &Path| path_has_marker(path, &markers)),
        }
    }

    pub fn from_config(config: &CursorConfig) -> Self {
        Self::with_markers(config.max_stack_depth, config.external_path_markers.clone())
    }

    /// Replace the external-frame test
    pub fn with_boundary<F>(mut self, boundary: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.boundary = Arc::new(boundary);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Frames without a source file are kept.
    pub fn is_external(&self, frame: &StackFrame) -> bool {
        frame.file.as_deref().is_some_and(|file| (self.boundary)(file))
    }

    /// Capture application frames starting `skip` frames above the caller.
    /// `skip == 0` starts at the function that called `capture`.
    #[inline(never)]
    pub fn capture(&self, skip: usize) -> Vec<StackFrame> {
        let anchor = Anchor::new(
            (Self::capture as fn(&Self, usize) -> Vec<StackFrame>) as usize,
            CAPTURE_PATH,
        );
        let mut frames = frames_above(&anchor, skip, self.max_depth);
        if let Some(boundary) = frames.iter().position(|frame| self.is_external(frame)) {
            frames.truncate(boundary);
        }
        frames
    }

    /// One `"<index>)\t<file>:<line>"` line per frame
    pub fn render(frames: &[StackFrame]) -> Vec<String> {
        frames
            .iter()
            .enumerate()
            .map(|(i, frame)| format!("{})\t{}", i, frame.location()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(file: Option<&str>, line: Option<u32>) -> StackFrame {
        StackFrame {
            ip: 0x1000,
            function: None,
            file: file.map(PathBuf::from),
            line,
        }
    }

    #[test]
    fn test_default_markers_flag_dependency_sources() {
        let capture = StackCapture::default();

        assert!(capture.is_external(&frame(
            Some("/home/dev/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.46.1/src/runtime/task/mod.rs"),
            Some(10),
        )));
        assert!(capture.is_external(&frame(
            Some("/rustc/90b35a6239c3d8bdabc530a6a0816f7ff89a0aaf/library/core/src/ops/function.rs"),
            Some(250),
        )));
        assert!(capture.is_external(&frame(
            Some(r"C:\Users\dev\.cargo\registry\src\serde-1.0.219\src\de.rs"),
            Some(1),
        )));
        assert!(!capture.is_external(&frame(Some("src/handlers/orders.rs"), Some(42))));
        assert!(!capture.is_external(&frame(None, None)));
    }

    #[test]
    fn test_injected_boundary() {
        let capture = StackCapture::default().with_boundary(|path| path.ends_with("vendored.rs"));
        assert!(capture.is_external(&frame(Some("src/vendored.rs"), Some(3))));
        assert!(!capture.is_external(&frame(
            Some("/home/dev/.cargo/registry/src/x/lib.rs"),
            Some(3)
        )));
    }

    #[test]
    fn test_render_format() {
        let frames = vec![
            frame(Some("src/orders.rs"), Some(42)),
            frame(Some("src/main.rs"), None),
            frame(None, None),
        ];

        assert_eq!(
            StackCapture::render(&frames),
            vec!["0)\tsrc/orders.rs:42", "1)\tsrc/main.rs:0", "2)\tunknown"]
        );
    }

    #[test]
    fn test_capture_respects_max_depth() {
        let capture = StackCapture::default()
            .with_boundary(|_| false)
            .with_max_depth(2);
        assert!(capture.capture(0).len() <= 2);
    }

    #[inline(never)]
    fn walk_from_address() -> Vec<StackFrame> {
        let anchor = Anchor::new(
            (walk_from_address as fn() -> Vec<StackFrame>) as usize,
            "nowhere::unmatched",
        );
        let frames = frames_above(&anchor, 0, 4);
        std::hint::black_box(frames)
    }

    #[inline(never)]
    fn walk_from_name() -> Vec<StackFrame> {
        let anchor = Anchor::new(0, concat!(module_path!(), "::walk_from_name"));
        let frames = frames_above(&anchor, 0, 4);
        std::hint::black_box(frames)
    }

    fn first_function(frames: &[StackFrame]) -> &str {
        frames
            .first()
            .and_then(|frame| frame.function.as_deref())
            .unwrap_or_default()
    }

    #[test]
    fn test_anchor_found_by_address() {
        let frames = walk_from_address();
        assert!(
            first_function(&frames).ends_with("test_anchor_found_by_address"),
            "{:#?}",
            frames
        );
    }

    #[test]
    fn test_anchor_found_by_bare_name() {
        let frames = walk_from_name();
        assert!(
            first_function(&frames).ends_with("test_anchor_found_by_bare_name"),
            "{:#?}",
            frames
        );
    }

    #[test]
    fn test_anchor_name_match() {
        let anchor = Anchor::new(0, "opcursor::naming::resolve");
        assert!(anchor.matches_name("opcursor::naming::resolve"));
        assert!(anchor.matches_name("resolve"));
        assert!(!anchor.matches_name("trace"));
        assert!(!anchor.matches_address(Some(0)));
    }

    #[test]
    fn test_from_config() {
        let config = CursorConfig {
            max_stack_depth: 4,
            external_path_markers: vec!["/vendor/".into()],
            ..Default::default()
        };
        let capture = StackCapture::from_config(&config);
        assert_eq!(capture.max_depth(), 4);
        assert!(capture.is_external(&frame(Some("/srv/app/vendor/x.rs"), Some(1))));
        assert!(!capture.is_external(&frame(Some("/rustc/abc/library/core/src/x.rs"), Some(1))));
    }
}
