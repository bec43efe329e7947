//! Operation names derived from the calling function.
//!
//! [`resolve`] reads the function `skip` frames above its immediate caller and
//! turns the demangled path into a label-safe token. The skip count is a
//! contract: every wrapper between the measured function and `resolve` must
//! add one, otherwise the wrapper's own name is reported.
//!
//! # Build requirements
//!
//! Resolution reads the binary's debug info. Inlined calls are only visible
//! as frames when line tables are present, so optimized builds need at least
//! `debug = "line-tables-only"` in their profile. Without line tables the
//! caller cannot be told apart from whatever it was inlined into, and
//! `resolve` reports [`UNKNOWN_OPERATION`] rather than guess.
//!
//! With line tables only, symbols carry no module path, so
//! `billing::handlers::charge_card` resolves to `charge_card` instead of
//! `handlers_charge_card`.
//!
//! A wrapper that ends in a tail call to `start_cursor` disappears from an
//! optimized stack, and so does a measured function the compiler merged into
//! its caller without line tables. Mark wrappers and measured functions
//! `#[inline(never)]`, and prefer `start_named` wherever the operation name
//! is known up front.

use crate::stack::{frames_above, Anchor, StackFrame};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reported when the caller cannot be resolved.
pub const UNKNOWN_OPERATION: &str = "unknown";

/// Separator used between path tokens.
pub const SEPARATOR: &str = "_";

const RESOLVE_PATH: &str = concat!(module_path!(), "::resolve");

static LEGACY_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid hash pattern"));
static QUALIFIED_SELF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+?) as [^<>]+>").expect("valid qualified-self pattern"));
static GENERIC_ARGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>]*>").expect("valid generics pattern"));
static NON_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid label pattern"));
static REPEATED_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("valid separator pattern"));

/// Name of the function `skip` frames above the caller of `resolve`.
/// `skip == 0` names the caller itself.
#[inline(never)]
pub fn resolve(skip: usize) -> String {
    let anchor = Anchor::new((resolve as fn(usize) -> String) as usize, RESOLVE_PATH);
    operation_name(frames_above(&anchor, skip, 1).into_iter().next())
}

/// A frame without a source location came from a build without line tables,
/// where inlined callers are missing and its name may belong to another
/// function.
fn operation_name(frame: Option<StackFrame>) -> String {
    match frame {
        Some(StackFrame {
            function: Some(function),
            file: Some(_),
            ..
        }) => sanitize(&function),
        _ => UNKNOWN_OPERATION.to_string(),
    }
}

/// Turn a demangled function path into a label value.
///
/// The crate root is dropped, trait-qualified receivers collapse onto the
/// implementing type, generic arguments are removed and every remaining run
/// of punctuation becomes a single `_`. No truncation.
pub fn sanitize(function: &str) -> String {
    let mut name = LEGACY_HASH.replace(function, "").into_owned();

    // innermost brackets first, so nested generics unwrap one level per pass
    loop {
        let unqualified = QUALIFIED_SELF.replace_all(&name, "$1");
        let next = GENERIC_ARGS.replace_all(&unqualified, "").into_owned();
        if next == name {
            break;
        }
        name = next;
    }

    let segments: Vec<&str> = name.split("::").filter(|s| !s.is_empty()).collect();
    let kept = if segments.len() > 1 {
        &segments[1..]
    } else {
        &segments[..]
    };

    let joined = kept.join(SEPARATOR);
    let cleaned = NON_LABEL.replace_all(&joined, SEPARATOR);
    let collapsed = REPEATED_SEPARATOR.replace_all(&cleaned, SEPARATOR);
    let token = collapsed.trim_matches('_');

    if token.is_empty() {
        UNKNOWN_OPERATION.to_string()
    } else {
        token.to_string()
    }
}
