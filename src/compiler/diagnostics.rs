// src/compiler/diagnostics.rs

//! Turning engine-reported compilation errors into one readable message.

use std::sync::LazyLock;

use regex::Regex;

static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*at .*").expect("stack frame pattern is valid"));

static PREVIOUS_EVENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"From previous event:\n?").expect("previous event pattern is valid")
});

/// Strip stack-frame lines (`\n    at ...`) and `From previous event:`
/// markers from a single error message.
pub fn cleanse_error(message: &str) -> String {
    let without_frames = STACK_FRAME.replace_all(message, "");
    PREVIOUS_EVENT.replace_all(&without_frames, "").into_owned()
}

/// Normalize every error and join them with a blank line.
pub fn compilation_message<S: AsRef<str>>(errors: &[S]) -> String {
    errors
        .iter()
        .map(|e| cleanse_error(e.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
