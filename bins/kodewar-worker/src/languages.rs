//! Language dispatch table.
//!
//! The set of executable languages is closed: adding one means adding a
//! [`Language`] variant, a sandbox image, and an entry here, reviewed
//! together. Nothing is loaded from config files at runtime.

use base64::{engine::general_purpose, Engine as _};
use kodewar_common::types::Language;

/// How to run one language inside its sandbox image.
pub struct LanguageSpec {
    pub image: &'static str,
    /// Where the decoded source lands on the tmpfs scratch mount.
    pub source_path: &'static str,
    pub interpreter: &'static [&'static str],
}

static PYTHON: LanguageSpec = LanguageSpec {
    image: "kodewar-python:latest",
    source_path: "/tmp/solution.py",
    interpreter: &["python3", "-u"],
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    image: "kodewar-javascript:latest",
    source_path: "/tmp/solution.js",
    interpreter: &["node"],
};

pub fn spec_for(language: Language) -> &'static LanguageSpec {
    match language {
        Language::Python => &PYTHON,
        Language::Javascript => &JAVASCRIPT,
    }
}

/// Build the container command for a language.
///
/// The shell decodes the source onto the scratch mount, then pipes the
/// decoded test input into the interpreter's stdin. Payloads travel in
/// env vars so the command line stays free of user content.
pub fn build_command(language: Language) -> Vec<String> {
    let spec = spec_for(language);
    let pipeline = format!(
        "echo \"$SOURCE_CODE\" | base64 -d > {path} && echo \"$TEST_INPUT\" | base64 -d | {interpreter} {path}",
        path = spec.source_path,
        interpreter = spec.interpreter.join(" "),
    );
    vec!["/bin/sh".to_string(), "-c".to_string(), pipeline]
}

/// Encode the submission payload for transport into the container.
pub fn build_env(code: &str, test_input: &str) -> Vec<String> {
    vec![
        format!("SOURCE_CODE={}", general_purpose::STANDARD.encode(code)),
        format!("TEST_INPUT={}", general_purpose::STANDARD.encode(test_input)),
    ]
}
