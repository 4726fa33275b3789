//! Environment interpolation for configuration files.
//!
//! `${NAME}` is replaced by the value of environment variable `NAME`
//! (`[A-Za-z0-9_]+`). Unset or empty variables leave the placeholder in
//! place; callers get the names back so they can report them.

use buildhook_core::EnvSource;
use regex::Regex;
use std::sync::LazyLock;

// Regex for matching ${NAME} placeholders
static VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap());

/// Result of interpolating a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub text: String,
    /// Placeholders left untouched, in order of first appearance.
    pub unresolved: Vec<String>,
}

impl Interpolated {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Substitute `${NAME}` tokens in `input` from `env`.
pub fn interpolate(input: &str, env: &dyn EnvSource) -> Interpolated {
    let mut unresolved: Vec<String> = Vec::new();

    let text = VAR_REGEX
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[1];
            match env.var(name) {
                Some(value) => value,
                None => {
                    if !unresolved.iter().any(|u| u == name) {
                        unresolved.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        })
        .to_string();

    Interpolated { text, unresolved }
}
