//! Environment variable expansion for configuration strings.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable pattern is valid")
});

/// A source of variable values.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads variables from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Lookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Lookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Replaces `${NAME}` and `$NAME` with their values. Unknown variables are
/// left as written.
pub fn expand(input: &str, lookup: &impl Lookup) -> String {
    VARIABLE
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            lookup
                .lookup(name)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Trims a value and maps a blank result to `None`.
#[must_use]
pub fn fix_empty_and_trim(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Expands a value, then trims it. Blank results become `None`.
pub fn expand_field(value: &str, lookup: &impl Lookup) -> Option<String> {
    fix_empty_and_trim(&expand(value, lookup))
}

/// Returns true if the value references a variable and cannot be checked
/// until it is expanded.
#[must_use]
pub fn is_templated(value: &str) -> bool {
    value.contains('$')
}
