use regex::Regex;
use std::sync::LazyLock;

/// Compiled regex patterns that are reused across the codebase
pub struct RegexPatterns;

impl RegexPatterns {
    /// Template variable placeholder (`{{1}}`, `{{ 2 }}`, ...)
    pub fn template_placeholder() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\{\{\s*(\d+)\s*\}\}")
                .expect("Failed to compile template placeholder regex")
        });
        &RE
    }
}
