use regex::Regex;

/// Compiled match pattern for log lines
///
/// Compiled once at startup; matching is an unanchored search over the raw
/// line text.
#[derive(Clone, Debug)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern from its source string
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(source)?,
        })
    }

    /// Check if a log line contains a match anywhere
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Get the original pattern source
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
