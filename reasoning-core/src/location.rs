//! `CodeLocation` — a tolerant `file:line` location reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A location within a source file.
///
/// Parsing is tolerant: a missing line becomes `0`, a missing file becomes
/// `"unknown"`. The canonical string form is `file:line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Path of the file, as supplied by the client.
    pub file: String,
    /// 0-based or 1-based line number, as supplied by the client. Never negative.
    pub line: u32,
    /// Optional column within the line.
    pub column: Option<u32>,
    /// Optional enclosing function name.
    pub function_name: Option<String>,
}

impl CodeLocation {
    /// Build a location with only file and line known.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
            function_name: None,
        }
    }

    /// A location used when nothing could be determined.
    pub fn unknown() -> Self {
        Self::new("unknown", 0)
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for CodeLocation {
    type Err = std::convert::Infallible;

    /// Tolerant parse of `file:line`. Never fails: malformed input degrades
    /// to `unknown:0` or to whatever pieces could be salvaged.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::unknown());
        }
        match s.rsplit_once(':') {
            Some((file, line_str)) if !file.is_empty() => {
                let line = line_str.trim().parse::<u32>().unwrap_or(0);
                Ok(Self::new(file, line))
            }
            _ => Ok(Self::new(s, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_location() {
        let loc: CodeLocation = "src/main.rs:42".parse().unwrap();
        assert_eq!(loc.file, "src/main.rs");
        assert_eq!(loc.line, 42);
    }

    #[test]
    fn missing_line_defaults_to_zero() {
        let loc: CodeLocation = "src/main.rs".parse().unwrap();
        assert_eq!(loc.file, "src/main.rs");
        assert_eq!(loc.line, 0);
    }

    #[test]
    fn empty_string_is_unknown() {
        let loc: CodeLocation = "".parse().unwrap();
        assert_eq!(loc, CodeLocation::unknown());
    }

    #[test]
    fn non_numeric_line_defaults_to_zero() {
        let loc: CodeLocation = "foo.rs:bar".parse().unwrap();
        assert_eq!(loc.line, 0);
        assert_eq!(loc.file, "foo.rs");
    }

    #[test]
    fn display_is_canonical_form() {
        let loc = CodeLocation::new("a.rs", 7);
        assert_eq!(loc.to_string(), "a.rs:7");
    }

    #[test]
    fn roundtrip_for_well_formed_locations() {
        let loc = CodeLocation::new("pkg/mod.rs", 13);
        let parsed: CodeLocation = loc.to_string().parse().unwrap();
        assert_eq!(loc, parsed);
    }

    proptest::proptest! {
        #[test]
        fn roundtrip_holds_for_any_file_without_colon(file in "[a-zA-Z0-9_./]{1,40}", line in 0u32..100_000) {
            let loc = CodeLocation::new(file, line);
            let parsed: CodeLocation = loc.to_string().parse().unwrap();
            proptest::prop_assert_eq!(loc, parsed);
        }
    }
}
