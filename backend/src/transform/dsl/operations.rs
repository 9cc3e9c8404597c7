//! DSL Operations for cleaning feed values
//!
//! Operations are applied in order to the raw string read from a feed column
//! before the executor types it as a date, quantity or text.

use serde::{Deserialize, Serialize};

/// All available cleaning operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Remove every occurrence of the given characters
    RemoveChars { chars: String },

    /// Keep the path segment after the first separator, up to the next one.
    /// Values without the separator are left alone.
    PathSegment {
        #[serde(default = "default_path_separator")]
        separator: String,
    },

    /// Keep everything before the first separator
    BeforeFirst { separator: String },

    /// Turn non-breaking and full-width spaces into ordinary spaces
    NormalizeSpaces,
}

fn default_path_separator() -> String {
    ":".to_string()
}

impl Operation {
    /// Apply this operation to a value
    pub fn apply(&self, value: &str) -> String {
        match self {
            Operation::Trim => value.trim().to_string(),
            Operation::Uppercase => value.to_uppercase(),
            Operation::Replace { pattern, value: replacement } => {
                Self::apply_replace(value, pattern, replacement)
            }
            Operation::RemoveChars { chars } => {
                value.chars().filter(|c| !chars.contains(*c)).collect()
            }
            Operation::PathSegment { separator } => Self::apply_path_segment(value, separator),
            Operation::BeforeFirst { separator } => Self::apply_before_first(value, separator),
            Operation::NormalizeSpaces => normalize_spaces(value),
        }
    }

    fn apply_replace(value: &str, pattern: &str, replacement: &str) -> String {
        match regex::Regex::new(pattern) {
            Ok(re) => re.replace_all(value, replacement).to_string(),
            Err(_) => value.to_string(),
        }
    }

    fn apply_path_segment(value: &str, separator: &str) -> String {
        if separator.is_empty() || !value.contains(separator) {
            return value.to_string();
        }
        value.split(separator).nth(1).unwrap_or("").to_string()
    }

    fn apply_before_first(value: &str, separator: &str) -> String {
        if separator.is_empty() {
            return value.to_string();
        }
        match value.find(separator) {
            Some(idx) => value[..idx].to_string(),
            None => value.to_string(),
        }
    }
}

/// Replace U+00A0 (no-break space) and U+3000 (ideographic space) with ' '.
pub fn normalize_spaces(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available cleaning operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| remove_chars | Drop every listed character | chars: characters to drop |
| path_segment | Segment after the first separator (identity if absent) | separator (default ":") |
| before_first | Everything before the first separator | separator |
| normalize_spaces | No-break / full-width spaces to ' ' | - |

Example operations in JSON:
[
  {"type": "path_segment", "separator": ":"},
  {"type": "remove_chars", "chars": "*"},
  {"type": "before_first", "separator": "("},
  {"type": "trim"}
]"#
    .to_string()
}
