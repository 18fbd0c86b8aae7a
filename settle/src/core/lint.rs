//! Line-anchored diagnostics reported by steps.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Rendered in place of a line range when a lint has none.
pub const LINE_UNDEFINED: &str = "LINE_UNDEFINED";

static LEADING_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+):\s*").unwrap());
static LINE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bline\s+(\d+)\b").unwrap());

/// 1-indexed, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// A non-fatal diagnostic: a line range, a rule identifier and free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lint {
    lines: Option<LineRange>,
    short_code: String,
    detail: String,
}

impl Lint {
    /// # Panics
    ///
    /// Panics unless `1 <= line_start <= line_end`.
    pub fn new(
        line_start: usize,
        line_end: usize,
        short_code: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        assert!(
            line_start >= 1 && line_end >= line_start,
            "invalid lint range {line_start}..={line_end}"
        );
        Self {
            lines: Some(LineRange {
                start: line_start,
                end: line_end,
            }),
            short_code: short_code.into(),
            detail: detail.into(),
        }
    }

    pub fn at_line(line: usize, short_code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(line, line, short_code, detail)
    }

    /// A lint which could not be tied to any line.
    pub fn undefined(short_code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            lines: None,
            short_code: short_code.into(),
            detail: detail.into(),
        }
    }

    /// Convert a step failure into lints.
    ///
    /// Lints carried by the error are returned as-is. Otherwise the line is
    /// guessed from the message (a leading `N:` or a `line N` mention); when
    /// neither is present the lint has no line.
    pub fn from_step_error(error: &StepError) -> Vec<Lint> {
        if let StepError::Lints(lints) = error {
            return lints.clone();
        }
        let message = error.to_string();
        let code = error.code().to_string();
        if let Some(caps) = LEADING_LINE.captures(&message) {
            if let Some(line) = parse_line(&caps[1]) {
                let detail = message[caps[0].len()..].to_string();
                return vec![Lint::at_line(line, code, detail)];
            }
        }
        if let Some(line) = LINE_MENTION
            .captures(&message)
            .and_then(|caps| parse_line(&caps[1]))
        {
            return vec![Lint::at_line(line, code, message)];
        }
        vec![Lint::undefined(code, message)]
    }

    pub fn line_start(&self) -> Option<usize> {
        self.lines.map(|range| range.start)
    }

    pub fn line_end(&self) -> Option<usize> {
        self.lines.map(|range| range.end)
    }

    pub fn short_code(&self) -> &str {
        &self.short_code
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Append `L<start>[-<end>] step(code) detail` to `out`.
    ///
    /// With `one_line`, a multi-line detail is cut at its first newline and
    /// marked with ` (...)`.
    pub fn write_message(&self, out: &mut String, step_name: &str, one_line: bool) {
        match self.lines {
            None => out.push_str(LINE_UNDEFINED),
            Some(LineRange { start, end }) if start == end => out.push_str(&format!("L{start}")),
            Some(LineRange { start, end }) => out.push_str(&format!("L{start}-{end}")),
        }
        out.push(' ');
        out.push_str(step_name);
        out.push('(');
        out.push_str(&self.short_code);
        out.push_str(") ");
        match self.detail.find('\n') {
            Some(newline) if one_line => {
                out.push_str(&self.detail[..newline]);
                out.push_str(" (...)");
            }
            _ => out.push_str(&self.detail),
        }
    }

    pub fn message(&self, step_name: &str, one_line: bool) -> String {
        let mut out = String::new();
        self.write_message(&mut out, step_name, one_line);
        out
    }
}

fn parse_line(digits: &str) -> Option<usize> {
    digits.parse::<usize>().ok().filter(|&line| line >= 1)
}

/// Drops lints matching a path, step name and short code.
///
/// Each field is matched exactly, or `*` matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintSuppression {
    #[serde(default = "wildcard")]
    pub path: String,
    #[serde(default = "wildcard")]
    pub step: String,
    #[serde(default = "wildcard")]
    pub short_code: String,
}

fn wildcard() -> String {
    "*".to_string()
}

impl LintSuppression {
    pub fn suppresses(&self, relative_path: &str, step_name: &str, lint: &Lint) -> bool {
        matches(&self.path, relative_path)
            && matches(&self.step, step_name)
            && matches(&self.short_code, lint.short_code())
    }
}

fn matches(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_message() {
        let lint = Lint::at_line(4, "no-tabs", "tab found");
        assert_eq!(lint.message("whitespace", true), "L4 whitespace(no-tabs) tab found");
    }

    #[test]
    fn range_message() {
        let lint = Lint::new(2, 5, "block", "bad block");
        assert_eq!(lint.message("s", false), "L2-5 s(block) bad block");
    }

    #[test]
    fn one_line_truncates_detail() {
        let lint = Lint::undefined("boom", "first\nsecond");
        assert_eq!(lint.message("s", true), "LINE_UNDEFINED s(boom) first (...)");
        assert_eq!(lint.message("s", false), "LINE_UNDEFINED s(boom) first\nsecond");
    }

    #[test]
    #[should_panic(expected = "invalid lint range")]
    fn end_before_start_panics() {
        Lint::new(3, 2, "x", "y");
    }

    #[test]
    fn leading_line_prefix_is_extracted() {
        let err = StepError::failed("parse", "12: unexpected token");
        let lints = Lint::from_step_error(&err);
        assert_eq!(lints, vec![Lint::at_line(12, "parse", "unexpected token")]);
    }

    #[test]
    fn line_mention_is_extracted() {
        let err = StepError::failed("parse", "syntax error at line 7, column 2");
        let lints = Lint::from_step_error(&err);
        assert_eq!(lints[0].line_start(), Some(7));
        assert_eq!(lints[0].detail(), "syntax error at line 7, column 2");
    }

    #[test]
    fn unparseable_message_is_undefined() {
        let err = StepError::failed("io", "something broke: badly");
        let lints = Lint::from_step_error(&err);
        assert_eq!(lints[0].line_start(), None);
        assert_eq!(lints[0].short_code(), "io");
    }

    #[test]
    fn carried_lints_pass_through() {
        let carried = vec![Lint::at_line(1, "a", "b"), Lint::at_line(3, "c", "d")];
        let err = StepError::Lints(carried.clone());
        assert_eq!(Lint::from_step_error(&err), carried);
    }

    #[test]
    fn suppression_wildcards() {
        let lint = Lint::at_line(1, "tabs", "tab");
        let by_path = LintSuppression {
            path: "src/a.rs".to_string(),
            step: "*".to_string(),
            short_code: "*".to_string(),
        };
        assert!(by_path.suppresses("src/a.rs", "indent", &lint));
        assert!(!by_path.suppresses("src/b.rs", "indent", &lint));

        let by_code = LintSuppression {
            path: "*".to_string(),
            step: "indent".to_string(),
            short_code: "spaces".to_string(),
        };
        assert!(!by_code.suppresses("src/a.rs", "indent", &lint));
    }
}
