//! Whitespace normalization steps.

use serde::{Deserialize, Serialize};

use crate::error::StepError;
use crate::step::{StandardStep, text_func};

/// Removes spaces and tabs at the end of every line.
pub fn trim_trailing_whitespace() -> StandardStep<()> {
    StandardStep::create(
        "trim-trailing-whitespace",
        "trim-trailing-whitespace",
        (),
        |_| Ok(text_func(|text| Ok(trim_lines(text)))),
    )
}

fn trim_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match line.strip_suffix('\n') {
            Some(body) => {
                out.push_str(body.trim_end_matches([' ', '\t']));
                out.push('\n');
            }
            None => out.push_str(line.trim_end_matches([' ', '\t'])),
        }
    }
    out
}

/// Makes the file end with exactly one newline.
///
/// A file holding nothing but whitespace becomes a single newline.
pub fn end_with_newline() -> StandardStep<()> {
    StandardStep::create("end-with-newline", "end-with-newline", (), |_| {
        Ok(text_func(|text| {
            let mut out = text.trim_end().to_string();
            out.push('\n');
            Ok(out)
        }))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndentStyle {
    Spaces,
    Tabs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentState {
    pub style: IndentStyle,
    /// Columns per tab.
    pub width: usize,
}

/// Rewrites leading indentation to `style`, treating a tab as `width`
/// columns. Columns that do not fill a whole tab stay spaces.
pub fn indent(style: IndentStyle, width: usize) -> StandardStep<IndentState> {
    StandardStep::create("indent", "indent", IndentState { style, width }, |state| {
        if state.width == 0 {
            return Err(StepError::failed("indent", "indent width must be > 0"));
        }
        let IndentState { style, width } = *state;
        Ok(text_func(move |text| Ok(reindent(text, style, width))))
    })
}

fn reindent(text: &str, style: IndentStyle, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let body = line.trim_start_matches([' ', '\t']);
        let lead = &line[..line.len() - body.len()];
        let columns: usize = lead
            .chars()
            .map(|c| if c == '\t' { width } else { 1 })
            .sum();
        match style {
            IndentStyle::Spaces => out.push_str(&" ".repeat(columns)),
            IndentStyle::Tabs => {
                out.push_str(&"\t".repeat(columns / width));
                out.push_str(&" ".repeat(columns % width));
            }
        }
        out.push_str(body);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use std::path::Path;

    fn run(step: &dyn Step, text: &str) -> String {
        step.format(text, Path::new("f.txt"))
            .expect("format")
            .unwrap_or_else(|| text.to_string())
    }

    #[test]
    fn trims_each_line() {
        let step = trim_trailing_whitespace();
        assert_eq!(run(&step, "a  \nb\t\n  \nc "), "a\nb\n\nc");
    }

    #[test]
    fn ends_with_single_newline() {
        let step = end_with_newline();
        assert_eq!(run(&step, "a"), "a\n");
        assert_eq!(run(&step, "a\n\n\n"), "a\n");
        assert_eq!(run(&step, "a\n"), "a\n");
        assert_eq!(run(&step, " \n "), "\n");
    }

    #[test]
    fn tabs_to_spaces() {
        let step = indent(IndentStyle::Spaces, 4);
        assert_eq!(run(&step, "\tx\n\t  y\nz\n"), "    x\n      y\nz\n");
    }

    #[test]
    fn spaces_to_tabs_keeps_remainder() {
        let step = indent(IndentStyle::Tabs, 2);
        assert_eq!(run(&step, "    x\n     y\n"), "\t\tx\n\t\t y\n");
    }

    #[test]
    fn zero_width_fails() {
        let step = indent(IndentStyle::Tabs, 0);
        let err = step.format("x", Path::new("f")).expect_err("zero width");
        assert_eq!(err.code(), "indent");
    }
}
