//! Literal and regex replacement, and the lint-only forbidden pattern.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::lint::Lint;
use crate::error::StepError;
use crate::step::{FormatterFunc, StandardStep, text_func};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceState {
    pub find: String,
    pub replacement: String,
}

/// Replaces every occurrence of `find` with `replacement`.
pub fn replace(
    name: impl Into<String>,
    find: impl Into<String>,
    replacement: impl Into<String>,
) -> StandardStep<ReplaceState> {
    let state = ReplaceState {
        find: find.into(),
        replacement: replacement.into(),
    };
    StandardStep::create(name, "replace", state, |state| {
        if state.find.is_empty() {
            return Err(StepError::failed("replace", "nothing to find"));
        }
        let ReplaceState { find, replacement } = state.clone();
        Ok(text_func(move |text| Ok(text.replace(&find, &replacement))))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexState {
    pub pattern: String,
    pub replacement: String,
}

/// Replaces every match of `pattern`; `$1`-style group references are
/// expanded in `replacement`.
pub fn replace_regex(
    name: impl Into<String>,
    pattern: impl Into<String>,
    replacement: impl Into<String>,
) -> StandardStep<RegexState> {
    let state = RegexState {
        pattern: pattern.into(),
        replacement: replacement.into(),
    };
    StandardStep::create(name, "replace-regex", state, |state| {
        let regex = compile(&state.pattern)?;
        let replacement = state.replacement.clone();
        Ok(text_func(move |text| {
            Ok(regex.replace_all(text, replacement.as_str()).into_owned())
        }))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbidState {
    pub pattern: String,
    pub detail: String,
}

/// Never changes the text; reports a lint on every line where `pattern`
/// matches.
pub fn forbid_regex(
    name: impl Into<String>,
    pattern: impl Into<String>,
    detail: impl Into<String>,
) -> StandardStep<ForbidState> {
    let state = ForbidState {
        pattern: pattern.into(),
        detail: detail.into(),
    };
    StandardStep::create(name, "forbid-regex", state, |state| {
        let func: Arc<dyn FormatterFunc> = Arc::new(Forbid {
            regex: compile(&state.pattern)?,
            detail: state.detail.clone(),
        });
        Ok(func)
    })
}

struct Forbid {
    regex: Regex,
    detail: String,
}

impl FormatterFunc for Forbid {
    fn apply(&self, _unix: &str, _file: &Path) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    fn lint(&self, unix: &str, _file: &Path) -> Result<Vec<Lint>, StepError> {
        let mut lints: Vec<Lint> = Vec::new();
        for found in self.regex.find_iter(unix) {
            let start = line_of(unix, found.start());
            let end = line_of(unix, found.end().saturating_sub(1).max(found.start()));
            if lints.last().and_then(Lint::line_end) == Some(start) && start == end {
                continue;
            }
            lints.push(Lint::new(start, end, "forbidden", &self.detail));
        }
        Ok(lints)
    }
}

/// 1-indexed line containing byte `offset`.
fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

fn compile(pattern: &str) -> Result<Regex, StepError> {
    Regex::new(pattern).map_err(|err| StepError::failed("regex", err.to_string()))
}
