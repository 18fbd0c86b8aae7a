//! Test-only helpers for building steps, formatters and scratch projects.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::state::StateKey;
use crate::error::StepError;
use crate::formatter::Formatter;
use crate::step::{StandardStep, Step, never_up_to_date, text_func};
use crate::steps::replace::{ReplaceState, replace};

/// Root directory used by [`formatter_with`].
pub const ROOT: &str = "/project";

/// A step running `f` on the text. It has no state, so it equals no other
/// step.
pub fn fn_step<F>(name: &str, f: F) -> StandardStep<u64>
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    never_up_to_date(name, text_func(move |text| Ok(f(text))))
}

/// A step that always fails with code `failed`.
pub fn failing_step(name: &str, message: &str) -> StandardStep<u64> {
    let message = message.to_string();
    never_up_to_date(
        name,
        text_func(move |_| Err(StepError::failed("failed", message.clone()))),
    )
}

/// A step that fails whenever the text contains `needle`, and otherwise
/// leaves it alone.
pub fn fails_on_step(name: &str, needle: &str, message: &str) -> StandardStep<u64> {
    let needle = needle.to_string();
    let message = message.to_string();
    never_up_to_date(
        name,
        text_func(move |text| {
            if text.contains(&needle) {
                Err(StepError::failed("failed", message.clone()))
            } else {
                Ok(text.to_string())
            }
        }),
    )
}

pub fn replace_step(name: &str, find: &str, replacement: &str) -> StandardStep<ReplaceState> {
    replace(name, find, replacement)
}

/// A step whose `close` always fails.
pub fn close_failing_step(name: &str) -> CloseFailing {
    CloseFailing {
        name: name.to_string(),
    }
}

pub struct CloseFailing {
    name: String,
}

impl Step for CloseFailing {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_key(&self) -> Result<StateKey, StepError> {
        StateKey::encode("close-failing", &self.name)
    }

    fn format(&self, _unix: &str, _file: &Path) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    fn close(&self) -> Result<(), StepError> {
        Err(StepError::failed("close", format!("{} refused to close", self.name)))
    }
}

/// A UTF-8, unix-line-ending formatter rooted at [`ROOT`].
pub fn formatter_with(steps: Vec<Box<dyn Step>>) -> Formatter {
    Formatter::builder().root_dir(ROOT).steps(steps).build()
}

/// A scratch directory holding `files` (relative path, content).
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    for (relative, contents) in files {
        write_file(temp.path(), relative, contents);
    }
    temp
}

pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, contents).expect("write file");
    path
}

pub fn read_file(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).expect("read file")
}
