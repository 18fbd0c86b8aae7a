//! License header enforcement.
//!
//! Everything above the first line matching the delimiter is replaced by
//! the header.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::line_ending::to_unix;
use crate::error::StepError;
use crate::step::{FormatterFunc, StandardStep, text_func};

pub const NAME: &str = "license-header";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseHeaderState {
    /// Unix line endings, always ends with a newline.
    pub header: String,
    pub delimiter: String,
}

impl LicenseHeaderState {
    fn new(header: &str, delimiter: String) -> Self {
        let mut header = to_unix(header);
        if !header.ends_with('\n') {
            header.push('\n');
        }
        Self { header, delimiter }
    }
}

/// Puts `header` above the first line matching `delimiter`.
pub fn license_header(
    header: impl AsRef<str>,
    delimiter: impl Into<String>,
) -> StandardStep<LicenseHeaderState> {
    let state = LicenseHeaderState::new(header.as_ref(), delimiter.into());
    StandardStep::create(NAME, NAME, state, to_func)
}

/// Like [`license_header`], with the header read from `path` when first
/// needed. Only the file's content is part of the step's state.
pub fn license_header_from_file(
    path: impl Into<PathBuf>,
    delimiter: impl Into<String>,
) -> StandardStep<LicenseHeaderState> {
    let path = path.into();
    let delimiter = delimiter.into();
    StandardStep::create_lazy(
        NAME,
        NAME,
        move || {
            let header = fs::read_to_string(&path).map_err(|err| {
                StepError::failed("io", format!("read license header {}: {err}", path.display()))
            })?;
            Ok(LicenseHeaderState::new(&header, delimiter.clone()))
        },
        to_func,
    )
}

fn to_func(state: &LicenseHeaderState) -> Result<Arc<dyn FormatterFunc>, StepError> {
    let delimiter = Regex::new(&format!("(?m)^(?:{})", state.delimiter))
        .map_err(|err| StepError::failed("regex", err.to_string()))?;
    let header = state.header.clone();
    let pattern = state.delimiter.clone();
    Ok(text_func(move |text| {
        let Some(found) = delimiter.find(text) else {
            return Err(StepError::failed(
                "delimiter",
                format!("unable to find delimiter regex {pattern}"),
            ));
        };
        if text[..found.start()] == header {
            return Ok(text.to_string());
        }
        Ok(format!("{header}{}", &text[found.start()..]))
    }))
}
