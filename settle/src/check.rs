//! Orchestration for `settle check` and `settle apply`.
//!
//! Every file is evaluated through [`LintState`]. Step failures go through
//! the exception policy, lint suppressions are applied, and in apply mode
//! the canonical bytes are written back. Files found clean are recorded in
//! the [`FileIndex`] so the next run can skip them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cache::signature::content_hash;
use crate::core::lint::LintSuppression;
use crate::dirty::DirtyState;
use crate::error::{SettleError, StepFailure};
use crate::exit_codes;
use crate::formatter::Formatter;
use crate::io::index::FileIndex;
use crate::lint_state::LintState;
use crate::policy::ExceptionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report, change nothing.
    Check,
    /// Rewrite files that have a canonical form.
    Apply,
}

pub struct RunOptions {
    pub policy: Box<dyn ExceptionPolicy>,
    pub suppressions: Vec<LintSuppression>,
    /// Skip files recorded clean in `.settle/index.json`, and update it.
    pub use_index: bool,
}

/// Outcome of a run. Paths are relative to the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub clean: Vec<String>,
    /// Needs formatting (check mode).
    pub dirty: Vec<String>,
    /// Rewritten (apply mode).
    pub fixed: Vec<String>,
    pub did_not_converge: Vec<String>,
    /// One-line lint messages.
    pub lints: Vec<String>,
    /// Step failures the policy let through.
    pub tolerated: Vec<String>,
    /// Files skipped because the index knew them clean.
    pub skipped: usize,
}

impl Report {
    pub fn exit_code(&self) -> i32 {
        if !self.did_not_converge.is_empty() {
            exit_codes::DID_NOT_CONVERGE
        } else if !self.dirty.is_empty() || !self.lints.is_empty() {
            exit_codes::DIRTY
        } else {
            exit_codes::OK
        }
    }
}

/// Fingerprint of everything that decides whether a file is clean.
pub fn index_fingerprint(formatter: &Formatter, suppressions: &[LintSuppression]) -> Result<String> {
    let key = formatter.cache_key().context("compute formatter key")?;
    let suppressions = serde_json::to_string(suppressions).context("serialize suppressions")?;
    Ok(content_hash(format!("{key}\n{suppressions}").as_bytes()))
}

pub fn run(root: &Path, formatter: &Formatter, files: &[PathBuf], mode: Mode, options: &RunOptions) -> Result<Report> {
    let mut index = if options.use_index {
        let fingerprint = index_fingerprint(formatter, &options.suppressions)?;
        Some(FileIndex::load(root, &fingerprint)?)
    } else {
        None
    };

    let mut report = Report::default();
    for file in files {
        let relative = formatter.relative_path(file);
        let raw = fs::read(file).with_context(|| format!("read {}", file.display()))?;
        if index.as_ref().is_some_and(|index| index.is_clean(&relative, &raw)) {
            debug!(path = %relative, "known clean, skipping");
            report.skipped += 1;
            continue;
        }

        let outcome = evaluate(formatter, file, &relative, &raw, mode, options, &mut report)?;
        if let Some(index) = index.as_mut() {
            match outcome {
                Some(clean_bytes) => index.mark_clean(&relative, &clean_bytes),
                None => index.forget(&relative),
            }
        }
    }

    if let Some(index) = &index {
        index.save(root)?;
    }
    info!(
        clean = report.clean.len(),
        dirty = report.dirty.len(),
        fixed = report.fixed.len(),
        did_not_converge = report.did_not_converge.len(),
        lints = report.lints.len(),
        skipped = report.skipped,
        "run finished"
    );
    Ok(report)
}

/// Evaluate one file and record it in `report`. Returns the file's bytes
/// after this run when they are clean, lint free, and untouched by any
/// step failure.
fn evaluate(
    formatter: &Formatter,
    file: &Path,
    relative: &str,
    raw: &[u8],
    mode: Mode,
    options: &RunOptions,
    report: &mut Report,
) -> Result<Option<Vec<u8>>> {
    let mut state = LintState::of(formatter, file, raw).with_context(|| format!("decode {relative}"))?;

    let failures: Vec<_> = state
        .step_failures()
        .map(|(i, error)| (i, error.clone()))
        .collect();
    let had_failure = !failures.is_empty();
    for (i, error) in failures {
        let failure = StepFailure {
            step: formatter.steps()[i].name().to_string(),
            path: relative.to_string(),
            error,
        };
        options
            .policy
            .handle(&failure)
            .map_err(SettleError::from)
            .with_context(|| format!("format {relative}"))?;
        report.tolerated.push(failure.to_string());
        state = state.without_step(i);
    }

    let state = state.with_removed_suppressions(formatter, relative, &options.suppressions)?;
    if state.has_lints() {
        let rendered = state.as_string_one_line(file, formatter)?;
        report.lints.extend(rendered.lines().map(str::to_string));
    }

    let after = match state.dirty_state() {
        DirtyState::Clean => {
            report.clean.push(relative.to_string());
            raw.to_vec()
        }
        DirtyState::Resolved(bytes) => match mode {
            Mode::Check => {
                report.dirty.push(relative.to_string());
                return Ok(None);
            }
            Mode::Apply => {
                fs::write(file, bytes).with_context(|| format!("write {}", file.display()))?;
                info!(path = %relative, "rewrote file");
                report.fixed.push(relative.to_string());
                bytes.clone()
            }
        },
        DirtyState::DidNotConverge => {
            warn!(path = %relative, "formatter did not converge: a step's output is not stable");
            report.did_not_converge.push(relative.to_string());
            return Ok(None);
        }
    };

    if state.has_lints() || had_failure {
        Ok(None)
    } else {
        Ok(Some(after))
    }
}
