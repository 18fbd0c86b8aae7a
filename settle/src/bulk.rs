//! Convergence checks across many files.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::core::padded_cell::{CellType, PaddedCell};
use crate::dirty::Calculation;
use crate::error::SettleError;
use crate::formatter::Formatter;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SettleError + '_ {
    move |source| SettleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn cell_for(formatter: &Formatter, file: &Path) -> Result<PaddedCell, SettleError> {
    let raw = fs::read(file).map_err(io_error(file))?;
    let calculation = Calculation::new(formatter, file, &raw)?;
    Ok(PaddedCell::check(file, calculation.unix(), |text| {
        formatter.compute(text, file)
    })?)
}

/// Whether any of `files` needs more than one pass to settle.
///
/// Gives up, answering `false`, once `timeout` has elapsed.
pub fn any_misbehave(formatter: &Formatter, files: &[PathBuf], timeout: Duration) -> Result<bool, SettleError> {
    let started = Instant::now();
    for file in files {
        if started.elapsed() >= timeout {
            warn!(?timeout, "gave up looking for misbehaving files");
            return Ok(false);
        }
        if cell_for(formatter, file)?.misbehaved() {
            info!(path = %formatter.relative_path(file), "misbehaving file found");
            return Ok(true);
        }
    }
    Ok(false)
}

fn suffix(kind: CellType) -> &'static str {
    match kind {
        CellType::Converge => "converge",
        CellType::Cycle => "cycle",
        CellType::Diverge => "diverge",
    }
}

/// Where under the diagnose directory `file`'s outputs go: its path
/// relative to `root`, or for a file outside `root` its own path with the
/// root, prefix and `..` components dropped.
fn output_base(root: &Path, file: &Path) -> PathBuf {
    file.strip_prefix(root)
        .unwrap_or(file)
        .components()
        .filter_map(|part| match part {
            Component::Normal(name) => Some(name),
            Component::Prefix(_) | Component::RootDir | Component::CurDir | Component::ParentDir => None,
        })
        .collect()
}

/// Write every intermediate output of each misbehaving file under
/// `diagnose_dir`, as `<relative path>.<type><n>`.
///
/// The directory is emptied first. Returns the misbehaving files that still
/// have a canonical form.
pub fn diagnose(
    root: &Path,
    diagnose_dir: &Path,
    formatter: &Formatter,
    files: &[PathBuf],
) -> Result<Vec<PathBuf>, SettleError> {
    if diagnose_dir.exists() {
        fs::remove_dir_all(diagnose_dir).map_err(io_error(diagnose_dir))?;
    }
    fs::create_dir_all(diagnose_dir).map_err(io_error(diagnose_dir))?;

    let mut resolvable = Vec::new();
    for file in files {
        let cell = cell_for(formatter, file)?;
        if !cell.misbehaved() {
            continue;
        }
        let base = diagnose_dir.join(output_base(root, file));
        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        for (i, step) in cell.steps().iter().enumerate() {
            let mut name = base.clone().into_os_string();
            name.push(format!(".{}{i}", suffix(cell.kind())));
            let out = PathBuf::from(name);
            let text = formatter.compute_line_endings(step, file);
            fs::write(&out, formatter.encoding().encode(&text)).map_err(io_error(&out))?;
        }
        info!(path = %formatter.relative_path(file), outcome = %cell.user_message(), "diagnosed");
        if cell.is_resolvable() {
            resolvable.push(file.clone());
        }
    }
    Ok(resolvable)
}
