//! CLI command implementations. Each returns the process exit code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use settle::bulk;
use settle::cache::FuncCache;
use settle::check::{self, Mode, Report, RunOptions};
use settle::exit_codes;
use settle::formatter::{Formatter, FormatterSession};
use settle::io::config::{SettleConfig, config_path, load_config, write_config};
use settle::io::files::discover;

/// An opened project. Dropping it closes the formatter's steps and cached
/// functions, so error paths release them too.
struct Project {
    root: PathBuf,
    config: SettleConfig,
    session: FormatterSession,
}

impl Project {
    fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve root {}", root.display()))?;
        let config = load_config(&config_path(&root)).context("load settle.toml")?;
        let cache = Arc::new(FuncCache::new());
        let formatter = config.build_formatter(&root, Some(Arc::clone(&cache)))?;
        debug!(root = %root.display(), steps = formatter.steps().len(), "project opened");
        Ok(Self {
            root,
            config,
            session: FormatterSession::new(formatter, cache),
        })
    }

    fn formatter(&self) -> &Formatter {
        self.session.formatter()
    }

    fn files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let resolved = paths
            .iter()
            .map(|path| {
                path.canonicalize()
                    .with_context(|| format!("resolve {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        discover(&self.root, &resolved, &self.config)
    }

    /// Close every step and cached function, then report `code` unless
    /// closing failed.
    fn finish(self, code: i32) -> Result<i32> {
        self.session.close().context("close formatter")?;
        Ok(code)
    }
}

/// Report files that need formatting, without touching them.
pub fn check(root: &Path, paths: &[PathBuf], use_index: bool) -> Result<i32> {
    settle_files(root, paths, use_index, Mode::Check)
}

/// Rewrite files to their canonical form.
pub fn apply(root: &Path, paths: &[PathBuf], use_index: bool) -> Result<i32> {
    settle_files(root, paths, use_index, Mode::Apply)
}

fn settle_files(root: &Path, paths: &[PathBuf], use_index: bool, mode: Mode) -> Result<i32> {
    let project = Project::open(root)?;
    let files = project.files(paths)?;
    info!(files = files.len(), ?mode, "starting run");
    let options = RunOptions {
        policy: project.config.exceptions.policy(),
        suppressions: project.config.suppress.clone(),
        use_index,
    };
    let report = check::run(&project.root, project.formatter(), &files, mode, &options)?;
    print_report(&report);
    let code = report.exit_code();
    project.finish(code)
}

fn print_report(report: &Report) {
    for path in &report.dirty {
        println!("dirty: {}", path);
    }
    for path in &report.fixed {
        println!("fixed: {}", path);
    }
    for path in &report.did_not_converge {
        println!("did-not-converge: {}", path);
    }
    for lint in &report.lints {
        println!("lint: {}", lint);
    }
    for failure in &report.tolerated {
        eprintln!("warning: {}", failure);
    }
    println!(
        "summary: clean={} dirty={} fixed={} did_not_converge={} lints={} skipped={}",
        report.clean.len(),
        report.dirty.len(),
        report.fixed.len(),
        report.did_not_converge.len(),
        report.lints.len(),
        report.skipped
    );
    if !report.did_not_converge.is_empty() {
        eprintln!("hint: run `settle diagnose` to see the outputs of the steps that do not settle");
    }
}

/// Dump the intermediate outputs of misbehaving files.
pub fn diagnose(root: &Path, paths: &[PathBuf], dir: &Path) -> Result<i32> {
    let project = Project::open(root)?;
    let files = project.files(paths)?;
    let out = project.root.join(dir);
    let resolvable = bulk::diagnose(&project.root, &out, project.formatter(), &files)?;
    for file in &resolvable {
        println!("resolvable: {}", project.formatter().relative_path(file));
    }
    println!("diagnose: dir={} resolvable={}", out.display(), resolvable.len());
    project.finish(exit_codes::OK)
}

/// Print the formatter's cache key and its digest.
pub fn key(root: &Path) -> Result<i32> {
    let project = Project::open(root)?;
    let key = project.formatter().cache_key().context("compute formatter key")?;
    println!("{}", key);
    println!("digest: {}", key.digest());
    project.finish(exit_codes::OK)
}

/// Write the default `settle.toml`.
pub fn init(root: &Path, force: bool) -> Result<i32> {
    let path = config_path(root);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&path, &SettleConfig::default())?;
    println!("init: wrote {}", path.display());
    Ok(exit_codes::OK)
}
