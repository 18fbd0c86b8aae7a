//! Project configuration stored in `settle.toml` at the project root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::state_cache::FuncCache;
use crate::core::encoding::Encoding;
use crate::core::line_ending::{LineEnding, LineEndingPolicy};
use crate::core::lint::LintSuppression;
use crate::formatter::Formatter;
use crate::io::write_atomic;
use crate::policy::ExceptionConfig;
use crate::step::{StandardStep, Step, filter_by_file};
use crate::steps::{self, IndentStyle};

pub const CONFIG_FILE: &str = "settle.toml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Project configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettleConfig {
    pub encoding: Encoding,

    /// Line ending written to every file without an override.
    pub line_ending: LineEnding,

    /// File extensions (without the dot) to format.
    pub extensions: Vec<String>,

    /// Directory names skipped while walking the project.
    pub exclude_dirs: Vec<String>,

    /// Per-extension line endings.
    pub line_ending_overrides: BTreeMap<String, LineEnding>,

    pub exceptions: ExceptionConfig,

    pub suppress: Vec<LintSuppression>,

    /// Steps, applied in order.
    pub step: Vec<StepConfig>,
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepConfig {
    #[serde(flatten)]
    pub kind: StepKind,

    /// Restrict the step to these extensions. Empty means every file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepKind {
    TrimTrailingWhitespace,
    EndWithNewline,
    Indent {
        style: IndentStyle,
        #[serde(default = "default_indent_width")]
        width: usize,
    },
    Replace {
        name: String,
        find: String,
        replacement: String,
    },
    ReplaceRegex {
        name: String,
        pattern: String,
        replacement: String,
    },
    ForbidRegex {
        name: String,
        pattern: String,
        message: String,
    },
    /// Exactly one of `header` and `file` (relative to the project root).
    LicenseHeader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        delimiter: String,
    },
}

fn default_indent_width() -> usize {
    4
}

impl StepConfig {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            extensions: Vec::new(),
        }
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            line_ending: LineEnding::Unix,
            extensions: ["md", "rs", "toml", "txt"].map(String::from).to_vec(),
            exclude_dirs: [".git", ".settle", "target"].map(String::from).to_vec(),
            line_ending_overrides: BTreeMap::new(),
            exceptions: ExceptionConfig::default(),
            suppress: Vec::new(),
            step: vec![
                StepConfig::new(StepKind::TrimTrailingWhitespace),
                StepConfig::new(StepKind::EndWithNewline),
            ],
        }
    }
}

impl SettleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.extensions.iter().any(|ext| ext.is_empty() || ext.starts_with('.')) {
            return Err(anyhow!("extensions must be non-empty and given without a leading dot"));
        }
        for (i, step) in self.step.iter().enumerate() {
            validate_step(&step.kind).with_context(|| format!("step[{i}]"))?;
        }
        Ok(())
    }

    pub fn line_ending_policy(&self) -> LineEndingPolicy {
        if self.line_ending_overrides.is_empty() {
            LineEndingPolicy::uniform(self.line_ending)
        } else {
            LineEndingPolicy::ByExtension {
                default: self.line_ending,
                overrides: self.line_ending_overrides.clone(),
            }
        }
    }

    /// Build the formatter described by this config for the project at
    /// `root`. With a `cache`, steps of equal state share their functions.
    pub fn build_formatter(&self, root: &Path, cache: Option<Arc<FuncCache>>) -> Result<Formatter> {
        self.validate()?;
        let steps = self
            .step
            .iter()
            .map(|step| build_step(step, root, cache.as_ref()))
            .collect::<Vec<_>>();
        Ok(Formatter::builder()
            .encoding(self.encoding)
            .line_endings(self.line_ending_policy())
            .root_dir(root)
            .steps(steps)
            .build())
    }
}

fn validate_step(kind: &StepKind) -> Result<()> {
    match kind {
        StepKind::TrimTrailingWhitespace | StepKind::EndWithNewline => {}
        StepKind::Indent { width, .. } => {
            if *width == 0 {
                return Err(anyhow!("indent width must be > 0"));
            }
        }
        StepKind::Replace { name, find, .. } => {
            require_name(name)?;
            if find.is_empty() {
                return Err(anyhow!("replace.find must not be empty"));
            }
        }
        StepKind::ReplaceRegex { name, pattern, .. } | StepKind::ForbidRegex { name, pattern, .. } => {
            require_name(name)?;
            Regex::new(pattern).with_context(|| format!("invalid pattern for step '{name}'"))?;
        }
        StepKind::LicenseHeader {
            header,
            file,
            delimiter,
        } => {
            if header.is_some() == file.is_some() {
                return Err(anyhow!("license-header needs exactly one of header or file"));
            }
            Regex::new(delimiter).context("invalid license-header delimiter")?;
        }
    }
    Ok(())
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("step name must not be empty"));
    }
    Ok(())
}

fn build_step(config: &StepConfig, root: &Path, cache: Option<&Arc<FuncCache>>) -> Box<dyn Step> {
    let step = match &config.kind {
        StepKind::TrimTrailingWhitespace => shared(steps::trim_trailing_whitespace(), cache),
        StepKind::EndWithNewline => shared(steps::end_with_newline(), cache),
        StepKind::Indent { style, width } => shared(steps::indent(*style, *width), cache),
        StepKind::Replace {
            name,
            find,
            replacement,
        } => shared(steps::replace(name, find, replacement), cache),
        StepKind::ReplaceRegex {
            name,
            pattern,
            replacement,
        } => shared(steps::replace_regex(name, pattern, replacement), cache),
        StepKind::ForbidRegex {
            name,
            pattern,
            message,
        } => shared(steps::forbid_regex(name, pattern, message), cache),
        StepKind::LicenseHeader {
            header: Some(header),
            delimiter,
            ..
        } => shared(steps::license_header(header, delimiter), cache),
        StepKind::LicenseHeader {
            file, delimiter, ..
        } => {
            let path = root.join(file.as_deref().unwrap_or(Path::new("LICENSE")));
            shared(steps::license_header_from_file(path, delimiter), cache)
        }
    };
    if config.extensions.is_empty() {
        step
    } else {
        Box::new(filter_by_file(step, config.extensions.iter().cloned()))
    }
}

fn shared<S>(step: StandardStep<S>, cache: Option<&Arc<FuncCache>>) -> Box<dyn Step>
where
    S: Serialize + Send + Sync + 'static,
{
    match cache {
        Some(cache) => Box::new(step.with_cache(Arc::clone(cache))),
        None => Box::new(step),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SettleConfig::default()`.
pub fn load_config(path: &Path) -> Result<SettleConfig> {
    if !path.exists() {
        let cfg = SettleConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SettleConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SettleConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes())
}
