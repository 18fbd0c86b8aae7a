//! Line-ending conventions and per-file policies.
//!
//! Steps only ever see `\n`. The target convention is applied once, after the
//! whole pipeline ran, by [`LineEndingPolicy::apply`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Line endings a file can be written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineEnding {
    /// `\n`
    Unix,
    /// `\r\n`
    Windows,
    /// `\r\n` on windows hosts, `\n` everywhere else.
    PlatformNative,
}

impl LineEnding {
    /// The literal separator for this convention.
    pub fn str(self) -> &'static str {
        match self {
            LineEnding::Unix => "\n",
            LineEnding::Windows => "\r\n",
            LineEnding::PlatformNative => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }
}

/// Returns `input` with only `\n` line endings.
///
/// Text without any `\n` is returned untouched, even if it holds a bare `\r`.
pub fn to_unix(input: &str) -> String {
    if !input.contains('\n') {
        return input.to_string();
    }
    input.replace('\r', "")
}

/// Decides which line ending a given file should be written with.
///
/// Policies are part of a formatter's identity, so they serialize
/// deterministically (overrides are kept in a sorted map).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LineEndingPolicy {
    /// Same ending for every file.
    Uniform { ending: LineEnding },
    /// Ending chosen by file extension (without the dot), falling back to `default`.
    ByExtension {
        default: LineEnding,
        overrides: BTreeMap<String, LineEnding>,
    },
}

impl LineEndingPolicy {
    pub fn uniform(ending: LineEnding) -> Self {
        LineEndingPolicy::Uniform { ending }
    }

    /// The line ending for `file`.
    pub fn ending_for(&self, file: &Path) -> LineEnding {
        match self {
            LineEndingPolicy::Uniform { ending } => *ending,
            LineEndingPolicy::ByExtension { default, overrides } => file
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| overrides.get(ext))
                .copied()
                .unwrap_or(*default),
        }
    }

    pub fn is_unix(&self, file: &Path) -> bool {
        self.ending_for(file).str() == LineEnding::Unix.str()
    }

    /// Convert unix-only text into the ending configured for `file`.
    pub fn apply(&self, unix: &str, file: &Path) -> String {
        let ending = self.ending_for(file).str();
        if ending == "\n" {
            unix.to_string()
        } else {
            unix.replace('\n', ending)
        }
    }
}

impl Default for LineEndingPolicy {
    fn default() -> Self {
        LineEndingPolicy::uniform(LineEnding::Unix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_unix_strips_carriage_returns() {
        assert_eq!(to_unix("a\r\nb\r\n"), "a\nb\n");
        assert_eq!(to_unix("a\nb"), "a\nb");
    }

    #[test]
    fn to_unix_keeps_lone_carriage_return_without_newline() {
        assert_eq!(to_unix("a\rb"), "a\rb");
    }

    #[test]
    fn by_extension_falls_back_to_default() {
        let policy = LineEndingPolicy::ByExtension {
            default: LineEnding::Unix,
            overrides: BTreeMap::from([("bat".to_string(), LineEnding::Windows)]),
        };
        assert_eq!(
            policy.ending_for(Path::new("run.bat")),
            LineEnding::Windows
        );
        assert_eq!(policy.ending_for(Path::new("lib.rs")), LineEnding::Unix);
        assert_eq!(policy.ending_for(Path::new("Makefile")), LineEnding::Unix);
        assert!(!policy.is_unix(Path::new("x.bat")));
    }

    #[test]
    fn apply_converts_only_when_needed() {
        let windows = LineEndingPolicy::uniform(LineEnding::Windows);
        assert_eq!(windows.apply("a\nb\n", Path::new("f")), "a\r\nb\r\n");
        let unix = LineEndingPolicy::default();
        assert_eq!(unix.apply("a\nb\n", Path::new("f")), "a\nb\n");
    }
}
