//! Fixed-point search over repeated application of a formatter.
//!
//! A well-behaved formatter is idempotent: formatting its own output changes
//! nothing. [`PaddedCell::check`] applies a formatter to its own output until
//! it settles, repeats itself, or runs out of attempts.

use std::path::{Path, PathBuf};

/// Maximum number of applications before giving up.
pub const MAX_CYCLE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// Reached a fixed point.
    Converge,
    /// Revisited an earlier output.
    Cycle,
    /// Neither within [`MAX_CYCLE`] applications.
    Diverge,
}

/// Outcome of a convergence search on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedCell {
    file: PathBuf,
    kind: CellType,
    steps: Vec<String>,
}

impl PaddedCell {
    fn new(file: &Path, kind: CellType, steps: Vec<String>) -> Self {
        assert!(!steps.is_empty(), "a padded cell needs at least one step");
        Self {
            file: file.to_path_buf(),
            kind,
            steps,
        }
    }

    /// Classify repeated application of `apply`, starting from `original`.
    ///
    /// The first error returned by `apply` ends the search.
    pub fn check<E>(
        file: &Path,
        original: &str,
        mut apply: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Self, E> {
        let once = apply(original)?;
        if once == original {
            return Ok(Self::new(file, CellType::Converge, vec![once]));
        }
        let twice = apply(&once)?;
        if twice == once {
            return Ok(Self::new(file, CellType::Converge, vec![once]));
        }

        let mut seen = vec![once, twice];
        while seen.len() < MAX_CYCLE {
            let input = &seen[seen.len() - 1];
            let output = apply(input)?;
            if output == *input {
                return Ok(Self::new(file, CellType::Converge, seen));
            }
            if let Some(start) = seen.iter().position(|earlier| *earlier == output) {
                let cycle = seen.split_off(start);
                return Ok(Self::new(file, CellType::Cycle, cycle));
            }
            seen.push(output);
        }
        Ok(Self::new(file, CellType::Diverge, seen))
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn kind(&self) -> CellType {
        self.kind
    }

    /// Every recorded output, in order of production.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// True unless the formatter settled after a single application.
    pub fn misbehaved(&self) -> bool {
        !(self.kind == CellType::Converge && self.steps.len() <= 1)
    }

    pub fn is_resolvable(&self) -> bool {
        self.kind != CellType::Diverge
    }

    /// The canonical form, or `None` for a diverging cell.
    ///
    /// For a cycle this is the shortest element, ties broken
    /// lexicographically, so it does not depend on where the cycle was
    /// entered.
    pub fn try_canonical(&self) -> Option<&str> {
        match self.kind {
            CellType::Converge => self.steps.last().map(String::as_str),
            CellType::Cycle => self
                .steps
                .iter()
                .min_by(|a, b| {
                    a.chars()
                        .count()
                        .cmp(&b.chars().count())
                        .then_with(|| a.cmp(b))
                })
                .map(String::as_str),
            CellType::Diverge => None,
        }
    }

    /// # Panics
    ///
    /// Panics if the cell diverged; check [`is_resolvable`](Self::is_resolvable) first.
    pub fn canonical(&self) -> &str {
        match self.try_canonical() {
            Some(canonical) => canonical,
            None => panic!(
                "{} diverged, it has no canonical form",
                self.file.display()
            ),
        }
    }

    pub fn user_message(&self) -> String {
        let verb = match self.kind {
            CellType::Converge => "converges after",
            CellType::Cycle => "cycles between",
            CellType::Diverge => "diverges after",
        };
        format!("{verb} {} steps", self.steps.len())
    }
}
