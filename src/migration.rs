//! Migration registry validation and execution (C10).
//!
//! A collection's migration chain lifts a raw, pre-schema-validation mapping
//! (entity id → raw fields) from the version found on disk up to the
//! collection's declared version. Transforms operate on the whole
//! collection's raw mapping rather than per-entity, since a migration step
//! (e.g. a field rename) is naturally a map over every record plus whatever
//! cross-record bookkeeping it needs.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::MigrationError;
use crate::value::Record;

/// A collection's raw, not-yet-validated on-disk mapping: entity id → fields.
pub type RawCollection = IndexMap<String, Record>;

/// A single ordered step in a migration chain, lifting `from` to `to` (always `from + 1`).
#[derive(Clone)]
pub struct MigrationStep {
    /// Source version.
    pub from: u32,
    /// Target version (always `from + 1`).
    pub to: u32,
    /// Human-readable description of what this step does.
    pub description: String,
    transform: Arc<dyn Fn(RawCollection) -> Result<RawCollection, String> + Send + Sync>,
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl MigrationStep {
    /// Declares a migration step with its transform function.
    ///
    /// `transform` receives the whole collection's raw mapping and returns
    /// the mapping at the next version, or an error message on failure.
    pub fn new(
        from: u32,
        to: u32,
        description: impl Into<String>,
        transform: impl Fn(RawCollection) -> Result<RawCollection, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            description: description.into(),
            transform: Arc::new(transform),
        }
    }

    fn apply(&self, data: RawCollection) -> Result<RawCollection, MigrationError> {
        (self.transform)(data).map_err(|cause| MigrationError::TransformFailed {
            from: self.from,
            to: self.to,
            cause,
        })
    }
}

/// A borrowed view of a collection's declared version and migration steps,
/// used to validate the registry and to run the chain on load.
pub struct MigrationChain<'a> {
    /// Declared collection version.
    pub version: u32,
    /// Declared migration steps, not required to be pre-sorted.
    pub steps: &'a [MigrationStep],
}

impl<'a> MigrationChain<'a> {
    /// Validates the registry against the six rules in spec.md §4.9.
    ///
    /// Runs eagerly at database construction; the first violation found is
    /// returned (order: empty/non-empty check, per-step increment check,
    /// duplicate-from check, then gap/start/end-of-chain checks).
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.version == 0 {
            if !self.steps.is_empty() {
                return Err(MigrationError::UnversionedWithMigrations {
                    step_count: self.steps.len(),
                });
            }
            return Ok(());
        }

        if self.steps.is_empty() {
            return Err(MigrationError::EmptyRegistry {
                version: self.version,
            });
        }

        for step in self.steps {
            if step.to != step.from + 1 {
                return Err(MigrationError::InvalidIncrement {
                    from: step.from,
                    to: step.to,
                });
            }
        }

        let mut sorted: Vec<&MigrationStep> = self.steps.iter().collect();
        sorted.sort_by_key(|s| s.from);

        for window in sorted.windows(2) {
            if window[0].from == window[1].from {
                return Err(MigrationError::DuplicateFrom {
                    from: window[0].from,
                });
            }
        }

        if sorted.first().map(|s| s.from) != Some(0) {
            return Err(MigrationError::MissingStart);
        }

        for (expected, step) in sorted.iter().enumerate() {
            if step.from != expected as u32 {
                return Err(MigrationError::GapInChain {
                    version: self.version,
                });
            }
        }

        let chain_end = sorted.last().map(|s| s.to).unwrap_or(0);
        if chain_end != self.version {
            return Err(MigrationError::VersionMismatch {
                declared: self.version,
                chain_end,
            });
        }

        Ok(())
    }

    /// Runs every step from `file_version` (inclusive) up to `self.version`,
    /// in ascending `from` order, feeding each transform the previous
    /// step's output.
    ///
    /// Callers must validate the registry (and check `file_version <=
    /// self.version`, raising `MigrationError::VersionAhead` otherwise)
    /// before calling this.
    pub fn run(&self, file_version: u32, mut data: RawCollection) -> Result<RawCollection, MigrationError> {
        let mut sorted: Vec<&MigrationStep> = self.steps.iter().collect();
        sorted.sort_by_key(|s| s.from);

        for step in sorted.into_iter().filter(|s| s.from >= file_version) {
            data = step.apply(data)?;
        }
        Ok(data)
    }
}
