//! Format detection: pick the one registered handler that can parse a file.

use std::path::Path;
use std::sync::Arc;

use tally_core::{Classifier, Diagnostics};

use crate::error::{IngestError, Result};
use crate::handler::FormatHandler;
use crate::probe::{Probe, ProbeLimits};
use crate::registry::Registry;

/// Shared, read-only context for detecting and parsing files.
///
/// Cheap to clone; every field is behind an `Arc`.
#[derive(Clone)]
pub struct Detector {
    registry: Arc<Registry>,
    classifier: Arc<Classifier>,
    limits: ProbeLimits,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("registry", &self.registry)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Detector {
    /// Uses the registry's diagnostic sink.
    pub fn new(registry: Arc<Registry>, classifier: Arc<Classifier>, limits: ProbeLimits) -> Self {
        let diagnostics = registry.diagnostics().clone();
        Self {
            registry,
            classifier,
            limits,
            diagnostics,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }

    pub fn limits(&self) -> ProbeLimits {
        self.limits
    }

    /// Every handler passing both detection stages.
    ///
    /// The file is only opened when at least one handler accepts its name.
    pub fn candidates(&self, path: &Path) -> Result<Vec<Arc<dyn FormatHandler>>> {
        if !path.is_file() {
            return Err(IngestError::MissingFile(path.to_path_buf()));
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };

        let by_name: Vec<_> = self
            .registry
            .handlers()
            .iter()
            .filter(|h| h.filename_matches(name))
            .collect();
        if by_name.is_empty() {
            return Ok(Vec::new());
        }

        let probe = Probe::read(path, self.limits)?;
        Ok(by_name
            .into_iter()
            .filter(|h| {
                let ok = h.can_parse(path, &probe, &self.classifier);
                if !ok {
                    self.diagnostics.debug(&format!(
                        "{}: name fits '{}' but content does not",
                        path.display(),
                        h.institution()
                    ));
                }
                ok
            })
            .cloned()
            .collect())
    }

    /// The single handler for `path`.
    ///
    /// No match is a warning-level skip (`NoHandler`); more than one match is a
    /// loud configuration fault (`AmbiguousHandler`).
    pub fn detect(&self, path: &Path) -> Result<Arc<dyn FormatHandler>> {
        let mut found = self.candidates(path)?;
        match found.len() {
            0 => {
                self.diagnostics
                    .warn(&format!("no handler recognizes {}, skipping", path.display()));
                Err(IngestError::NoHandler(path.to_path_buf()))
            }
            1 => {
                let handler = found.remove(0);
                self.diagnostics
                    .debug(&format!("{} -> {}", path.display(), handler.institution()));
                Ok(handler)
            }
            _ => {
                let institutions: Vec<String> =
                    found.iter().map(|h| h.institution().to_string()).collect();
                self.diagnostics.error(&format!(
                    "{} matches several handlers ({}); refusing to guess",
                    path.display(),
                    institutions.join(", ")
                ));
                Err(IngestError::AmbiguousHandler {
                    path: path.to_path_buf(),
                    institutions,
                })
            }
        }
    }
}
