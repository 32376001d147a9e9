//! Process-wide list of format handlers, assembled once at start-up.
//!
//! Handlers are only ever added, never removed. Once built the registry is
//! shared read-only (usually behind an `Arc`) and needs no locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use tally_core::Diagnostics;

use crate::error::{IngestError, Result};
use crate::handler::FormatHandler;
use crate::handlers::{self, HandlerConfig};

pub struct Registry {
    handlers: Vec<Arc<dyn FormatHandler>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("institutions", &self.institutions())
            .finish()
    }
}

impl Registry {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            handlers: Vec::new(),
            diagnostics,
        }
    }

    /// Registry holding every built-in handler.
    pub fn with_builtin(config: &HandlerConfig, diagnostics: Arc<dyn Diagnostics>) -> Result<Self> {
        let mut registry = Self::new(diagnostics);
        for handler in handlers::builtin(config)? {
            registry.register(handler)?;
        }
        Ok(registry)
    }

    /// Add a handler.
    ///
    /// Registering the same handler instance twice is a no-op; any other
    /// handler under an existing institution is a configuration error, even
    /// one built from an equal descriptor.
    pub fn register(&mut self, handler: Arc<dyn FormatHandler>) -> Result<()> {
        handler.descriptor().validate()?;
        let id = handler.institution().to_string();

        if let Some(existing) = self.get(&id) {
            if Arc::ptr_eq(existing, &handler) {
                self.diagnostics.debug(&format!("handler '{id}' already registered"));
                return Ok(());
            }
            self.diagnostics
                .error(&format!("two different handlers claim institution '{id}'"));
            return Err(IngestError::DuplicateHandler(id));
        }

        self.diagnostics.debug(&format!(
            "registered '{id}' with columns {:?}",
            handler.descriptor().field_names()
        ));
        self.handlers.push(handler);
        Ok(())
    }

    pub fn get(&self, institution: &str) -> Option<&Arc<dyn FormatHandler>> {
        self.handlers.iter().find(|h| h.institution() == institution)
    }

    pub fn handlers(&self) -> &[Arc<dyn FormatHandler>] {
        &self.handlers
    }

    pub fn institutions(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.institution()).collect()
    }

    /// Institution → raw column names, for listings.
    pub fn describe(&self) -> BTreeMap<String, Vec<String>> {
        self.handlers
            .iter()
            .map(|h| {
                let cols = h.descriptor().field_names().into_iter().map(String::from).collect();
                (h.institution().to_string(), cols)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Descriptor;
    use crate::handlers::{Bbt, BbtConfig, Usaa, UsaaConfig};
    use tally_core::{Level, MemorySink, NullSink};

    #[test]
    fn test_builtin_registry() {
        let r = Registry::with_builtin(&HandlerConfig::default(), Arc::new(NullSink)).unwrap();
        assert_eq!(r.institutions(), vec!["bbt", "usaa"]);
        assert_eq!(r.len(), 2);
        assert!(r.get("bbt").is_some());
        assert!(r.get("chase").is_none());
    }

    #[test]
    fn test_register_same_handler_twice_is_noop() {
        let mut r = Registry::new(Arc::new(NullSink));
        let bbt: Arc<dyn FormatHandler> = Arc::new(Bbt::new(&BbtConfig::default()).unwrap());
        r.register(bbt.clone()).unwrap();
        r.register(bbt).unwrap();
        assert_eq!(r.len(), 1);

        let err = r
            .register(Arc::new(Bbt::new(&BbtConfig::default()).unwrap()))
            .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateHandler(ref id) if id == "bbt"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_second_bbt_with_other_prefix_is_rejected() {
        let mut r = Registry::new(Arc::new(NullSink));
        r.register(Arc::new(Bbt::new(&BbtConfig::default()).unwrap())).unwrap();

        let statements = BbtConfig {
            file_prefix: "Statement_".to_string(),
            ..BbtConfig::default()
        };
        let err = r.register(Arc::new(Bbt::new(&statements).unwrap())).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateHandler(_)));
        assert!(r.get("bbt").unwrap().filename_matches("Acct_7389_x.csv"));
        assert!(!r.get("bbt").unwrap().filename_matches("Statement_7389_x.csv"));
    }

    #[derive(Debug)]
    struct Impostor(Descriptor);

    impl FormatHandler for Impostor {
        fn descriptor(&self) -> &Descriptor {
            &self.0
        }

        fn filename_matches(&self, _file_name: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_conflicting_handler_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let mut r = Registry::new(sink.clone());
        r.register(Arc::new(Bbt::new(&BbtConfig::default()).unwrap())).unwrap();

        let mut desc = Usaa::new(&UsaaConfig::default()).unwrap().descriptor().clone();
        desc.institution = "bbt".to_string();

        let err = r.register(Arc::new(Impostor(desc))).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateHandler(ref id) if id == "bbt"));
        assert!(err.is_configuration_fault());
        assert!(sink.contains(Level::ERROR, "bbt"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_invalid_descriptor_is_not_registered() {
        let mut desc = Usaa::new(&UsaaConfig::default()).unwrap().descriptor().clone();
        desc.institution = "broken".to_string();
        for f in &mut desc.fields {
            f.anchor = false;
        }
        let mut r = Registry::new(Arc::new(NullSink));
        let err = r.register(Arc::new(Impostor(desc))).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDescriptor { .. }));
        assert!(r.is_empty());
    }

    #[test]
    fn test_describe_lists_columns() {
        let r = Registry::with_builtin(&HandlerConfig::default(), Arc::new(NullSink)).unwrap();
        let d = r.describe();
        assert!(d["bbt"].contains(&"Daily Posted Balance".to_string()));
        assert_eq!(d["usaa"].len(), 5);
    }
}
