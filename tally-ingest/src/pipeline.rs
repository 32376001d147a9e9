//! Per-file parse session: detect, read, convert, remap, classify.
//!
//! The session moves strictly forward through [`Stage`]; any failure lands in
//! `Rejected` and the session cannot be run again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tally_core::{Column, TransactionTable, Value};

use crate::convert::ConvertContext;
use crate::detect::Detector;
use crate::error::{IngestError, Result};
use crate::handler::FormatHandler;
use crate::remap::remap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Unparsed,
    Detected,
    RawRead,
    Converted,
    Remapped,
    Classified,
    Done,
    Rejected,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Rejected)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Unparsed => "UNPARSED",
            Stage::Detected => "DETECTED",
            Stage::RawRead => "RAW_READ",
            Stage::Converted => "CONVERTED",
            Stage::Remapped => "REMAPPED",
            Stage::Classified => "CLASSIFIED",
            Stage::Done => "DONE",
            Stage::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ParseSession {
    path: PathBuf,
    stage: Stage,
    handler: Option<Arc<dyn FormatHandler>>,
    account: Option<u32>,
    detector: Detector,
}

impl fmt::Debug for ParseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseSession")
            .field("path", &self.path)
            .field("stage", &self.stage)
            .field("institution", &self.institution())
            .field("account", &self.account)
            .finish()
    }
}

impl ParseSession {
    /// A session that will run detection itself. Fails at once if the file
    /// does not exist.
    pub fn open(path: impl AsRef<Path>, detector: &Detector) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(IngestError::MissingFile(path));
        }
        Ok(Self {
            path,
            stage: Stage::Unparsed,
            handler: None,
            account: None,
            detector: detector.clone(),
        })
    }

    /// A session for a handler picked by the caller; starts at `Detected`.
    pub fn with_handler(
        path: impl AsRef<Path>,
        handler: Arc<dyn FormatHandler>,
        detector: &Detector,
    ) -> Result<Self> {
        let mut session = Self::open(path, detector)?;
        if let Err(e) = session.attach(handler) {
            session.reject(&e);
            return Err(e);
        }
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn account(&self) -> Option<u32> {
        self.account
    }

    pub fn institution(&self) -> Option<&str> {
        self.handler.as_deref().map(|h| h.institution())
    }

    /// Run the remaining stages and produce the canonical table.
    pub fn parse(&mut self) -> Result<TransactionTable> {
        if self.stage.is_terminal() {
            return Err(IngestError::SessionFinished {
                path: self.path.clone(),
                stage: self.stage.to_string(),
            });
        }
        let result = self.run();
        if let Err(e) = &result {
            self.reject(e);
        }
        result
    }

    fn run(&mut self) -> Result<TransactionTable> {
        let handler = match &self.handler {
            Some(h) => h.clone(),
            None => {
                let h = self.detector.detect(&self.path)?;
                self.attach(h.clone())?;
                h
            }
        };
        let account = self
            .account
            .ok_or_else(|| IngestError::Account(self.path.clone()))?;

        let diagnostics = self.detector.diagnostics().clone();
        let records = handler.read_records(&self.path, diagnostics.as_ref())?;
        self.advance(Stage::RawRead);

        let classifier = self.detector.classifier().clone();
        let ctx = ConvertContext {
            diagnostics: diagnostics.as_ref(),
            classifier: classifier.as_ref(),
        };
        let converted = handler.convert_records(&self.path, &records, &ctx)?;
        self.advance(Stage::Converted);

        let mut frame = remap(&converted, &handler.descriptor().mapping());
        frame.fill(Column::Bank, Value::Text(handler.institution().to_string()));
        frame.fill(Column::Account, Value::Int(i64::from(account)));
        self.advance(Stage::Remapped);

        frame.classify(&classifier);
        self.advance(Stage::Classified);

        let rows = frame.into_transactions(&self.path)?;
        self.advance(Stage::Done);
        self.detector.diagnostics().info(&format!(
            "{}: {} rows from {} account {account}",
            self.path.display(),
            rows.len(),
            handler.institution()
        ));
        Ok(TransactionTable::new(&self.path, rows))
    }

    fn attach(&mut self, handler: Arc<dyn FormatHandler>) -> Result<()> {
        self.account = Some(handler.resolve_account(&self.path)?);
        self.handler = Some(handler);
        self.advance(Stage::Detected);
        Ok(())
    }

    fn advance(&mut self, next: Stage) {
        self.detector.diagnostics().debug(&format!(
            "{}: {} -> {next}",
            self.path.display(),
            self.stage
        ));
        self.stage = next;
    }

    fn reject(&mut self, error: &IngestError) {
        let diagnostics = self.detector.diagnostics();
        match error {
            // already reported by the detector
            IngestError::NoHandler(_) | IngestError::AmbiguousHandler { .. } => {}
            other => diagnostics.error(&other.to_string()),
        }
        self.advance(Stage::Rejected);
    }
}

/// Detect and parse one file.
pub fn parse_file(path: impl AsRef<Path>, detector: &Detector) -> Result<TransactionTable> {
    ParseSession::open(path, detector)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerConfig;
    use crate::probe::ProbeLimits;
    use crate::registry::Registry;
    use std::fs;
    use tally_core::{Category, Classifier, Level, MemorySink};
    use tempfile::TempDir;

    fn detector(sink: Arc<MemorySink>) -> Detector {
        let registry = Registry::with_builtin(&HandlerConfig::default(), sink).unwrap();
        Detector::new(
            Arc::new(registry),
            Arc::new(Classifier::builtin().unwrap()),
            ProbeLimits::default(),
        )
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Unparsed < Stage::Detected);
        assert!(Stage::Classified < Stage::Done);
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Rejected.is_terminal());
        assert!(!Stage::RawRead.is_terminal());
        assert_eq!(Stage::RawRead.to_string(), "RAW_READ");
    }

    #[test]
    fn test_missing_file_fails_on_open() {
        let d = detector(Arc::new(MemorySink::new()));
        let err = ParseSession::open("/nope/Acct_7389_x.csv", &d).unwrap_err();
        assert!(matches!(err, IngestError::MissingFile(_)));
    }

    #[test]
    fn test_session_walks_every_stage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acct_1234_jan.csv");
        fs::write(
            &path,
            "Date,Transaction Type,Check Number,Description,Amount,Daily Posted Balance\n\
             01/01/2020,Credit,,LEGIT EMPLOYER SALARY,$+1000,$1000\n\
             01/02/2020,Debit,,KROGER STORE,($42),$958\n",
        )
        .unwrap();

        let sink = Arc::new(MemorySink::new());
        let d = detector(sink.clone());
        let mut session = ParseSession::open(&path, &d).unwrap();
        assert_eq!(session.stage(), Stage::Unparsed);

        let table = session.parse().unwrap();
        assert_eq!(session.stage(), Stage::Done);
        assert_eq!(session.institution(), Some("bbt"));
        assert_eq!(session.account(), Some(1234));
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].category, Category::Salary);
        assert_eq!(table.rows[1].category, Category::Groceries);
        assert_eq!(table.rows[1].bank, "bbt");
        assert!(sink.contains(Level::DEBUG, "CONVERTED -> REMAPPED"));

        let again = session.parse().unwrap_err();
        assert!(matches!(again, IngestError::SessionFinished { .. }));
    }

    #[test]
    fn test_unmatched_file_is_rejected_at_detection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readme.md");
        fs::write(&path, "# hi\n").unwrap();

        let d = detector(Arc::new(MemorySink::new()));
        let mut session = ParseSession::open(&path, &d).unwrap();
        assert!(matches!(session.parse(), Err(IngestError::NoHandler(_))));
        assert_eq!(session.stage(), Stage::Rejected);
    }

    #[test]
    fn test_with_handler_starts_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usaa.csv");
        fs::write(&path, "posted,,01/02/2020,,LEGIT EMPLOYER SALARY,Paychecks/Salary,1000\n").unwrap();

        let d = detector(Arc::new(MemorySink::new()));
        let usaa = d.registry().get("usaa").unwrap().clone();
        let mut session = ParseSession::with_handler(&path, usaa, &d).unwrap();
        assert_eq!(session.stage(), Stage::Detected);
        assert_eq!(session.account(), Some(0));
        assert_eq!(session.parse().unwrap().len(), 1);
    }
}
