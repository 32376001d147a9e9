//! tally-core: canonical transaction schema, category classifier and the
//! diagnostic sink shared by the ingest pipeline.

pub mod category;
pub mod classifier;
pub mod diagnostics;
pub mod schema;

pub use category::Category;
pub use classifier::{Classifier, Rule, RuleSet, RulesError};
pub use diagnostics::{Diagnostics, Level, MemorySink, NullSink, TracingSink};
pub use schema::{Column, NO_CHECK_NUMBER, Transaction, TransactionTable, Value};
