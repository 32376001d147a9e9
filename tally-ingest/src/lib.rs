pub mod batch;
pub mod convert;
pub mod detect;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod remap;

pub use batch::{BatchReport, FileOutcome, list_files, parse_directory, parse_paths, parse_paths_concurrent};
pub use convert::{ConvertContext, ConvertError, Converter};
pub use detect::Detector;
pub use error::{IngestError, Result};
pub use handler::{AccountRule, Descriptor, FieldSpec, FormatHandler, Layout};
pub use handlers::HandlerConfig;
pub use pipeline::{ParseSession, Stage, parse_file};
pub use probe::{Probe, ProbeLimits};
pub use registry::Registry;
pub use remap::{ConvertedTable, Frame, remap};
