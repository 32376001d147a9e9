//! Built-in institution handlers.

pub mod bbt;
pub mod usaa;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use bbt::{Bbt, BbtConfig};
pub use usaa::{Usaa, UsaaConfig};

use crate::error::Result;
use crate::handler::FormatHandler;

/// Settings for the built-in handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub bbt: BbtConfig,
    pub usaa: UsaaConfig,
}

/// Every built-in handler, in registration order.
pub fn builtin(config: &HandlerConfig) -> Result<Vec<Arc<dyn FormatHandler>>> {
    Ok(vec![
        Arc::new(Bbt::new(&config.bbt)?),
        Arc::new(Usaa::new(&config.usaa)?),
    ])
}
