//! BB&T / Truist checking export.
//!
//! Header row, comma separated:
//!   Date,Transaction Type,Check Number,Description,Amount,Daily Posted Balance
//!   01/02/2020,Debit,,KROGER STORE DEBIT CARD,($42),$958
//!   01/01/2020,Credit,,LEGIT EMPLOYER SALARY,$+1000,$0.00
//!
//! `Daily Posted Balance` is optional and sparse. File names look like
//! `Acct_7389_<anything>`, where the four digits are the account.

use regex::Regex;
use serde::{Deserialize, Serialize};

use tally_core::Column;

use crate::convert::Converter;
use crate::error::{IngestError, Result};
use crate::handler::{AccountRule, Descriptor, FieldSpec, FormatHandler, Layout};

pub const INSTITUTION: &str = "bbt";

const DATE: &str = "Date";
const TRANSACTION_TYPE: &str = "Transaction Type";
const CHECK_NUMBER: &str = "Check Number";
const DESCRIPTION: &str = "Description";
const AMOUNT: &str = "Amount";
const POSTED_BALANCE: &str = "Daily Posted Balance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BbtConfig {
    pub file_prefix: String,
    /// Accepted accounts; empty accepts any four-digit account.
    pub accounts: Vec<u32>,
}

impl Default for BbtConfig {
    fn default() -> Self {
        Self {
            file_prefix: "Acct_".to_string(),
            accounts: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Bbt {
    descriptor: Descriptor,
    filename: Regex,
    accounts: Vec<u32>,
}

impl Bbt {
    pub fn new(config: &BbtConfig) -> Result<Self> {
        let pattern = format!(r"^{}(\d{{4}})_", regex::escape(&config.file_prefix));
        let filename = Regex::new(&pattern).map_err(|e| IngestError::InvalidDescriptor {
            institution: INSTITUTION.to_string(),
            reason: e.to_string(),
        })?;

        let descriptor = Descriptor {
            institution: INSTITUTION.to_string(),
            delimiter: b',',
            layout: Layout::Header {
                required: [DATE, TRANSACTION_TYPE, CHECK_NUMBER, DESCRIPTION, AMOUNT]
                    .map(String::from)
                    .to_vec(),
                optional: vec![POSTED_BALANCE.to_string()],
            },
            fields: vec![
                FieldSpec::named(DATE, Converter::Date).to(Column::Date).anchor(),
                FieldSpec::named(TRANSACTION_TYPE, Converter::Text),
                FieldSpec::named(CHECK_NUMBER, Converter::CheckNumber).to(Column::CheckNo),
                FieldSpec::named(DESCRIPTION, Converter::Text).to(Column::Description),
                FieldSpec::named(AMOUNT, Converter::ParenDollarAmount).to(Column::Amount).anchor(),
                FieldSpec::named(POSTED_BALANCE, Converter::PostedBalance).to(Column::PostedBalance),
            ],
            account: AccountRule::FromFilename,
        };
        descriptor.validate()?;

        Ok(Self {
            descriptor,
            filename,
            accounts: config.accounts.clone(),
        })
    }
}

impl FormatHandler for Bbt {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn filename_matches(&self, file_name: &str) -> bool {
        self.account_from_filename(file_name).is_some()
    }

    fn account_from_filename(&self, file_name: &str) -> Option<u32> {
        let account: u32 = self.filename.captures(file_name)?.get(1)?.as_str().parse().ok()?;
        if self.accounts.is_empty() || self.accounts.contains(&account) {
            Some(account)
        } else {
            None
        }
    }
}
