//! USAA export.
//!
//! No header, seven comma separated fields:
//!   posted,,01/02/2020,,LEGIT EMPLOYER SALARY,Paychecks/Salary,1000
//!   0       2            4                     5                6
//!
//! Columns 1 and 3 are unused. Only `posted` rows are kept; forecasted
//! rows are dropped before remapping. The bank's own category text is
//! classified, with the description as fallback.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tally_core::{Column, Value};

use crate::convert::Converter;
use crate::error::Result;
use crate::handler::{AccountRule, Descriptor, FieldSpec, FormatHandler, Layout};

pub const INSTITUTION: &str = "usaa";

const WIDTH: usize = 7;
const POSTED: &str = "posted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsaaConfig {
    /// USAA file names carry no account, so it is configured.
    pub account: u32,
    pub extension: String,
}

impl Default for UsaaConfig {
    fn default() -> Self {
        Self {
            account: 0,
            extension: "csv".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Usaa {
    descriptor: Descriptor,
    extension: String,
    posted_idx: usize,
}

impl Usaa {
    pub fn new(config: &UsaaConfig) -> Result<Self> {
        let descriptor = Descriptor {
            institution: INSTITUTION.to_string(),
            delimiter: b',',
            layout: Layout::Positional { width: WIDTH },
            fields: vec![
                FieldSpec::at(0, POSTED, Converter::PostedFlag),
                FieldSpec::at(2, "date", Converter::Date).to(Column::Date).anchor(),
                FieldSpec::at(4, "description", Converter::Text).to(Column::Description),
                FieldSpec::at(5, "category", Converter::Category).to(Column::Category),
                FieldSpec::at(6, "amount", Converter::DashSignedAmount).to(Column::Amount).anchor(),
            ],
            account: AccountRule::Fixed(config.account),
        };
        descriptor.validate()?;
        let posted_idx = descriptor
            .fields
            .iter()
            .position(|f| f.name == POSTED)
            .unwrap_or_default();

        Ok(Self {
            descriptor,
            extension: config.extension.trim_start_matches('.').to_string(),
            posted_idx,
        })
    }
}

impl FormatHandler for Usaa {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn filename_matches(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    fn keep_row(&self, row: &[Value]) -> bool {
        row.get(self.posted_idx).and_then(Value::as_flag).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Probe;
    use tally_core::Classifier;

    const SAMPLE: &str = "forecasted,,01/01/2020,,FUNDS TRANSFER,Uncategorized,-3.50
posted,,01/02/2020,,LEGIT EMPLOYER SALARY,Paychecks/Salary,1000
posted,,01/03/2020,,LEGIT WASTE SERVICE,Utilities,-20.25
";

    fn usaa() -> Usaa {
        Usaa::new(&UsaaConfig::default()).unwrap()
    }

    #[test]
    fn test_filename_is_extension_only() {
        let u = usaa();
        assert!(u.filename_matches("export.csv"));
        assert!(u.filename_matches("EXPORT.CSV"));
        assert!(!u.filename_matches("export.txt"));
        assert!(!u.filename_matches("csv"));
    }

    #[test]
    fn test_content_probe_needs_seven_fields() {
        let u = usaa();
        let classifier = Classifier::builtin().unwrap();
        assert!(u.content_matches(&Probe::from_text(SAMPLE), &classifier));

        let six = "posted,,01/02/2020,,LEGIT,Salary\n";
        assert!(!u.content_matches(&Probe::from_text(six), &classifier));

        let bbt_like = "Date,Transaction Type,Check Number,Description,Amount,Daily Posted Balance\n";
        assert!(!u.content_matches(&Probe::from_text(bbt_like), &classifier));
    }

    #[test]
    fn test_content_probe_rejects_bad_anchor() {
        let u = usaa();
        let classifier = Classifier::builtin().unwrap();
        let bad_date = SAMPLE.replace("01/03/2020", "2020-01-03");
        assert!(!u.content_matches(&Probe::from_text(&bad_date), &classifier));
        let bad_amount = SAMPLE.replace("-20.25", "$20.25");
        assert!(!u.content_matches(&Probe::from_text(&bad_amount), &classifier));
    }

    #[test]
    fn test_keep_row_only_posted() {
        let u = usaa();
        assert!(u.keep_row(&[Value::Flag(true)]));
        assert!(!u.keep_row(&[Value::Flag(false)]));
        assert!(!u.keep_row(&[]));
    }

    #[test]
    fn test_account_is_configured() {
        let u = Usaa::new(&UsaaConfig { account: 4321, ..UsaaConfig::default() }).unwrap();
        assert_eq!(u.resolve_account(Path::new("whatever.csv")).unwrap(), 4321);
    }
}
