//! Field converters: one raw string in, one typed [`Value`] out.
//!
//! Only the date converter fails hard. Every other converter recovers
//! locally: it reports an error through the diagnostic sink and returns
//! `Null` (or the check-number sentinel), so one bad cell never aborts a file.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use tally_core::{Category, Classifier, Diagnostics, NO_CHECK_NUMBER, Value};

/// Date layout shared by every supported export (`01/31/2020`).
pub const MDY_DATE: &str = "%m/%d/%Y";

const POSTED_MARKER: &str = "posted";
const FORECAST_MARKER: &str = "forecasted";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {raw:?} to a {kind}: {reason}")]
pub struct ConvertError {
    pub kind: &'static str,
    pub raw: String,
    pub reason: String,
}

/// Everything a converter may consult besides the raw text.
#[derive(Clone, Copy)]
pub struct ConvertContext<'a> {
    pub diagnostics: &'a dyn Diagnostics,
    pub classifier: &'a Classifier,
}

/// Converter attached to a raw column in a handler descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Trimmed text, kept as-is.
    Text,
    /// `MM/DD/YYYY`.
    Date,
    /// `($X.XX)` debit, `$+X.XX` credit.
    ParenDollarAmount,
    /// `--X` posted, `-X` negative, bare `X` forecasted reading.
    DashSignedAmount,
    CheckNumber,
    PostedBalance,
    /// `posted` / `forecasted` confirmation flag.
    PostedFlag,
    /// Free text classified into a [`Category`].
    Category,
}

impl Converter {
    pub fn convert(&self, raw: Option<&str>, ctx: &ConvertContext<'_>) -> Result<Value, ConvertError> {
        let d = ctx.diagnostics;
        match self {
            Converter::Text => Ok(convert_text(raw)),
            Converter::Date => convert_date(raw).map(Value::Date),
            Converter::ParenDollarAmount => Ok(money_or_null(convert_paren_dollar_amount(raw, d))),
            Converter::DashSignedAmount => Ok(money_or_null(convert_dash_signed_amount(raw, d))),
            Converter::CheckNumber => Ok(Value::Int(convert_check_number(raw, d))),
            Converter::PostedBalance => Ok(money_or_null(convert_posted_balance(raw, d))),
            Converter::PostedFlag => Ok(Value::Flag(convert_posted_flag(raw, d))),
            Converter::Category => Ok(Value::Category(convert_category(raw, ctx.classifier))),
        }
    }
}

fn money_or_null(m: Option<Decimal>) -> Value {
    m.map(Value::Money).unwrap_or_default()
}

fn trimmed(raw: Option<&str>) -> &str {
    raw.map(str::trim).unwrap_or("")
}

pub fn convert_text(raw: Option<&str>) -> Value {
    Value::Text(trimmed(raw).to_string())
}

/// Parse `MM/DD/YYYY`. Failure is propagated: the date is an anchor column.
pub fn convert_date(raw: Option<&str>) -> Result<NaiveDate, ConvertError> {
    let s = trimmed(raw);
    NaiveDate::parse_from_str(s, MDY_DATE).map_err(|e| ConvertError {
        kind: "date",
        raw: s.to_string(),
        reason: e.to_string(),
    })
}

/// Digits with an optional fraction and optional thousands separators.
fn parse_unsigned(s: &str) -> Option<Decimal> {
    let s = s.replace(',', "");
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Decimal::from_str(&s).ok()
}

/// `($2.34)` is a debit of 2.34, `$+1.23` a credit of 1.23.
pub fn convert_paren_dollar_amount(raw: Option<&str>, diag: &dyn Diagnostics) -> Option<Decimal> {
    let s = trimmed(raw);
    let parsed = if let Some(inner) = s.strip_prefix("($").and_then(|r| r.strip_suffix(')')) {
        parse_unsigned(inner).map(|d| -d)
    } else if let Some(inner) = s.strip_prefix("$+") {
        parse_unsigned(inner)
    } else {
        None
    };

    if parsed.is_none() {
        diag.error(&format!(
            "can't parse amount, doesn't look like '($X)' or '$+X': {s:?}"
        ));
    }
    parsed
}

/// `--1.23` is a posted 1.23, `-2.34` is -2.34, and a bare `5.00` is a
/// forecasted reading of 5.00.
pub fn convert_dash_signed_amount(raw: Option<&str>, diag: &dyn Diagnostics) -> Option<Decimal> {
    let s = trimmed(raw);
    let parsed = if let Some(rest) = s.strip_prefix("--") {
        parse_unsigned(rest)
    } else if let Some(rest) = s.strip_prefix('-') {
        parse_unsigned(rest).map(|d| -d)
    } else {
        parse_unsigned(s)
    };

    if parsed.is_none() {
        diag.error(&format!(
            "can't parse amount, expected '--X', '-X' or 'X': {s:?}"
        ));
    }
    parsed
}

/// Empty or missing → [`NO_CHECK_NUMBER`]. Garbage → sentinel plus an error event.
pub fn convert_check_number(raw: Option<&str>, diag: &dyn Diagnostics) -> i64 {
    let s = trimmed(raw);
    if s.is_empty() {
        return NO_CHECK_NUMBER;
    }
    match s.parse::<u32>() {
        Ok(n) => i64::from(n),
        Err(_) => {
            diag.error(&format!("can't parse check number: {s:?}"));
            NO_CHECK_NUMBER
        }
    }
}

/// Sparse column: empty → `None`. Accepts `$958`, `$1,016.00`, `-$5` and `($5)`.
pub fn convert_posted_balance(raw: Option<&str>, diag: &dyn Diagnostics) -> Option<Decimal> {
    let s = trimmed(raw);
    if s.is_empty() {
        return None;
    }

    let parsed = if let Some(inner) = s.strip_prefix("($").and_then(|r| r.strip_suffix(')')) {
        parse_unsigned(inner).map(|d| -d)
    } else if let Some(inner) = s.strip_prefix("-$") {
        parse_unsigned(inner).map(|d| -d)
    } else if let Some(inner) = s.strip_prefix('$') {
        parse_unsigned(inner)
    } else {
        None
    };

    if parsed.is_none() {
        diag.error(&format!("can't parse posted balance: {s:?}"));
    }
    parsed
}

/// True only for the posted marker.
pub fn convert_posted_flag(raw: Option<&str>, diag: &dyn Diagnostics) -> bool {
    let s = trimmed(raw);
    if s.eq_ignore_ascii_case(POSTED_MARKER) {
        return true;
    }
    if !s.eq_ignore_ascii_case(FORECAST_MARKER) {
        diag.warn(&format!("unexpected confirmation flag {s:?}, treating as not posted"));
    }
    false
}

pub fn convert_category(raw: Option<&str>, classifier: &Classifier) -> Category {
    classifier.classify(trimmed(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Level, MemorySink, NullSink};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Inverse of the paren/dollar encoding, for round-trip checks.
    fn encode_paren_dollar(amount: Decimal) -> String {
        if amount.is_sign_negative() {
            format!("(${})", -amount)
        } else {
            format!("$+{amount}")
        }
    }

    #[test]
    fn test_paren_dollar_credit_and_debit() {
        assert_eq!(convert_paren_dollar_amount(Some("$+1.23"), &NullSink), Some(dec("1.23")));
        assert_eq!(convert_paren_dollar_amount(Some("($2.34)"), &NullSink), Some(dec("-2.34")));
        assert_eq!(convert_paren_dollar_amount(Some("$+1,000.00"), &NullSink), Some(dec("1000")));
    }

    #[test]
    fn test_paren_dollar_rejects_malformed() {
        let sink = MemorySink::new();
        assert_eq!(convert_paren_dollar_amount(Some("+100"), &sink), None);
        assert_eq!(convert_paren_dollar_amount(Some("$9000"), &sink), None);
        assert_eq!(convert_paren_dollar_amount(Some("($12"), &sink), None);
        assert_eq!(convert_paren_dollar_amount(None, &sink), None);
        assert_eq!(sink.count(Level::ERROR), 4);
    }

    #[test]
    fn test_paren_dollar_round_trip() {
        for s in ["0.01", "1.23", "-2.34", "1000", "-42", "19.90", "-1234.56"] {
            let x = dec(s);
            assert_eq!(convert_paren_dollar_amount(Some(&encode_paren_dollar(x)), &NullSink), Some(x));
        }
    }

    #[test]
    fn test_dash_signed_amount() {
        assert_eq!(convert_dash_signed_amount(Some("--1.23"), &NullSink), Some(dec("1.23")));
        assert_eq!(convert_dash_signed_amount(Some("-2.34"), &NullSink), Some(dec("-2.34")));
        assert_eq!(convert_dash_signed_amount(Some("1000"), &NullSink), Some(dec("1000")));
    }

    #[test]
    fn test_dash_signed_rejects_non_numeric() {
        let sink = MemorySink::new();
        assert_eq!(convert_dash_signed_amount(Some("$9000"), &sink), None);
        assert_eq!(convert_dash_signed_amount(Some("abc"), &sink), None);
        assert_eq!(convert_dash_signed_amount(Some("---1"), &sink), None);
        assert_eq!(convert_dash_signed_amount(Some(""), &sink), None);
        assert_eq!(sink.count(Level::ERROR), 4);
    }

    #[test]
    fn test_convert_date() {
        assert_eq!(convert_date(Some("01/02/2020")).unwrap(), NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(convert_date(Some(" 12/31/2019 ")).unwrap(), NaiveDate::from_ymd_opt(2019, 12, 31).unwrap());
    }

    #[test]
    fn test_convert_date_fails_hard() {
        let err = convert_date(Some("2020-01-02")).unwrap_err();
        assert_eq!(err.kind, "date");
        assert_eq!(err.raw, "2020-01-02");
        assert!(convert_date(Some("13/01/2020")).is_err());
        assert!(convert_date(None).is_err());
    }

    #[test]
    fn test_check_number() {
        assert_eq!(convert_check_number(Some("9000"), &NullSink), 9000);
        assert_eq!(convert_check_number(Some("301"), &NullSink), 301);
    }

    #[test]
    fn test_check_number_sentinel_not_zero() {
        let sink = MemorySink::new();
        assert_eq!(convert_check_number(Some(""), &sink), NO_CHECK_NUMBER);
        assert_eq!(convert_check_number(None, &sink), NO_CHECK_NUMBER);
        assert_ne!(convert_check_number(None, &sink), 0);
        assert_eq!(sink.count(Level::ERROR), 0);

        assert_eq!(convert_check_number(Some("abc"), &sink), NO_CHECK_NUMBER);
        assert_eq!(sink.count(Level::ERROR), 1);
    }

    #[test]
    fn test_posted_balance() {
        let sink = MemorySink::new();
        assert_eq!(convert_posted_balance(Some(""), &sink), None);
        assert_eq!(convert_posted_balance(None, &sink), None);
        assert_eq!(sink.count(Level::ERROR), 0);

        assert_eq!(convert_posted_balance(Some("$0.00"), &sink), Some(dec("0")));
        assert_eq!(convert_posted_balance(Some("$1016"), &sink), Some(dec("1016")));
        assert_eq!(convert_posted_balance(Some("($5.10)"), &sink), Some(dec("-5.10")));
        assert_eq!(convert_posted_balance(Some("-$5"), &sink), Some(dec("-5")));

        assert_eq!(convert_posted_balance(Some("958"), &sink), None);
        assert_eq!(sink.count(Level::ERROR), 1);
    }

    #[test]
    fn test_posted_flag() {
        let sink = MemorySink::new();
        assert!(convert_posted_flag(Some("posted"), &sink));
        assert!(!convert_posted_flag(Some("forecasted"), &sink));
        assert_eq!(sink.count(Level::WARN), 0);
        assert!(!convert_posted_flag(Some("pending"), &sink));
        assert_eq!(sink.count(Level::WARN), 1);
    }

    #[test]
    fn test_converter_dispatch_recovers_locally() {
        let classifier = Classifier::builtin().unwrap();
        let sink = MemorySink::new();
        let ctx = ConvertContext { diagnostics: &sink, classifier: &classifier };

        assert_eq!(Converter::ParenDollarAmount.convert(Some("junk"), &ctx), Ok(Value::Null));
        assert_eq!(Converter::CheckNumber.convert(Some(""), &ctx), Ok(Value::Int(-1)));
        assert_eq!(Converter::PostedBalance.convert(Some(""), &ctx), Ok(Value::Null));
        assert_eq!(
            Converter::Category.convert(Some("Groceries"), &ctx),
            Ok(Value::Category(Category::Groceries))
        );
        assert_eq!(Converter::Text.convert(Some("  x "), &ctx), Ok(Value::Text("x".to_string())));
        assert!(Converter::Date.convert(Some("junk"), &ctx).is_err());
    }
}
