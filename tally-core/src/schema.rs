//! Canonical transaction schema shared by every institution handler.
//!
//! Every parsed row exposes all of [`Column::ALL`], in that order, regardless
//! of which subset the source file actually reported.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::category::Category;

/// Check number used when the source row has none (or an unreadable one).
pub const NO_CHECK_NUMBER: i64 = -1;

/// Canonical column names, declared in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Column {
    Date,
    Amount,
    Description,
    Category,
    CheckNo,
    Bank,
    Account,
    PostedBalance,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Date,
        Column::Amount,
        Column::Description,
        Column::Category,
        Column::CheckNo,
        Column::Bank,
        Column::Account,
        Column::PostedBalance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "DATE",
            Column::Amount => "AMOUNT",
            Column::Description => "DESCRIPTION",
            Column::Category => "CATEGORY",
            Column::CheckNo => "CHECK_NO",
            Column::Bank => "BANK",
            Column::Account => "ACCOUNT",
            Column::PostedBalance => "POSTED_BALANCE",
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Column::ALL.iter().map(|c| c.name())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single converted cell.
///
/// `Null` stands for "not reported"; it is distinct from sentinels such as
/// [`NO_CHECK_NUMBER`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Flag(bool),
    Int(i64),
    Money(Decimal),
    Date(NaiveDate),
    Text(String),
    Category(Category),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_money(&self) -> Option<Decimal> {
        match self {
            Value::Money(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<Category> {
        match self {
            Value::Category(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Flag(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Money(m) => write!(f, "{m}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
            Value::Category(c) => f.write_str(c.name()),
        }
    }
}

/// One canonical row. Serialized field names are the canonical column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Transaction {
    pub date: NaiveDate,
    /// Positive = credit, negative = debit.
    pub amount: Decimal,
    pub description: String,
    pub category: Category,
    /// [`NO_CHECK_NUMBER`] when the row carries no check.
    pub check_no: i64,
    /// Institution identifier of the handler that produced the row.
    pub bank: String,
    pub account: u32,
    /// Sparse: only some rows report the daily posted balance.
    pub posted_balance: Option<Decimal>,
}

impl Transaction {
    /// Look up a field by canonical column.
    pub fn get(&self, column: Column) -> Value {
        match column {
            Column::Date => Value::Date(self.date),
            Column::Amount => Value::Money(self.amount),
            Column::Description => Value::Text(self.description.clone()),
            Column::Category => Value::Category(self.category),
            Column::CheckNo => Value::Int(self.check_no),
            Column::Bank => Value::Text(self.bank.clone()),
            Column::Account => Value::Int(i64::from(self.account)),
            Column::PostedBalance => self.posted_balance.map(Value::Money).unwrap_or_default(),
        }
    }

    pub fn has_check(&self) -> bool {
        self.check_no != NO_CHECK_NUMBER
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

/// The canonical table produced for one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionTable {
    pub source: PathBuf,
    pub rows: Vec<Transaction>,
}

impl TransactionTable {
    pub fn new(source: impl AsRef<Path>, rows: Vec<Transaction>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            rows,
        }
    }

    /// Canonical column set, identical for every table.
    pub fn columns(&self) -> &'static [Column] {
        &Column::ALL
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, column: Column) -> Vec<Value> {
        self.rows.iter().map(|r| r.get(column)).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all amounts.
    pub fn total(&self) -> Decimal {
        self.rows.iter().map(|r| r.amount).sum()
    }

    /// The last posted balance reported in the file, if any row reported one.
    pub fn last_posted_balance(&self) -> Option<Decimal> {
        self.rows.iter().rev().find_map(|r| r.posted_balance)
    }

    pub fn check_numbers(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.check_no).collect()
    }
}
