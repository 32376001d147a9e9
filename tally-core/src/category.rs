//! Spending categories assigned to canonical transactions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction categories matched by the keyword classifier.
///
/// Serialized as the upper-case name (`"GROCERIES"`), which is also the
/// spelling used in rule files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Unknown,
    Salary,
    Housing,
    Retirement,
    Investments,
    Medical,
    Vehicles,
    Communications,
    Household,
    Groceries,
    Restaurants,
    Taxes,
    Personal,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Unknown,
        Category::Salary,
        Category::Housing,
        Category::Retirement,
        Category::Investments,
        Category::Medical,
        Category::Vehicles,
        Category::Communications,
        Category::Household,
        Category::Groceries,
        Category::Restaurants,
        Category::Taxes,
        Category::Personal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Unknown => "UNKNOWN",
            Category::Salary => "SALARY",
            Category::Housing => "HOUSING",
            Category::Retirement => "RETIREMENT",
            Category::Investments => "INVESTMENTS",
            Category::Medical => "MEDICAL",
            Category::Vehicles => "VEHICLES",
            Category::Communications => "COMMUNICATIONS",
            Category::Household => "HOUSEHOLD",
            Category::Groceries => "GROCERIES",
            Category::Restaurants => "RESTAURANTS",
            Category::Taxes => "TAXES",
            Category::Personal => "PERSONAL",
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}
