use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Service filters understood by the cost API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostService {
    Compute,
    Storage,
    Database,
}

impl CostService {
    /// Billing dimension value used when filtering by `SERVICE`.
    pub fn billing_name(&self) -> &'static str {
        match self {
            Self::Compute => "Amazon Elastic Compute Cloud - Compute",
            Self::Storage => "Amazon Simple Storage Service",
            Self::Database => "Amazon Relational Database Service",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compute" | "ec2" => Some(Self::Compute),
            "storage" | "s3" => Some(Self::Storage),
            "database" | "rds" => Some(Self::Database),
            _ => None,
        }
    }
}

impl fmt::Display for CostService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open `[start, end)` span of calendar dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The whole calendar month containing `day`.
    pub fn month_of(day: NaiveDate) -> Option<Self> {
        let start = first_of_month(day.year(), day.month())?;
        let end = add_months(start, 1)?;
        Some(Self { start, end })
    }

    /// The calendar month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Option<Self> {
        let end = first_of_month(today.year(), today.month())?;
        let start = add_months(end, -1)?;
        Some(Self { start, end })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub amount: Decimal,
    pub unit: String,
}

pub fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Shift the first-of-month containing `date` by `months`, which may be negative.
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    first_of_month(year, month)
}
