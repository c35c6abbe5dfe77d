use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// A calendar month, the unit every partitioned table is keyed by.
///
/// The canonical text form is `YYYY-MM`; that is what lands in the
/// `partition_date` column and in slice file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPartition {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionKeyError {
    #[error("partition key {0:?} is not of the form YYYY-MM or YYYY-MM-DD")]
    Malformed(String),
    #[error("partition key {0:?} names a month outside 1..=12")]
    MonthOutOfRange(String),
}

impl MonthPartition {
    /// Compile-time constructor; `month` must already be in `1..=12`.
    pub const fn const_month(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month (inclusive lower bound).
    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following month (exclusive upper bound).
    pub fn end_exclusive(&self) -> NaiveDate {
        self.next().start()
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date < self.end_exclusive()
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Every month in `[start, end)`.
    pub fn range(start: Self, end: Self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = start;
        while current < end {
            out.push(current);
            current = current.next();
        }
        out
    }
}

impl fmt::Display for MonthPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPartition {
    type Err = PartitionKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let malformed = || PartitionKeyError::Malformed(raw.to_string());

        let mut parts = trimmed.split('-');
        let year = parts
            .next()
            .filter(|p| p.len() == 4)
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(malformed)?;
        let month = parts
            .next()
            .filter(|p| p.len() == 2)
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        let day = match parts.next() {
            Some(p) if p.len() == 2 => Some(p.parse::<u32>().map_err(|_| malformed())?),
            Some(_) => return Err(malformed()),
            None => None,
        };
        if parts.next().is_some() {
            return Err(malformed());
        }

        let partition = Self::new(year, month)
            .ok_or_else(|| PartitionKeyError::MonthOutOfRange(raw.to_string()))?;
        // Scheduler keys are anchored on the first of the month; any valid day
        // collapses onto its month.
        if let Some(day) = day
            && NaiveDate::from_ymd_opt(year, month, day).is_none()
        {
            return Err(malformed());
        }
        Ok(partition)
    }
}
