use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult, NonEmptyString};

/// Derived access/age classification of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Temperature {
    /// Recently written data.
    Hot,
    /// Data past the hot cutoff.
    Warm,
    /// Data past the warm cutoff.
    Cold,
    /// Data past the cold cutoff when the frozen split is enabled.
    Frozen,
}

impl Temperature {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "HOT",
            Self::Warm => "WARM",
            Self::Cold => "COLD",
            Self::Frozen => "FROZEN",
        }
    }

    /// Returns a numeric coldness rank (higher is colder).
    #[must_use]
    pub fn coldness(&self) -> u8 {
        match self {
            Self::Hot => 0,
            Self::Warm => 1,
            Self::Cold => 2,
            Self::Frozen => 3,
        }
    }

    /// Returns whether this temperature is at least as cold as `other`.
    #[must_use]
    pub fn is_at_least_as_cold_as(&self, other: Self) -> bool {
        self.coldness() >= other.coldness()
    }
}

impl FromStr for Temperature {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HOT" => Ok(Self::Hot),
            "WARM" => Ok(Self::Warm),
            "COLD" => Ok(Self::Cold),
            "FROZEN" => Ok(Self::Frozen),
            _ => Err(AppError::Validation(format!(
                "unknown temperature '{value}'"
            ))),
        }
    }
}

impl TryFrom<String> for Temperature {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<Temperature> for String {
    fn from(value: Temperature) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for Temperature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Compression codec applied to a partition segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionCodec {
    /// Uncompressed storage.
    None,
    /// Basic block compression for bulk-loaded data.
    Basic,
    /// Row-level compression that tolerates updates.
    Oltp,
    /// Columnar compression tuned for scan speed.
    QueryLow,
    /// Columnar compression tuned for ratio over scan speed.
    QueryHigh,
    /// Archive-grade columnar compression.
    ArchiveLow,
    /// Maximum-ratio archive compression.
    ArchiveHigh,
}

impl CompressionCodec {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Basic => "BASIC",
            Self::Oltp => "OLTP",
            Self::QueryLow => "QUERY LOW",
            Self::QueryHigh => "QUERY HIGH",
            Self::ArchiveLow => "ARCHIVE LOW",
            Self::ArchiveHigh => "ARCHIVE HIGH",
        }
    }

    /// Returns all supported codecs.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[CompressionCodec] = &[
            CompressionCodec::None,
            CompressionCodec::Basic,
            CompressionCodec::Oltp,
            CompressionCodec::QueryLow,
            CompressionCodec::QueryHigh,
            CompressionCodec::ArchiveLow,
            CompressionCodec::ArchiveHigh,
        ];

        ALL
    }

    /// Returns the nominal size reduction factor used for estimates.
    #[must_use]
    pub fn nominal_ratio(&self) -> f64 {
        match self {
            Self::None => 1.0,
            Self::Basic => 2.0,
            Self::Oltp => 2.5,
            Self::QueryLow => 6.0,
            Self::QueryHigh => 10.0,
            Self::ArchiveLow => 12.0,
            Self::ArchiveHigh => 15.0,
        }
    }
}

impl FromStr for CompressionCodec {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('_', " ");
        Self::all()
            .iter()
            .copied()
            .find(|codec| codec.as_str() == normalized)
            .ok_or_else(|| AppError::Validation(format!("unknown compression codec '{value}'")))
    }
}

impl TryFrom<String> for CompressionCodec {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<CompressionCodec> for String {
    fn from(value: CompressionCodec) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for CompressionCodec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Calendar unit used to size range partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    /// One partition per day.
    Day,
    /// One partition per calendar month.
    Month,
    /// One partition per calendar quarter.
    Quarter,
    /// One partition per calendar year.
    Year,
}

impl Granularity {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Quarter => "QUARTER",
            Self::Year => "YEAR",
        }
    }

    /// Returns the coarser of two granularities.
    #[must_use]
    pub fn coarser(self, other: Self) -> Self {
        self.max(other)
    }

    /// Floors a date to the start of the period that contains it.
    #[must_use]
    pub fn floor(&self, date: NaiveDate) -> NaiveDate {
        let (year, month) = (date.year(), date.month());
        let floored = match self {
            Self::Day => Some(date),
            Self::Month => NaiveDate::from_ymd_opt(year, month, 1),
            Self::Quarter => NaiveDate::from_ymd_opt(year, ((month - 1) / 3) * 3 + 1, 1),
            Self::Year => NaiveDate::from_ymd_opt(year, 1, 1),
        };

        floored.unwrap_or(date)
    }

    /// Returns the start of the period following the one that starts at `start`.
    pub fn next_start(&self, start: NaiveDate) -> AppResult<NaiveDate> {
        let next = match self {
            Self::Day => start.succ_opt(),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Quarter => start.checked_add_months(Months::new(3)),
            Self::Year => start.checked_add_months(Months::new(12)),
        };

        next.ok_or_else(|| AppError::Validation(format!("date '{start}' is out of range")))
    }

    /// Returns the start of the period preceding the one that starts at `start`.
    pub fn previous_start(&self, start: NaiveDate) -> AppResult<NaiveDate> {
        let previous = match self {
            Self::Day => start.pred_opt(),
            Self::Month => start.checked_sub_months(Months::new(1)),
            Self::Quarter => start.checked_sub_months(Months::new(3)),
            Self::Year => start.checked_sub_months(Months::new(12)),
        };

        previous.ok_or_else(|| AppError::Validation(format!("date '{start}' is out of range")))
    }
}

impl FromStr for Granularity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAY" | "DAILY" => Ok(Self::Day),
            "MONTH" | "MONTHLY" => Ok(Self::Month),
            "QUARTER" | "QUARTERLY" => Ok(Self::Quarter),
            "YEAR" | "YEARLY" => Ok(Self::Year),
            _ => Err(AppError::Validation(format!(
                "unknown partition granularity '{value}'"
            ))),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.as_str().to_owned()
    }
}

/// HOT/WARM/COLD age cutoffs in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    hot_days: u32,
    warm_days: u32,
    cold_days: u32,
}

impl Thresholds {
    /// Creates validated cutoffs where `0 < hot < warm < cold`.
    pub fn new(hot_days: u32, warm_days: u32, cold_days: u32) -> AppResult<Self> {
        if hot_days == 0 {
            return Err(AppError::Validation(
                "hot_days must be greater than zero".to_owned(),
            ));
        }

        if hot_days >= warm_days || warm_days >= cold_days {
            return Err(AppError::Validation(format!(
                "thresholds must satisfy hot < warm < cold (got {hot_days}/{warm_days}/{cold_days})"
            )));
        }

        Ok(Self {
            hot_days,
            warm_days,
            cold_days,
        })
    }

    /// Returns the HOT cutoff in days.
    #[must_use]
    pub fn hot_days(&self) -> u32 {
        self.hot_days
    }

    /// Returns the WARM cutoff in days.
    #[must_use]
    pub fn warm_days(&self) -> u32 {
        self.warm_days
    }

    /// Returns the COLD cutoff in days.
    #[must_use]
    pub fn cold_days(&self) -> u32 {
        self.cold_days
    }

    /// Classifies an age against the cutoffs.
    #[must_use]
    pub fn classify(&self, age_days: i64, frozen_split: bool) -> Temperature {
        if age_days < i64::from(self.hot_days) {
            Temperature::Hot
        } else if age_days < i64::from(self.warm_days) {
            Temperature::Warm
        } else if frozen_split && age_days >= i64::from(self.cold_days) {
            Temperature::Frozen
        } else {
            Temperature::Cold
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hot_days: 90,
            warm_days: 365,
            cold_days: 1095,
        }
    }
}

/// Reusable named set of age cutoffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    name: NonEmptyString,
    thresholds: Thresholds,
    description: Option<String>,
}

impl ThresholdProfile {
    /// Creates a validated threshold profile.
    pub fn new(
        name: impl Into<String>,
        hot_days: u32,
        warm_days: u32,
        cold_days: u32,
        description: Option<String>,
    ) -> AppResult<Self> {
        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            name: NonEmptyString::new(name)?,
            thresholds: Thresholds::new(hot_days, warm_days, cold_days)?,
            description,
        })
    }

    /// Returns the unique profile name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the profile cutoffs.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Returns optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
