use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult};

use crate::condition::PartitionFacts;
use crate::object::PartitionKey;
use crate::tier::{CompressionCodec, Temperature, Thresholds};

/// Native access statistics reported by the catalog for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatStatistics {
    /// Last observed write.
    pub last_write_at: DateTime<Utc>,
    /// Last observed read.
    pub last_read_at: Option<DateTime<Utc>>,
    /// Observed reads.
    pub read_count: i64,
    /// Observed writes.
    pub write_count: i64,
}

/// Catalog view of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// Partition name.
    pub name: String,
    /// Inclusive lower bound; `None` when open-ended.
    pub lower_bound: Option<NaiveDate>,
    /// Exclusive upper bound; `None` when unbounded.
    pub upper_bound: Option<NaiveDate>,
    /// Current storage location.
    pub location: String,
    /// Current codec.
    pub codec: CompressionCodec,
    /// Row count.
    pub row_count: i64,
    /// Segment size in bytes.
    pub size_bytes: i64,
    /// Native heat statistics, when the catalog tracks them.
    pub heat: Option<HeatStatistics>,
}

/// How a record's last-write timestamp was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    /// Taken from native heat statistics.
    Observed,
    /// Estimated from the partition's upper bound.
    BoundaryEstimate,
}

impl EstimateSource {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::BoundaryEstimate => "boundary_estimate",
        }
    }
}

impl FromStr for EstimateSource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "observed" => Ok(Self::Observed),
            "boundary_estimate" => Ok(Self::BoundaryEstimate),
            _ => Err(AppError::Validation(format!(
                "unknown estimate source '{value}'"
            ))),
        }
    }
}

impl Display for EstimateSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tracked state snapshot of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAccessRecord {
    /// Natural key.
    pub key: PartitionKey,
    /// Last write, observed or estimated.
    pub last_write_at: DateTime<Utc>,
    /// Last read, when observed.
    pub last_read_at: Option<DateTime<Utc>>,
    /// Observed reads.
    pub read_count: i64,
    /// Observed writes.
    pub write_count: i64,
    /// Number of refreshes that saw native heat statistics.
    pub heat_observations: i64,
    /// Row count.
    pub row_count: i64,
    /// Segment size in bytes.
    pub size_bytes: i64,
    /// Current codec.
    pub codec: CompressionCodec,
    /// Current storage location.
    pub location: String,
    /// Days since the last write at refresh time.
    pub age_days: i64,
    /// Temperature under the default thresholds at refresh time.
    pub temperature: Temperature,
    /// Origin of `last_write_at`.
    pub estimate_source: EstimateSource,
    /// Refresh timestamp.
    pub refreshed_at: DateTime<Utc>,
}

impl PartitionAccessRecord {
    /// Derives a record from a catalog snapshot.
    ///
    /// A previous record that has seen heat statistics keeps its last-write
    /// timestamp when the catalog no longer reports them.
    pub fn observe(
        key: PartitionKey,
        snapshot: &PartitionSnapshot,
        previous: Option<&Self>,
        thresholds: Thresholds,
        frozen_split: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let observed_before = previous.filter(|record| record.heat_observations > 0);

        let (last_write_at, last_read_at, read_count, write_count, heat_observations, source) =
            match (&snapshot.heat, observed_before) {
                (Some(heat), _) => (
                    heat.last_write_at,
                    heat.last_read_at,
                    heat.read_count,
                    heat.write_count,
                    previous.map_or(0, |record| record.heat_observations) + 1,
                    EstimateSource::Observed,
                ),
                (None, Some(record)) => (
                    record.last_write_at,
                    record.last_read_at,
                    record.read_count,
                    record.write_count,
                    record.heat_observations,
                    record.estimate_source,
                ),
                (None, None) => (
                    estimate_last_write(snapshot.upper_bound, now)?,
                    None,
                    0,
                    0,
                    0,
                    EstimateSource::BoundaryEstimate,
                ),
            };

        let age_days = age_in_days(last_write_at, now);

        Ok(Self {
            key,
            last_write_at,
            last_read_at,
            read_count,
            write_count,
            heat_observations,
            row_count: snapshot.row_count,
            size_bytes: snapshot.size_bytes,
            codec: snapshot.codec,
            location: snapshot.location.clone(),
            age_days,
            temperature: thresholds.classify(age_days, frozen_split),
            estimate_source: source,
            refreshed_at: now,
        })
    }

    /// Returns the age in days at `now`.
    #[must_use]
    pub fn age_days_at(&self, now: DateTime<Utc>) -> i64 {
        age_in_days(self.last_write_at, now)
    }

    /// Returns the age in whole calendar months at `now`.
    #[must_use]
    pub fn age_months_at(&self, now: DateTime<Utc>) -> i64 {
        whole_months_between(self.last_write_at.date_naive(), now.date_naive())
    }

    /// Returns evaluation facts under the given thresholds.
    #[must_use]
    pub fn facts(&self, thresholds: Thresholds, frozen_split: bool, now: DateTime<Utc>) -> PartitionFacts {
        let age_days = self.age_days_at(now);
        let observed = self.heat_observations > 0;

        PartitionFacts {
            age_days,
            age_months: self.age_months_at(now),
            size_bytes: self.size_bytes,
            row_count: self.row_count,
            read_count: observed.then_some(self.read_count),
            write_count: observed.then_some(self.write_count),
            temperature: thresholds.classify(age_days, frozen_split),
            codec: self.codec,
            location: self.location.clone(),
        }
    }

    /// Returns a copy reflecting a completed in-place or relocating transition.
    #[must_use]
    pub fn after_transition(
        &self,
        codec: CompressionCodec,
        location: &str,
        row_count: i64,
        size_bytes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            codec,
            location: location.to_owned(),
            row_count,
            size_bytes,
            refreshed_at: now,
            ..self.clone()
        }
    }
}

fn estimate_last_write(
    upper_bound: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> AppResult<DateTime<Utc>> {
    let Some(upper_bound) = upper_bound else {
        return Ok(now);
    };

    let last_day = upper_bound.pred_opt().ok_or_else(|| {
        AppError::Validation(format!("partition upper bound '{upper_bound}' is out of range"))
    })?;
    let estimate = last_day.and_time(chrono::NaiveTime::MIN).and_utc();

    Ok(estimate.min(now))
}

fn age_in_days(last_write_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_write_at).max(Duration::zero()).num_days()
}

/// Returns the number of whole calendar months between two dates.
#[must_use]
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to <= from {
        return 0;
    }

    let mut months = i64::from(to.year() - from.year()) * 12 + i64::from(to.month())
        - i64::from(from.month());
    if to.day() < from.day() {
        months -= 1;
    }

    months.max(0)
}
