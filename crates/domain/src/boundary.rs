//! Tiered partition boundary builder.
//!
//! Partition granularity varies with age: fine near the present, coarse
//! further back, over one contiguous range. The builder walks backward from
//! the newest period, switching granularity at each tier cutoff, and pre-places
//! every partition in its tier's location and codec.

use std::collections::HashSet;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult};

use crate::partition_name::{PARTITION_NAME_PREFIX, partition_name};
use crate::tier::{CompressionCodec, Granularity, Temperature};

/// One tier of a tiered partitioning layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDefinition {
    /// Tier name.
    pub tier: Temperature,
    /// Minimum data age in months that falls into this tier.
    pub min_age_months: u32,
    /// Partition granularity inside this tier.
    pub granularity: Granularity,
    /// Storage location new partitions of this tier are created in.
    #[serde(default)]
    pub location: Option<String>,
    /// Codec new partitions of this tier are created with.
    #[serde(default)]
    pub codec: Option<CompressionCodec>,
}

/// Tiered partitioning layout supplied at object creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_enabled")]
    enabled: bool,
    tiers: Vec<TierDefinition>,
}

fn default_enabled() -> bool {
    true
}

impl TierConfig {
    /// Creates a validated tier configuration.
    ///
    /// Tiers are sorted by minimum age, which must start at zero and be
    /// strictly increasing; HOT, WARM and COLD must all be present.
    pub fn new(enabled: bool, mut tiers: Vec<TierDefinition>) -> AppResult<Self> {
        tiers.sort_by_key(|tier| tier.min_age_months);

        let Some(first) = tiers.first() else {
            return Err(AppError::Validation(
                "tier_config must define at least one tier".to_owned(),
            ));
        };

        if first.min_age_months != 0 {
            return Err(AppError::Validation(format!(
                "youngest tier '{}' must start at age 0 months",
                first.tier
            )));
        }

        for pair in tiers.windows(2) {
            if pair[0].min_age_months >= pair[1].min_age_months {
                return Err(AppError::Validation(format!(
                    "tier age boundaries must be strictly increasing ('{}' and '{}' both start at {} months)",
                    pair[0].tier, pair[1].tier, pair[1].min_age_months
                )));
            }
        }

        let mut seen = HashSet::new();
        for tier in &tiers {
            if !seen.insert(tier.tier) {
                return Err(AppError::Validation(format!(
                    "tier '{}' is defined more than once",
                    tier.tier
                )));
            }
        }

        for required in [Temperature::Hot, Temperature::Warm, Temperature::Cold] {
            if !seen.contains(&required) {
                return Err(AppError::Validation(format!(
                    "tier_config must define a '{required}' tier"
                )));
            }
        }

        let tiers = tiers
            .into_iter()
            .map(|mut tier| {
                tier.location = tier
                    .location
                    .map(|value| value.trim().to_ascii_uppercase())
                    .filter(|value| !value.is_empty());
                tier
            })
            .collect();

        Ok(Self { enabled, tiers })
    }

    /// Parses and validates a JSON `tier_config` section.
    pub fn from_json(value: &serde_json::Value) -> AppResult<Self> {
        let raw = serde_json::from_value::<TierConfig>(value.clone()).map_err(|error| {
            AppError::Validation(format!("invalid tier_config section: {error}"))
        })?;

        Self::new(raw.enabled, raw.tiers)
    }

    /// Returns whether tiered partitioning is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns tiers ordered by minimum age.
    #[must_use]
    pub fn tiers(&self) -> &[TierDefinition] {
        &self.tiers
    }

    /// Returns the definition of one tier.
    #[must_use]
    pub fn tier(&self, tier: Temperature) -> Option<&TierDefinition> {
        self.tiers.iter().find(|definition| definition.tier == tier)
    }
}

/// One computed range partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionBoundary {
    /// Partition name.
    pub name: String,
    /// Inclusive lower bound; `None` for the open-ended lowest partition.
    pub lower_bound: Option<NaiveDate>,
    /// Exclusive upper bound.
    pub upper_bound: NaiveDate,
    /// Period start used for naming and width checks.
    pub period_start: NaiveDate,
    /// Partition granularity.
    pub granularity: Granularity,
    /// Tier the partition is born into.
    pub tier: Option<Temperature>,
    /// Initial storage location.
    pub location: Option<String>,
    /// Initial codec.
    pub codec: Option<CompressionCodec>,
}

struct Section<'a> {
    granularity: Granularity,
    floor: Option<NaiveDate>,
    tier: Option<&'a TierDefinition>,
}

/// Computes ordered partition boundaries for an object's date range.
///
/// Without an enabled tier configuration a uniform monthly layout is produced.
pub fn build_boundaries(
    min_date: NaiveDate,
    max_date: NaiveDate,
    today: NaiveDate,
    tier_config: Option<&TierConfig>,
) -> AppResult<Vec<PartitionBoundary>> {
    if min_date > max_date {
        return Err(AppError::Validation(format!(
            "min_date '{min_date}' must not be after max_date '{max_date}'"
        )));
    }

    let sections = match tier_config.filter(|config| config.is_enabled()) {
        Some(config) => tiered_sections(config, today)?,
        None => vec![Section {
            granularity: Granularity::Month,
            floor: None,
            tier: None,
        }],
    };

    let Some(newest) = sections.first() else {
        return Ok(Vec::new());
    };
    let newest_date = max_date.max(today);
    let mut cursor = newest
        .granularity
        .next_start(newest.granularity.floor(newest_date))?;

    let mut boundaries = Vec::new();
    'sections: for section in &sections {
        loop {
            if cursor <= min_date {
                break 'sections;
            }

            if section.floor.is_some_and(|floor| cursor <= floor) {
                break;
            }

            let last_day = cursor.pred_opt().ok_or_else(|| {
                AppError::Validation(format!("date '{cursor}' is out of range"))
            })?;
            let lower = section.granularity.floor(last_day);
            boundaries.push(PartitionBoundary {
                name: partition_name(PARTITION_NAME_PREFIX, section.granularity, lower),
                lower_bound: Some(lower),
                upper_bound: cursor,
                period_start: lower,
                granularity: section.granularity,
                tier: section.tier.map(|tier| tier.tier),
                location: section.tier.and_then(|tier| tier.location.clone()),
                codec: section.tier.and_then(|tier| tier.codec),
            });
            cursor = lower;
        }
    }

    boundaries.reverse();
    if let Some(lowest) = boundaries.first_mut() {
        lowest.lower_bound = None;
    }

    Ok(boundaries)
}

fn tiered_sections(config: &TierConfig, today: NaiveDate) -> AppResult<Vec<Section<'_>>> {
    let month_start = Granularity::Month.floor(today);
    let tiers = config.tiers();

    tiers
        .iter()
        .enumerate()
        .map(|(index, tier)| {
            let floor = match tiers.get(index + 1) {
                Some(older) => {
                    let cutoff = month_start
                        .checked_sub_months(Months::new(older.min_age_months))
                        .ok_or_else(|| {
                            AppError::Validation(format!(
                                "tier '{}' age boundary reaches before the supported date range",
                                older.tier
                            ))
                        })?;
                    Some(tier.granularity.coarser(older.granularity).floor(cutoff))
                }
                None => None,
            };

            Ok(Section {
                granularity: tier.granularity,
                floor,
                tier: Some(tier),
            })
        })
        .collect()
}
