use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult};

use crate::tier::{CompressionCodec, Temperature};

const MAX_CONDITION_DEPTH: usize = 8;
const MAX_CONDITION_NODES: usize = 64;

/// Partition attribute that a custom condition can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMetric {
    /// Days since the last write.
    AgeDays,
    /// Whole calendar months since the last write.
    AgeMonths,
    /// Segment size in MiB.
    SizeMb,
    /// Row count.
    RowCount,
    /// Observed reads; only available with native heat statistics.
    ReadCount,
    /// Observed writes; only available with native heat statistics.
    WriteCount,
}

impl PartitionMetric {
    fn as_str(self) -> &'static str {
        match self {
            Self::AgeDays => "age_days",
            Self::AgeMonths => "age_months",
            Self::SizeMb => "size_mb",
            Self::RowCount => "row_count",
            Self::ReadCount => "read_count",
            Self::WriteCount => "write_count",
        }
    }
}

/// Comparison operator for metric conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Equal.
    Eq,
    /// Greater than or equal.
    Gte,
    /// Strictly greater than.
    Gt,
}

impl ComparisonOperator {
    fn apply(self, left: i64, right: i64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Eq => left == right,
            Self::Gte => left >= right,
            Self::Gt => left > right,
        }
    }
}

/// Restricted, declaratively typed predicate over one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionExpr {
    /// True when every nested condition holds.
    All {
        /// Nested conditions.
        conditions: Vec<ConditionExpr>,
    },
    /// True when any nested condition holds.
    Any {
        /// Nested conditions.
        conditions: Vec<ConditionExpr>,
    },
    /// Negates the nested condition.
    Not {
        /// Negated condition.
        condition: Box<ConditionExpr>,
    },
    /// Compares one partition metric with a literal.
    Compare {
        /// Metric to read.
        metric: PartitionMetric,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Literal right-hand side.
        value: i64,
    },
    /// True when the partition is at least as cold as the given temperature.
    TemperatureAtLeast {
        /// Minimum coldness.
        temperature: Temperature,
    },
    /// True when the partition currently uses the given codec.
    CodecIs {
        /// Codec to match.
        codec: CompressionCodec,
    },
    /// True when the partition currently lives in the given location.
    LocationIs {
        /// Storage location to match (case-insensitive).
        location: String,
    },
}

/// Facts about one partition that conditions are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFacts {
    /// Days since the last write.
    pub age_days: i64,
    /// Whole calendar months since the last write.
    pub age_months: i64,
    /// Segment size in bytes.
    pub size_bytes: i64,
    /// Row count.
    pub row_count: i64,
    /// Observed reads, when native statistics exist.
    pub read_count: Option<i64>,
    /// Observed writes, when native statistics exist.
    pub write_count: Option<i64>,
    /// Temperature under the evaluating policy's thresholds.
    pub temperature: Temperature,
    /// Current codec.
    pub codec: CompressionCodec,
    /// Current storage location.
    pub location: String,
}

impl ConditionExpr {
    /// Checks structural limits and non-empty operands.
    pub fn validate(&self) -> AppResult<()> {
        let mut nodes = 0_usize;
        self.validate_at(1, &mut nodes)
    }

    fn validate_at(&self, depth: usize, nodes: &mut usize) -> AppResult<()> {
        *nodes += 1;
        if depth > MAX_CONDITION_DEPTH {
            return Err(AppError::Validation(format!(
                "custom condition nesting exceeds {MAX_CONDITION_DEPTH} levels"
            )));
        }

        if *nodes > MAX_CONDITION_NODES {
            return Err(AppError::Validation(format!(
                "custom condition exceeds {MAX_CONDITION_NODES} nodes"
            )));
        }

        match self {
            Self::All { conditions } | Self::Any { conditions } => {
                if conditions.is_empty() {
                    return Err(AppError::Validation(
                        "all/any custom condition requires at least one operand".to_owned(),
                    ));
                }

                for condition in conditions {
                    condition.validate_at(depth + 1, nodes)?;
                }

                Ok(())
            }
            Self::Not { condition } => condition.validate_at(depth + 1, nodes),
            Self::Compare { metric, value, .. } => {
                if *value < 0 {
                    return Err(AppError::Validation(format!(
                        "custom condition on {} compares against a negative value",
                        metric.as_str()
                    )));
                }

                Ok(())
            }
            Self::LocationIs { location } => {
                if location.trim().is_empty() {
                    return Err(AppError::Validation(
                        "location_is custom condition requires a location".to_owned(),
                    ));
                }

                Ok(())
            }
            Self::TemperatureAtLeast { .. } | Self::CodecIs { .. } => Ok(()),
        }
    }

    /// Evaluates the condition; fails when a referenced metric is not tracked.
    pub fn evaluate(&self, facts: &PartitionFacts) -> AppResult<bool> {
        match self {
            Self::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(facts)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            Self::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate(facts)? {
                        return Ok(true);
                    }
                }

                Ok(false)
            }
            Self::Not { condition } => Ok(!condition.evaluate(facts)?),
            Self::Compare {
                metric,
                operator,
                value,
            } => Ok(operator.apply(metric_value(facts, *metric)?, *value)),
            Self::TemperatureAtLeast { temperature } => {
                Ok(facts.temperature.is_at_least_as_cold_as(*temperature))
            }
            Self::CodecIs { codec } => Ok(facts.codec == *codec),
            Self::LocationIs { location } => {
                Ok(facts.location.eq_ignore_ascii_case(location.trim()))
            }
        }
    }
}

fn metric_value(facts: &PartitionFacts, metric: PartitionMetric) -> AppResult<i64> {
    let value = match metric {
        PartitionMetric::AgeDays => Some(facts.age_days),
        PartitionMetric::AgeMonths => Some(facts.age_months),
        PartitionMetric::SizeMb => Some(facts.size_bytes / (1024 * 1024)),
        PartitionMetric::RowCount => Some(facts.row_count),
        PartitionMetric::ReadCount => facts.read_count,
        PartitionMetric::WriteCount => facts.write_count,
    };

    value.ok_or_else(|| {
        AppError::Validation(format!(
            "custom condition references {} which is not tracked for this partition",
            metric.as_str()
        ))
    })
}
