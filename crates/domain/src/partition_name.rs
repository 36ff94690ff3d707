use chrono::{Datelike, NaiveDate};

use crate::tier::Granularity;

/// Default prefix of generated partition names.
pub const PARTITION_NAME_PREFIX: &str = "P";

/// Returns the partition name for the period starting at `start`.
#[must_use]
pub fn partition_name(prefix: &str, granularity: Granularity, start: NaiveDate) -> String {
    match granularity {
        Granularity::Day => format!(
            "{prefix}_{:04}_{:02}_{:02}",
            start.year(),
            start.month(),
            start.day()
        ),
        Granularity::Month => format!("{prefix}_{:04}_{:02}", start.year(), start.month()),
        Granularity::Quarter => {
            format!("{prefix}_{:04}_Q{}", start.year(), (start.month() - 1) / 3 + 1)
        }
        Granularity::Year => format!("{prefix}_{:04}", start.year()),
    }
}

/// A partition name that matches one of the fine-grained naming patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinePartitionName {
    name: String,
    granularity: Granularity,
    coarse_name: String,
    coarse_granularity: Granularity,
}

impl FinePartitionName {
    /// Parses `PREFIX_YYYY_MM_DD`, `PREFIX_YYYY_MM` or `PREFIX_YYYY_Qn`.
    ///
    /// Returns `None` for coarse names such as `P_2023`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_uppercase();
        let parts: Vec<&str> = name.split('_').collect();

        if let [prefix @ .., year, month, day] = parts.as_slice()
            && !prefix.is_empty()
            && let Some(start) = parse_date(year, month, day)
        {
            let prefix = prefix.join("_");
            return Some(Self {
                coarse_name: partition_name(prefix.as_str(), Granularity::Month, start),
                name,
                granularity: Granularity::Day,
                coarse_granularity: Granularity::Month,
            });
        }

        if let [prefix @ .., year, period] = parts.as_slice()
            && !prefix.is_empty()
        {
            let year = parse_year(year)?;
            let granularity = if let Some(quarter) = period.strip_prefix('Q') {
                let quarter = quarter.parse::<u32>().ok()?;
                if quarter == 0 || quarter > 4 || period.len() != 2 {
                    return None;
                }
                Granularity::Quarter
            } else {
                let month = parse_fixed_width(period, 2)?;
                if month == 0 || month > 12 {
                    return None;
                }
                Granularity::Month
            };

            let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
            return Some(Self {
                coarse_name: partition_name(prefix.join("_").as_str(), Granularity::Year, start),
                name,
                granularity,
                coarse_granularity: Granularity::Year,
            });
        }

        None
    }

    /// Returns the normalized fine partition name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the granularity encoded in the name.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Returns the name of the enclosing coarse partition.
    #[must_use]
    pub fn coarse_name(&self) -> &str {
        self.coarse_name.as_str()
    }

    /// Returns the granularity of the enclosing coarse partition.
    #[must_use]
    pub fn coarse_granularity(&self) -> Granularity {
        self.coarse_granularity
    }
}

fn parse_year(value: &str) -> Option<i32> {
    parse_fixed_width(value, 4).and_then(|year| i32::try_from(year).ok())
}

fn parse_fixed_width(value: &str, width: usize) -> Option<u32> {
    if value.len() != width || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    value.parse::<u32>().ok()
}

fn parse_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        parse_year(year)?,
        parse_fixed_width(month, 2)?,
        parse_fixed_width(day, 2)?,
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{FinePartitionName, partition_name};
    use crate::tier::Granularity;

    #[test]
    fn names_follow_granularity_patterns() {
        let start = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap_or_default();
        assert_eq!(partition_name("P", Granularity::Day, start), "P_2024_08_01");
        assert_eq!(partition_name("P", Granularity::Month, start), "P_2024_08");
        assert_eq!(partition_name("P", Granularity::Quarter, start), "P_2024_Q3");
        assert_eq!(partition_name("P", Granularity::Year, start), "P_2024");
    }

    #[test]
    fn monthly_names_map_to_yearly_siblings() {
        let parsed = FinePartitionName::parse("p_2023_03");
        assert!(parsed.is_some());
        let parsed = parsed.unwrap_or_else(|| unreachable!());
        assert_eq!(parsed.coarse_name(), "P_2023");
        assert_eq!(parsed.granularity(), Granularity::Month);
    }

    #[test]
    fn daily_and_quarterly_names_are_fine_grained() {
        let daily = FinePartitionName::parse("SALES_2023_03_14");
        assert_eq!(
            daily.map(|name| name.coarse_name().to_owned()),
            Some("SALES_2023_03".to_owned())
        );

        let quarterly = FinePartitionName::parse("P_2023_Q2");
        assert_eq!(
            quarterly.map(|name| name.coarse_name().to_owned()),
            Some("P_2023".to_owned())
        );
    }

    #[test]
    fn coarse_and_malformed_names_do_not_parse() {
        assert!(FinePartitionName::parse("P_2023").is_none());
        assert!(FinePartitionName::parse("P_2023_13").is_none());
        assert!(FinePartitionName::parse("P_2023_Q5").is_none());
        assert!(FinePartitionName::parse("2023_03").is_none());
        assert!(FinePartitionName::parse("P_23_03").is_none());
    }
}
