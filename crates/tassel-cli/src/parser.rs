use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeSet;
use tassel_core::models::{EndCondition, Recurrence};

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date '{}', expected YYYY-MM-DD", input))
}

pub fn parse_time(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| anyhow!("invalid time '{}', expected HH:MM", input))
}

/// Parses a comma-separated weekday list ("mon,wed,fri") into indices
/// counted from Monday.
pub fn parse_weekday_set(input: &str) -> Result<BTreeSet<u8>> {
    let mut days = BTreeSet::new();
    for part in input.split(',') {
        let day = match part.trim().to_lowercase().as_str() {
            "mon" | "monday" => 0,
            "tue" | "tuesday" => 1,
            "wed" | "wednesday" => 2,
            "thu" | "thursday" => 3,
            "fri" | "friday" => 4,
            "sat" | "saturday" => 5,
            "sun" | "sunday" => 6,
            other => bail!("unknown weekday '{}'", other),
        };
        days.insert(day);
    }
    Ok(days)
}

/// Parses a comma-separated day-of-month list ("1,15,31").
pub fn parse_monthday_set(input: &str) -> Result<BTreeSet<u8>> {
    let mut days = BTreeSet::new();
    for part in input.split(',') {
        let day: u8 = part
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid day of month '{}'", part.trim()))?;
        days.insert(day);
    }
    Ok(days)
}

/// Assembles the recurrence shape from the add/edit flags; None when no
/// recurrence flag was given.
pub fn build_recurrence(
    daily: bool,
    weekly: Option<&str>,
    monthly: Option<&str>,
    every_days: Option<u32>,
) -> Result<Option<Recurrence>> {
    if daily {
        return Ok(Some(Recurrence::Daily));
    }
    if let Some(days) = weekly {
        return Ok(Some(Recurrence::Weekly {
            days: parse_weekday_set(days)?,
        }));
    }
    if let Some(days) = monthly {
        return Ok(Some(Recurrence::Monthly {
            days: parse_monthday_set(days)?,
        }));
    }
    if let Some(every_days) = every_days {
        return Ok(Some(Recurrence::Interval { every_days }));
    }
    Ok(None)
}

pub fn build_end_condition(until: Option<&str>, count: Option<u32>) -> Result<EndCondition> {
    match (until, count) {
        (Some(date), _) => Ok(EndCondition::OnDate(parse_date(date)?)),
        (None, Some(n)) => Ok(EndCondition::AfterCount(n)),
        (None, None) => Ok(EndCondition::Never),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2025-03-03").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
        assert!(parse_date("03/03/2025").is_err());
    }

    #[rstest]
    #[case("mon,wed", &[0, 2])]
    #[case("Friday", &[4])]
    #[case("sat,sun,sat", &[5, 6])]
    fn parses_weekday_lists(#[case] input: &str, #[case] expected: &[u8]) {
        let days = parse_weekday_set(input).unwrap();
        assert_eq!(days, expected.iter().copied().collect());
    }

    #[test]
    fn rejects_unknown_weekday() {
        assert!(parse_weekday_set("mon,funday").is_err());
    }

    #[test]
    fn builds_weekly_recurrence() {
        let recurrence = build_recurrence(false, Some("mon,wed"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(
            recurrence,
            Recurrence::Weekly {
                days: [0u8, 2].into_iter().collect()
            }
        );
    }

    #[test]
    fn no_flags_means_no_recurrence() {
        assert!(build_recurrence(false, None, None, None).unwrap().is_none());
    }
}
