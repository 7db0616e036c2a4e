use chrono::{Datelike, Duration, NaiveDate};

use crate::error::CoreError;
use crate::models::{EndCondition, Recurrence, RecurrenceRule};

/// Tuning knobs for incremental generation. The horizon bounds how far
/// ahead of "today" instances are materialized; it affects storage, not
/// correctness.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Materialization window in days ahead of the sweep date.
    pub lookahead_days: i64,
    /// Limit for a single generation batch.
    pub max_batch_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 30,
            max_batch_size: 100,
        }
    }
}

/// Validates a recurrence configuration before it may reach the generator.
///
/// # Behavior
/// - `Weekly`/`Monthly` require a non-empty day-set within range
/// - `Interval` requires a step of at least one day
/// - `OnDate` must not precede the start date
/// - `AfterCount` must be at least 1
///
/// Error messages are user-facing; the caller surfaces them verbatim.
pub fn validate(
    recurrence: &Recurrence,
    start_date: NaiveDate,
    end: &EndCondition,
) -> Result<(), CoreError> {
    match recurrence {
        Recurrence::Daily => {}
        Recurrence::Weekly { days } => {
            if days.is_empty() {
                return Err(CoreError::InvalidRule(
                    "select at least one day of the week".to_string(),
                ));
            }
            if let Some(&day) = days.iter().find(|&&d| d > 6) {
                return Err(CoreError::InvalidRule(format!(
                    "weekday index {} is out of range (0-6, counted from Monday)",
                    day
                )));
            }
        }
        Recurrence::Monthly { days } => {
            if days.is_empty() {
                return Err(CoreError::InvalidRule(
                    "select at least one day of the month".to_string(),
                ));
            }
            if let Some(&day) = days.iter().find(|&&d| !(1..=31).contains(&d)) {
                return Err(CoreError::InvalidRule(format!(
                    "day of month {} is out of range (1-31)",
                    day
                )));
            }
        }
        Recurrence::Interval { every_days } => {
            if *every_days < 1 {
                return Err(CoreError::InvalidRule(
                    "interval must be at least one day".to_string(),
                ));
            }
        }
    }

    match end {
        EndCondition::OnDate(date) if *date < start_date => Err(CoreError::InvalidRule(
            "end date is before the start date".to_string(),
        )),
        EndCondition::AfterCount(0) => Err(CoreError::InvalidRule(
            "occurrence count must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Computes every calendar date in `[range_start, range_end]` on which an
/// occurrence of `rule` falls.
///
/// Pure and deterministic: no clock reads, identical inputs yield
/// identical output. Dates are ascending and duplicate-free. Nothing is
/// emitted before `rule.start_date`, and an `OnDate` end condition clamps
/// the range end. `AfterCount` is not applied here — counting is the
/// generator's job.
pub fn occurrences_between(
    rule: &RecurrenceRule,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<NaiveDate> {
    let start = rule.start_date.max(range_start);
    let end = match rule.end {
        EndCondition::OnDate(date) => range_end.min(date),
        _ => range_end,
    };
    if end < start {
        return Vec::new();
    }

    match &rule.recurrence {
        Recurrence::Daily => start.iter_days().take_while(|d| *d <= end).collect(),
        Recurrence::Weekly { days } => start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| days.contains(&(d.weekday().num_days_from_monday() as u8)))
            .collect(),
        Recurrence::Monthly { days } => monthly_between(days, start, end),
        Recurrence::Interval { every_days } => {
            interval_between(rule.start_date, *every_days, start, end)
        }
    }
}

/// First occurrence strictly after `after`, or None if the rule's
/// `OnDate` end leaves nothing beyond it.
pub fn next_occurrence_after(rule: &RecurrenceRule, after: NaiveDate) -> Option<NaiveDate> {
    let from = rule.start_date.max(after + Duration::days(1));
    // A window long enough to contain the next hit for every kind: one
    // step for intervals, two month-ends for monthly, a week otherwise.
    let horizon = match &rule.recurrence {
        Recurrence::Interval { every_days } => *every_days as i64 + 1,
        Recurrence::Monthly { .. } => 62,
        _ => 7,
    };
    occurrences_between(rule, from, from + Duration::days(horizon))
        .into_iter()
        .next()
}

/// Monthly expansion with end-of-month clamping: a configured day past
/// the month's last day lands on the last day instead of skipping the
/// month. Two configured days clamping to the same date collapse into
/// one occurrence.
fn monthly_between(
    days: &std::collections::BTreeSet<u8>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let mut out: Vec<NaiveDate> = Vec::new();
    let mut year = start.year();
    let mut month = start.month();

    loop {
        let Some(first_of_month) = NaiveDate::from_ymd_opt(year, month, 1) else {
            break;
        };
        if first_of_month > end {
            break;
        }

        let last_day = days_in_month(year, month);
        for &day in days {
            let clamped = u32::from(day).min(last_day);
            let Some(date) = NaiveDate::from_ymd_opt(year, month, clamped) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            // min(day, last) is non-decreasing over the sorted set, so a
            // collapse can only repeat the immediately preceding date.
            if out.last() == Some(&date) {
                continue;
            }
            out.push(date);
        }

        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }

    out
}

/// Fixed-step expansion anchored at the rule's start date.
fn interval_between(
    anchor: NaiveDate,
    every_days: u32,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let step = i64::from(every_days.max(1));
    let offset = (start - anchor).num_days();
    let first_step = if offset <= 0 {
        0
    } else {
        (offset + step - 1) / step
    };

    let mut date = anchor + Duration::days(first_step * step);
    let mut out = Vec::new();
    while date <= end {
        out.push(date);
        date = date + Duration::days(step);
    }
    out
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    // The first of the following month always exists; its predecessor is
    // the last day of this month.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, ItemTemplate};
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule_with(recurrence: Recurrence, start: NaiveDate, end: EndCondition) -> RecurrenceRule {
        RecurrenceRule {
            id: Uuid::now_v7(),
            kind: ItemKind::Task,
            recurrence,
            start_date: start,
            end,
            cursor: start,
            occurrences_generated: 0,
            active: true,
            template: ItemTemplate {
                title: "Problem set".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dayset(days: &[u8]) -> BTreeSet<u8> {
        days.iter().copied().collect()
    }

    #[test]
    fn daily_covers_every_date_in_range() {
        let rule = rule_with(Recurrence::Daily, date(2025, 3, 10), EndCondition::Never);
        let dates = occurrences_between(&rule, date(2025, 3, 8), date(2025, 3, 13));
        assert_eq!(
            dates,
            vec![
                date(2025, 3, 10),
                date(2025, 3, 11),
                date(2025, 3, 12),
                date(2025, 3, 13),
            ]
        );
    }

    #[test]
    fn weekly_starts_on_first_matching_weekday() {
        // Start on a Thursday; Mon/Wed rule must first fire the following Monday.
        let thursday = date(2025, 3, 6);
        let rule = rule_with(
            Recurrence::Weekly {
                days: dayset(&[0, 2]),
            },
            thursday,
            EndCondition::Never,
        );
        let dates = occurrences_between(&rule, thursday, thursday + Duration::days(10));
        assert_eq!(dates.first(), Some(&date(2025, 3, 10)));
        assert_eq!(dates, vec![date(2025, 3, 10), date(2025, 3, 12)]);
    }

    #[rstest]
    #[case(2025, date(2025, 2, 28))] // non-leap
    #[case(2024, date(2024, 2, 29))] // leap
    fn monthly_day_31_clamps_to_february_end(#[case] year: i32, #[case] expected: NaiveDate) {
        let rule = rule_with(
            Recurrence::Monthly {
                days: dayset(&[31]),
            },
            date(year, 1, 1),
            EndCondition::Never,
        );
        let dates = occurrences_between(&rule, date(year, 2, 1), date(year, 2, 28).max(expected));
        assert_eq!(dates, vec![expected]);
    }

    #[test]
    fn monthly_clamped_days_collapse_to_one_occurrence() {
        // 30 and 31 both clamp to Feb 28; only one instance may exist there.
        let rule = rule_with(
            Recurrence::Monthly {
                days: dayset(&[30, 31]),
            },
            date(2025, 1, 1),
            EndCondition::Never,
        );
        let dates = occurrences_between(&rule, date(2025, 2, 1), date(2025, 2, 28));
        assert_eq!(dates, vec![date(2025, 2, 28)]);
    }

    #[test]
    fn monthly_emits_configured_days_in_order() {
        let rule = rule_with(
            Recurrence::Monthly {
                days: dayset(&[1, 15]),
            },
            date(2025, 1, 1),
            EndCondition::Never,
        );
        let dates = occurrences_between(&rule, date(2025, 1, 10), date(2025, 3, 2));
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 15),
                date(2025, 2, 1),
                date(2025, 2, 15),
                date(2025, 3, 1),
            ]
        );
    }

    #[test]
    fn interval_steps_from_anchor_not_range_start() {
        let rule = rule_with(
            Recurrence::Interval { every_days: 3 },
            date(2025, 3, 1),
            EndCondition::Never,
        );
        // Range starts mid-step: first hit is the next multiple of 3 days.
        let dates = occurrences_between(&rule, date(2025, 3, 3), date(2025, 3, 11));
        assert_eq!(
            dates,
            vec![date(2025, 3, 4), date(2025, 3, 7), date(2025, 3, 10)]
        );
    }

    #[test]
    fn nothing_before_start_date() {
        let rule = rule_with(Recurrence::Daily, date(2025, 5, 10), EndCondition::Never);
        let dates = occurrences_between(&rule, date(2025, 5, 1), date(2025, 5, 12));
        assert_eq!(dates.first(), Some(&date(2025, 5, 10)));
    }

    #[test]
    fn on_date_end_clamps_range() {
        let rule = rule_with(
            Recurrence::Daily,
            date(2025, 5, 1),
            EndCondition::OnDate(date(2025, 5, 3)),
        );
        let dates = occurrences_between(&rule, date(2025, 5, 1), date(2025, 5, 31));
        assert_eq!(
            dates,
            vec![date(2025, 5, 1), date(2025, 5, 2), date(2025, 5, 3)]
        );
    }

    #[test]
    fn next_occurrence_is_strictly_after() {
        let rule = rule_with(
            Recurrence::Weekly {
                days: dayset(&[0]),
            },
            date(2025, 3, 3), // a Monday
            EndCondition::Never,
        );
        assert_eq!(
            next_occurrence_after(&rule, date(2025, 3, 3)),
            Some(date(2025, 3, 10))
        );
    }

    #[test]
    fn next_occurrence_respects_end_date() {
        let rule = rule_with(
            Recurrence::Daily,
            date(2025, 3, 1),
            EndCondition::OnDate(date(2025, 3, 5)),
        );
        assert_eq!(next_occurrence_after(&rule, date(2025, 3, 5)), None);
    }

    #[rstest]
    #[case(Recurrence::Weekly { days: BTreeSet::new() })]
    #[case(Recurrence::Monthly { days: BTreeSet::new() })]
    #[case(Recurrence::Weekly { days: dayset(&[7]) })]
    #[case(Recurrence::Monthly { days: dayset(&[0]) })]
    #[case(Recurrence::Monthly { days: dayset(&[32]) })]
    #[case(Recurrence::Interval { every_days: 0 })]
    fn invalid_shapes_are_rejected(#[case] recurrence: Recurrence) {
        let result = validate(&recurrence, date(2025, 1, 1), &EndCondition::Never);
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let result = validate(
            &Recurrence::Daily,
            date(2025, 6, 1),
            &EndCondition::OnDate(date(2025, 5, 1)),
        );
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    #[test]
    fn zero_count_is_rejected() {
        let result = validate(
            &Recurrence::Daily,
            date(2025, 6, 1),
            &EndCondition::AfterCount(0),
        );
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    proptest! {
        /// Evaluation is deterministic, ascending, duplicate-free and
        /// range-bounded for every shape.
        #[test]
        fn evaluation_is_deterministic_and_ordered(
            start_offset in 0i64..400,
            range_len in 0i64..120,
            shape in 0u8..4,
            day_a in 0u8..7,
            day_b in 1u8..32,
            step in 1u32..40,
        ) {
            let epoch = date(2024, 1, 1);
            let start = epoch + Duration::days(start_offset);
            let recurrence = match shape {
                0 => Recurrence::Daily,
                1 => Recurrence::Weekly { days: [day_a, (day_a + 2) % 7].into_iter().collect() },
                2 => Recurrence::Monthly { days: [day_b].into_iter().collect() },
                _ => Recurrence::Interval { every_days: step },
            };
            let rule = rule_with(recurrence, start, EndCondition::Never);
            let range_start = start - Duration::days(5);
            let range_end = range_start + Duration::days(range_len);

            let first = occurrences_between(&rule, range_start, range_end);
            let second = occurrences_between(&rule, range_start, range_end);
            prop_assert_eq!(&first, &second);

            for pair in first.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            for d in &first {
                prop_assert!(*d >= rule.start_date);
                prop_assert!(*d >= range_start && *d <= range_end);
            }
        }
    }
}
