//! Read-time collapsing of a rule's many instances down to the one row
//! that "upcoming" views show. Pure functions over already-loaded items;
//! no writes, no effect on which instances exist.

use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Item, ItemStatus};

/// Sort key for display selection: calendar date first, then "has a due
/// timestamp" beats "date only", then the timestamp itself.
fn selection_key(item: &Item) -> (NaiveDate, bool, Option<chrono::DateTime<chrono::Utc>>) {
    let date = item
        .instance_date
        .or_else(|| item.due_at.map(|dt| dt.date_naive()))
        .unwrap_or(NaiveDate::MAX);
    (date, item.due_at.is_none(), item.due_at)
}

/// Picks the single instance of one rule to surface in an "upcoming"
/// list: the open instance with the earliest date, preferring an
/// instance with a due timestamp on ties. Done instances never compete.
pub fn select_visible(instances: &[Item]) -> Option<&Item> {
    instances
        .iter()
        .filter(|i| i.status == ItemStatus::Open)
        .min_by_key(|i| selection_key(i))
}

/// Every completed instance, most recently completed first. Completed
/// views are never collapsed; history is shown in full.
pub fn completed_history(instances: &[Item]) -> Vec<&Item> {
    let mut done: Vec<&Item> = instances
        .iter()
        .filter(|i| i.status == ItemStatus::Done)
        .collect();
    done.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    done
}

/// Collapses a mixed list of open items so that each rule contributes at
/// most one representative; one-off items pass through untouched. The
/// result is ordered by display date.
pub fn collapse_upcoming(items: Vec<Item>) -> Vec<Item> {
    let mut standalone: Vec<Item> = Vec::new();
    let mut by_rule: HashMap<Uuid, Vec<Item>> = HashMap::new();

    for item in items {
        match item.rule_id {
            Some(rule_id) => by_rule.entry(rule_id).or_default().push(item),
            None => standalone.push(item),
        }
    }

    let mut out = standalone;
    for (_, instances) in by_rule {
        if let Some(selected) = select_visible(&instances) {
            let selected = selected.clone();
            out.push(selected);
        }
    }

    out.sort_by(|a, b| selection_key(a).cmp(&selection_key(b)).then(a.title.cmp(&b.title)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instance(rule_id: Uuid, day: u32, status: ItemStatus) -> Item {
        Item {
            id: Uuid::now_v7(),
            kind: ItemKind::Task,
            title: "Lab report".to_string(),
            notes: None,
            course: None,
            tags: Vec::new(),
            links: Vec::new(),
            status,
            due_at: None,
            instance_date: Some(date(2025, 4, day)),
            rule_id: Some(rule_id),
            completed_at: match status {
                ItemStatus::Done => Some(Utc.with_ymd_and_hms(2025, 4, day, 12, 0, 0).unwrap()),
                ItemStatus::Open => None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn earliest_open_instance_wins() {
        let rule_id = Uuid::now_v7();
        let items = vec![
            instance(rule_id, 15, ItemStatus::Open),
            instance(rule_id, 5, ItemStatus::Open),
            instance(rule_id, 10, ItemStatus::Open),
        ];
        let selected = select_visible(&items).unwrap();
        assert_eq!(selected.instance_date, Some(date(2025, 4, 5)));
    }

    #[test]
    fn completing_the_earliest_promotes_the_next() {
        let rule_id = Uuid::now_v7();
        let items = vec![
            instance(rule_id, 5, ItemStatus::Done),
            instance(rule_id, 10, ItemStatus::Open),
            instance(rule_id, 15, ItemStatus::Open),
        ];
        let selected = select_visible(&items).unwrap();
        assert_eq!(selected.instance_date, Some(date(2025, 4, 10)));
    }

    #[test]
    fn instance_with_timestamp_beats_date_only_peer() {
        let rule_id = Uuid::now_v7();
        let mut with_time = instance(rule_id, 5, ItemStatus::Open);
        with_time.due_at = Some(Utc.with_ymd_and_hms(2025, 4, 5, 9, 0, 0).unwrap());
        let date_only = instance(rule_id, 5, ItemStatus::Open);

        let items = vec![date_only, with_time.clone()];
        let selected = select_visible(&items).unwrap();
        assert_eq!(selected.id, with_time.id);
    }

    #[test]
    fn all_done_selects_nothing() {
        let rule_id = Uuid::now_v7();
        let items = vec![
            instance(rule_id, 5, ItemStatus::Done),
            instance(rule_id, 10, ItemStatus::Done),
        ];
        assert!(select_visible(&items).is_none());
    }

    #[test]
    fn completed_history_is_newest_first() {
        let rule_id = Uuid::now_v7();
        let items = vec![
            instance(rule_id, 5, ItemStatus::Done),
            instance(rule_id, 19, ItemStatus::Done),
            instance(rule_id, 12, ItemStatus::Done),
            instance(rule_id, 26, ItemStatus::Open),
        ];
        let history = completed_history(&items);
        let days: Vec<u32> = history
            .iter()
            .filter_map(|i| i.instance_date.map(|d| chrono::Datelike::day(&d)))
            .collect();
        assert_eq!(days, vec![19, 12, 5]);
    }

    #[test]
    fn collapse_keeps_one_per_rule_and_all_standalone() {
        let rule_a = Uuid::now_v7();
        let rule_b = Uuid::now_v7();
        let mut one_off = instance(rule_a, 7, ItemStatus::Open);
        one_off.rule_id = None;
        one_off.title = "Buy lab goggles".to_string();

        let items = vec![
            instance(rule_a, 5, ItemStatus::Open),
            instance(rule_a, 12, ItemStatus::Open),
            instance(rule_b, 9, ItemStatus::Open),
            instance(rule_b, 2, ItemStatus::Open),
            one_off,
        ];

        let collapsed = collapse_upcoming(items);
        assert_eq!(collapsed.len(), 3);
        let days: Vec<u32> = collapsed
            .iter()
            .filter_map(|i| i.instance_date.map(|d| chrono::Datelike::day(&d)))
            .collect();
        assert_eq!(days, vec![2, 5, 7]);
    }
}
