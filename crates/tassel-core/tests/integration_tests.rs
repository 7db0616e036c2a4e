use chrono::{Datelike, NaiveDate, NaiveTime};
use tassel_core::db::establish_connection;
use tassel_core::error::CoreError;
use tassel_core::models::*;
use tassel_core::recurrence::GenerationConfig;
use tassel_core::repository::{
    GenerationRepository, ItemRepository, PropagationRepository, RuleRepository, SqliteRepository,
};
use tempfile::TempDir;

/// Helper function to create a test database
async fn setup_test_db(config: GenerationConfig) -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (SqliteRepository::new(pool, config), temp_dir)
}

async fn setup() -> (SqliteRepository, TempDir) {
    setup_test_db(GenerationConfig::default()).await
}

/// Two-week lookahead keeps the generated windows small enough to count
/// by hand in assertions.
async fn setup_short() -> (SqliteRepository, TempDir) {
    setup_test_db(GenerationConfig {
        lookahead_days: 14,
        max_batch_size: 100,
    })
    .await
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn weekly(days: &[u8]) -> Recurrence {
    Recurrence::Weekly {
        days: days.iter().copied().collect(),
    }
}

fn template(title: &str) -> ItemTemplate {
    ItemTemplate {
        title: title.to_string(),
        ..Default::default()
    }
}

fn rule_data(
    kind: ItemKind,
    recurrence: Recurrence,
    start: NaiveDate,
    end: EndCondition,
    title: &str,
) -> NewRuleData {
    NewRuleData {
        kind,
        recurrence,
        start_date: start,
        end,
        template: template(title),
    }
}

// 2025-03-03 is a Monday; most tests anchor on it.
fn monday_date() -> NaiveDate {
    date(2025, 3, 3)
}

#[tokio::test]
async fn weekly_rule_first_occurrence_aligns_to_day_set() {
    let (repo, _tmp) = setup_short().await;
    let thursday = date(2025, 3, 6);

    let (_, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0, 2]), // Mon, Wed
                thursday,
                EndCondition::Never,
                "Reading response",
            ),
            thursday,
        )
        .await
        .unwrap();

    // First occurrence is the following Monday, not the creation date.
    assert_eq!(instances[0].instance_date, Some(date(2025, 3, 10)));
    assert!(instances
        .iter()
        .all(|i| matches!(i.instance_date.map(|d| d.weekday().num_days_from_monday()), Some(0 | 2))));
}

#[tokio::test]
async fn advance_with_unchanged_rule_creates_nothing() {
    let (repo, _tmp) = setup().await;
    let start = date(2025, 3, 1);

    let (rule, first) = repo
        .create_rule(
            rule_data(
                ItemKind::Deadline,
                Recurrence::Daily,
                start,
                EndCondition::Never,
                "Flashcards",
            ),
            start,
        )
        .await
        .unwrap();
    assert_eq!(first.len(), 31); // inclusive 30-day window

    let second = repo.advance_rule(rule.id, start).await.unwrap();
    assert!(second.is_empty());

    let all = repo.items_for_rule(ItemKind::Deadline, rule.id).await.unwrap();
    assert_eq!(all.len(), 31);
}

#[tokio::test]
async fn after_count_bound_is_never_exceeded() {
    let (repo, _tmp) = setup().await;
    let start = date(2025, 3, 1);

    let (rule, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                Recurrence::Daily,
                start,
                EndCondition::AfterCount(5),
                "Vocabulary drill",
            ),
            start,
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 5);

    // Many further advances, ever later: still nothing new.
    for offset in [0i64, 10, 40] {
        let again = repo
            .advance_rule(rule.id, start + chrono::Duration::days(offset))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    let all = repo.items_for_rule(ItemKind::Task, rule.id).await.unwrap();
    assert_eq!(all.len(), 5);

    let stored = repo.find_rule_by_id(rule.id).await.unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(stored.occurrences_generated, 5);
}

#[tokio::test]
async fn monthly_day_31_lands_on_last_day_of_february() {
    let (repo, _tmp) = setup().await;

    let (rule, _) = repo
        .create_rule(
            rule_data(
                ItemKind::Deadline,
                Recurrence::Monthly {
                    days: [31u8].into_iter().collect(),
                },
                date(2025, 1, 1),
                EndCondition::Never,
                "Rent reminder",
            ),
            date(2025, 2, 1),
        )
        .await
        .unwrap();

    let all = repo
        .items_for_rule(ItemKind::Deadline, rule.id)
        .await
        .unwrap();
    let dates: Vec<NaiveDate> = all.iter().filter_map(|i| i.instance_date).collect();
    assert_eq!(dates, vec![date(2025, 1, 31), date(2025, 2, 28)]);
}

#[tokio::test]
async fn after_count_weekly_scenario_end_to_end() {
    let (repo, _tmp) = setup().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Exam,
                weekly(&[0]),
                start,
                EndCondition::AfterCount(3),
                "Weekly quiz",
            ),
            start,
        )
        .await
        .unwrap();

    // Exactly three instances, on three consecutive Mondays.
    let dates: Vec<NaiveDate> = instances.iter().filter_map(|i| i.instance_date).collect();
    assert_eq!(
        dates,
        vec![start, date(2025, 3, 10), date(2025, 3, 17)]
    );

    // A further advance produces none and the rule has deactivated.
    let fourth = repo.advance_rule(rule.id, start).await.unwrap();
    assert!(fourth.is_empty());
    let stored = repo.find_rule_by_id(rule.id).await.unwrap().unwrap();
    assert!(!stored.active);

    let all = repo.items_for_rule(ItemKind::Exam, rule.id).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn template_edit_is_soft_and_forward_only() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0]),
                start,
                EndCondition::Never,
                "Gym session",
            ),
            start,
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 3); // Mondays Mar 3, 10, 17

    // Complete the earliest instance; it becomes history.
    let completed = repo
        .complete_item(ItemKind::Task, instances[0].id)
        .await
        .unwrap();
    assert_eq!(completed.status, ItemStatus::Done);

    let update = RuleUpdate {
        template: Some(TemplatePatch {
            title: Some("Morning gym session".to_string()),
            ..Default::default()
        }),
        recurrence: None,
    };
    let (_, outcome) = repo.apply_rule_update(rule.id, update, start).await.unwrap();
    assert_eq!(outcome.template_updated, 2);
    assert_eq!(outcome.discarded, 0);

    let all = repo.items_for_rule(ItemKind::Task, rule.id).await.unwrap();
    for item in &all {
        match item.status {
            ItemStatus::Done => assert_eq!(item.title, "Gym session"),
            ItemStatus::Open => assert_eq!(item.title, "Morning gym session"),
        }
    }
}

#[tokio::test]
async fn shape_edit_is_destructive_but_spares_history() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0]),
                start,
                EndCondition::Never,
                "Gym session",
            ),
            start,
        )
        .await
        .unwrap();

    let completed_id = instances[0].id;
    repo.complete_item(ItemKind::Task, completed_id).await.unwrap();

    // Move the rule from Mondays to Wednesdays.
    let update = RuleUpdate {
        template: None,
        recurrence: Some(RecurrencePatch {
            recurrence: Some(weekly(&[2])),
            ..Default::default()
        }),
    };
    let (updated_rule, outcome) = repo.apply_rule_update(rule.id, update, start).await.unwrap();
    assert_eq!(outcome.discarded, 2);
    assert_eq!(outcome.regenerated, 2); // Wednesdays Mar 5, 12

    let all = repo.items_for_rule(ItemKind::Task, rule.id).await.unwrap();
    let completed: Vec<_> = all.iter().filter(|i| i.status == ItemStatus::Done).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, completed_id);
    assert_eq!(completed[0].instance_date, Some(start));

    let open_dates: Vec<NaiveDate> = all
        .iter()
        .filter(|i| i.status == ItemStatus::Open)
        .filter_map(|i| i.instance_date)
        .collect();
    assert_eq!(open_dates, vec![date(2025, 3, 5), date(2025, 3, 12)]);

    // Released slots kept the generated count honest.
    assert_eq!(updated_rule.occurrences_generated, 3);
}

#[tokio::test]
async fn start_date_cannot_move_before_generated_history() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, _) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0]),
                start,
                EndCondition::Never,
                "Laundry",
            ),
            start,
        )
        .await
        .unwrap();

    let update = RuleUpdate {
        template: None,
        recurrence: Some(RecurrencePatch {
            start_date: Some(start - chrono::Duration::days(14)),
            ..Default::default()
        }),
    };
    let result = repo.apply_rule_update(rule.id, update, start).await;
    assert!(matches!(result, Err(CoreError::InvalidRule(_))));
}

#[tokio::test]
async fn start_date_later_than_cursor_resets_it_forward() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, _) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0]),
                start,
                EndCondition::Never,
                "Laundry",
            ),
            start,
        )
        .await
        .unwrap();
    // Cursor now sits at the window end (Mar 17).

    let new_start = date(2025, 3, 24);
    let update = RuleUpdate {
        template: None,
        recurrence: Some(RecurrencePatch {
            start_date: Some(new_start),
            ..Default::default()
        }),
    };
    let (updated, outcome) = repo.apply_rule_update(rule.id, update, start).await.unwrap();
    assert_eq!(updated.cursor, new_start);
    assert_eq!(outcome.discarded, 3);
    // Nothing to regenerate yet: the new start lies beyond the window.
    assert_eq!(outcome.regenerated, 0);

    // The next sweep picks generation back up from the new start.
    let summary = repo.sweep(new_start).await.unwrap();
    assert_eq!(summary.rules_processed, 1);
    assert!(summary.instances_created > 0);

    let all = repo.items_for_rule(ItemKind::Task, rule.id).await.unwrap();
    let open_dates: Vec<NaiveDate> = all.iter().filter_map(|i| i.instance_date).collect();
    assert_eq!(open_dates.first(), Some(&new_start));
}

#[tokio::test]
async fn upcoming_view_shows_one_instance_per_rule() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(
                ItemKind::Task,
                weekly(&[0]),
                start,
                EndCondition::Never,
                "Essay draft",
            ),
            start,
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 3);

    let one_off = repo
        .add_item(NewItemData {
            due_date: Some(date(2025, 3, 8)),
            ..NewItemData::new(ItemKind::Task, "Return library books")
        })
        .await
        .unwrap();

    let upcoming = repo.upcoming_items(ItemKind::Task).await.unwrap();
    assert_eq!(upcoming.len(), 2);
    // The rule contributes only its earliest open instance.
    let from_rule: Vec<_> = upcoming.iter().filter(|i| i.rule_id == Some(rule.id)).collect();
    assert_eq!(from_rule.len(), 1);
    assert_eq!(from_rule[0].instance_date, Some(start));
    assert!(upcoming.iter().any(|i| i.id == one_off.id));

    // Completing the shown instance promotes the next date.
    repo.complete_item(ItemKind::Task, from_rule[0].id)
        .await
        .unwrap();
    let upcoming = repo.upcoming_items(ItemKind::Task).await.unwrap();
    let from_rule: Vec<_> = upcoming.iter().filter(|i| i.rule_id == Some(rule.id)).collect();
    assert_eq!(from_rule[0].instance_date, Some(date(2025, 3, 10)));

    // Completed views list history without collapsing.
    repo.complete_item(ItemKind::Task, from_rule[0].id)
        .await
        .unwrap();
    let done = repo.completed_items(ItemKind::Task).await.unwrap();
    assert_eq!(done.len(), 2);
    assert_eq!(done[0].instance_date, Some(date(2025, 3, 10))); // newest first
}

#[tokio::test]
async fn invalid_configurations_never_reach_the_generator() {
    let (repo, _tmp) = setup().await;
    let start = monday_date();

    let cases = vec![
        rule_data(ItemKind::Task, weekly(&[]), start, EndCondition::Never, "A"),
        rule_data(
            ItemKind::Task,
            Recurrence::Monthly {
                days: std::collections::BTreeSet::new(),
            },
            start,
            EndCondition::Never,
            "B",
        ),
        rule_data(
            ItemKind::Task,
            Recurrence::Interval { every_days: 0 },
            start,
            EndCondition::Never,
            "C",
        ),
        rule_data(
            ItemKind::Task,
            Recurrence::Daily,
            start,
            EndCondition::AfterCount(0),
            "D",
        ),
        rule_data(
            ItemKind::Task,
            Recurrence::Daily,
            start,
            EndCondition::OnDate(start - chrono::Duration::days(1)),
            "E",
        ),
    ];

    for data in cases {
        let result = repo.create_rule(data, start).await;
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    assert!(repo.find_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_extends_every_active_rule() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (task_rule, _) = repo
        .create_rule(
            rule_data(ItemKind::Task, weekly(&[0]), start, EndCondition::Never, "Quiz prep"),
            start,
        )
        .await
        .unwrap();
    let (exam_rule, _) = repo
        .create_rule(
            rule_data(
                ItemKind::Exam,
                Recurrence::Interval { every_days: 7 },
                start,
                EndCondition::Never,
                "Mock exam",
            ),
            start,
        )
        .await
        .unwrap();

    // A week later the sweep tops both windows back up.
    let summary = repo.sweep(start + chrono::Duration::days(7)).await.unwrap();
    assert_eq!(summary.rules_processed, 2);
    assert_eq!(summary.rules_with_errors, 0);
    assert!(summary.instances_created > 0);

    let task_count = repo
        .items_for_rule(ItemKind::Task, task_rule.id)
        .await
        .unwrap()
        .len();
    let exam_count = repo
        .items_for_rule(ItemKind::Exam, exam_rule.id)
        .await
        .unwrap()
        .len();
    assert_eq!(task_count, 4); // Mondays Mar 3..24
    assert_eq!(exam_count, 4);

    // Sweeping again at the same date is a no-op.
    let summary = repo.sweep(start + chrono::Duration::days(7)).await.unwrap();
    assert_eq!(summary.instances_created, 0);
}

#[tokio::test]
async fn due_time_edit_recomputes_open_instance_timestamps() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let mut data = rule_data(ItemKind::Exam, weekly(&[0]), start, EndCondition::Never, "Lab");
    data.template.due_time = NaiveTime::from_hms_opt(9, 0, 0);
    let (rule, instances) = repo.create_rule(data, start).await.unwrap();
    assert!(instances.iter().all(|i| i.due_at.is_some()));

    let new_time = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
    let update = RuleUpdate {
        template: Some(TemplatePatch {
            due_time: Some(Some(new_time)),
            ..Default::default()
        }),
        recurrence: None,
    };
    repo.apply_rule_update(rule.id, update, start).await.unwrap();

    let all = repo.items_for_rule(ItemKind::Exam, rule.id).await.unwrap();
    for item in all {
        let due = item.due_at.unwrap();
        assert_eq!(due.time(), new_time);
        assert_eq!(Some(due.date_naive()), item.instance_date);
    }
}

#[tokio::test]
async fn deleting_a_rule_preserves_history() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(ItemKind::Task, weekly(&[0]), start, EndCondition::Never, "Seminar notes"),
            start,
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 3);

    let done = repo
        .complete_item(ItemKind::Task, instances[0].id)
        .await
        .unwrap();

    repo.delete_rule(rule.id, start).await.unwrap();
    assert!(repo.find_rule_by_id(rule.id).await.unwrap().is_none());

    // Open future instances went with the rule; the completed one stays,
    // weak reference and all.
    let remaining = repo.items_for_rule(ItemKind::Task, rule.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, done.id);
    assert_eq!(remaining[0].rule_id, Some(rule.id));
}

#[tokio::test]
async fn generated_instances_behave_like_ordinary_items() {
    let (repo, _tmp) = setup_short().await;
    let start = monday_date();

    let (rule, instances) = repo
        .create_rule(
            rule_data(ItemKind::Deadline, weekly(&[0]), start, EndCondition::Never, "Homework"),
            start,
        )
        .await
        .unwrap();

    let target = &instances[1];
    let updated = repo
        .update_item(
            ItemKind::Deadline,
            target.id,
            UpdateItemData {
                notes: Some(Some("chapters 4-6".to_string())),
                tags: Some(vec!["math".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("chapters 4-6"));
    assert_eq!(updated.tags, vec!["math".to_string()]);
    // The back-reference is inert metadata; edits never touch the rule.
    assert_eq!(updated.rule_id, Some(rule.id));

    let stored_rule = repo.find_rule_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(stored_rule.template.notes, None);
}
