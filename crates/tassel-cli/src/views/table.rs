use chrono::NaiveDate;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use tassel_core::models::{Item, ItemStatus, RecurrenceRule};

pub fn display_items(items: &[Item], today: NaiveDate) {
    if items.is_empty() {
        println!("Nothing here.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Due", "Course", "Tags"]);

    for item in items {
        let mut row = Row::new();
        row.add_cell(Cell::new(&item.id.simple().to_string()[..7]));

        let mut display_title = String::new();
        if item.rule_id.is_some() {
            display_title.push('↻'); // recurring instance
            display_title.push(' ');
        }
        display_title.push_str(&item.title);

        let mut title_cell = Cell::new(display_title);
        match item.status {
            ItemStatus::Done => {
                title_cell = title_cell
                    .add_attribute(Attribute::CrossedOut)
                    .fg(Color::DarkGrey);
            }
            ItemStatus::Open => {
                if let Some(date) = display_date(item) {
                    if date < today {
                        title_cell = title_cell.fg(Color::Red).add_attribute(Attribute::Bold);
                    } else if date == today {
                        title_cell = title_cell.fg(Color::Yellow);
                    }
                }
            }
        }
        row.add_cell(title_cell);

        let status_cell = match item.status {
            ItemStatus::Done => Cell::new("done").fg(Color::Green),
            ItemStatus::Open => Cell::new("open"),
        };
        row.add_cell(status_cell);

        let due_text = match (item.due_at, item.instance_date) {
            (Some(due), _) => due.format("%Y-%m-%d %H:%M").to_string(),
            (None, Some(date)) => date.format("%Y-%m-%d").to_string(),
            (None, None) => "-".to_string(),
        };
        let due_cell = if item.status == ItemStatus::Open
            && display_date(item).is_some_and(|d| d < today)
        {
            Cell::new(due_text).fg(Color::Red)
        } else {
            Cell::new(due_text)
        };
        row.add_cell(due_cell);

        row.add_cell(Cell::new(item.course.as_deref().unwrap_or("-")));
        row.add_cell(Cell::new(if item.tags.is_empty() {
            "-".to_string()
        } else {
            item.tags.join(", ")
        }));

        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_rules(rules: &[RecurrenceRule]) {
    if rules.is_empty() {
        println!("No rules defined.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Kind", "Title", "Repeats", "Ends", "Generated", "Active",
    ]);

    for rule in rules {
        let mut row = Row::new();
        row.add_cell(Cell::new(&rule.id.simple().to_string()[..7]));
        row.add_cell(Cell::new(rule.kind.to_string()));
        row.add_cell(Cell::new(&rule.template.title));
        row.add_cell(Cell::new(rule.recurrence.to_string()));
        row.add_cell(Cell::new(rule.end.to_string()));
        row.add_cell(Cell::new(rule.occurrences_generated.to_string()));
        row.add_cell(if rule.active {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        });
        table.add_row(row);
    }

    println!("{table}");
}

fn display_date(item: &Item) -> Option<NaiveDate> {
    item.instance_date
        .or_else(|| item.due_at.map(|dt| dt.date_naive()))
}
