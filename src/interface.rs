use chrono::{DateTime, Local, Utc};
use prettytable::Table;

use nextask::app::{TaskDetails, TaskTab};
use nextask::model::{Notification, Task, User};
use nextask::report::{PerformanceRow, RosterRow, Stats};
use nextask::store::SyncOutcome;

const WRAP: usize = 48;

fn fmt_minutes(minutes: Option<u32>) -> String {
    minutes.map_or_else(|| "-".to_string(), |m| format!("{} min", m))
}

fn fmt_hours(minutes: f64) -> String {
    format!("{:.1}", minutes / 60.0)
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%F %R").to_string()
}

/// Hours and minutes since the task was assigned, "-" once it is closed.
fn fmt_elapsed(task: &Task, now: DateTime<Utc>) -> String {
    match task.elapsed(now) {
        Some(elapsed) => format!("{}h {}m", elapsed.num_hours(), elapsed.num_minutes() % 60),
        None => "-".to_string(),
    }
}

fn fmt_title(task: &Task) -> String {
    let title = textwrap::fill(&task.title, WRAP);
    if task.is_recurring {
        format!("{} (daily)", title)
    } else {
        title
    }
}

pub fn whoami(user: &User, unread: usize) {
    println!("{} ({}, {})", user.name, user.username, user.role);
    if unread > 0 {
        println!("{} unread notification(s), see 'nextask notifications'.", unread);
    }
}

pub fn created(tasks: &[Task]) {
    for task in tasks {
        println!("{}  {}", task.id, task.title);
    }
}

pub fn task_list(tab: TaskTab, rows: &[(Task, String)]) {
    println!("Tab: {}", tab);
    if rows.is_empty() {
        println!("No tasks.");
        return;
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.add_row(row!["id", "task", "assignee", "due", "estimate", "elapsed", "status"]);
    for (task, assignee) in rows {
        table.add_row(row![
            task.id,
            fmt_title(task),
            assignee,
            task.due_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            fmt_minutes(task.estimated_duration),
            fmt_elapsed(task, now),
            task.status
        ]);
    }
    table.printstd();
}

pub fn task_details(details: &TaskDetails) {
    let task = &details.task;
    let mut table = Table::new();
    table.add_row(row!["id", task.id]);
    table.add_row(row!["title", fmt_title(task)]);
    if !task.description.is_empty() {
        table.add_row(row!["description", textwrap::fill(&task.description, WRAP)]);
    }
    table.add_row(row!["status", task.status]);
    table.add_row(row!["created by", details.creator]);
    table.add_row(row!["assigned to", details.assignee]);
    table.add_row(row!["created", fmt_time(task.created_at)]);
    if let Some(due) = task.due_date {
        table.add_row(row!["due", due]);
    }
    table.add_row(row!["estimate", fmt_minutes(task.estimated_duration)]);
    if let Some(done) = task.completed_at {
        table.add_row(row!["completed", fmt_time(done)]);
        table.add_row(row!["worked", fmt_minutes(task.work_duration)]);
    }
    if let Some(parent) = &task.parent_task_id {
        table.add_row(row!["repeats", parent]);
    }
    table.printstd();

    if details.notes.is_empty() {
        println!("No notes yet.");
        return;
    }
    let mut notes = Table::new();
    notes.add_row(row!["when", "who", "note"]);
    for (author, note) in &details.notes {
        notes.add_row(row![fmt_time(note.time), author, textwrap::fill(&note.text, WRAP)]);
    }
    notes.printstd();
}

pub fn task_updated(task: &Task) {
    println!("{}  {} -> {}", task.id, task.title, task.status);
}

pub fn stats(stats: &Stats) {
    let mut table = Table::new();
    table.add_row(row!["total", "pending", "completed"]);
    table.add_row(row![stats.total, stats.pending, stats.completed]);
    table.printstd();
}

pub fn team(rows: &[RosterRow]) {
    let mut table = Table::new();
    table.add_row(row!["name", "username", "role", "assigned", "completed"]);
    for row in rows {
        table.add_row(row![
            row.user.name,
            row.user.username,
            row.user.role,
            row.assigned,
            row.completed
        ]);
    }
    table.printstd();
}

pub fn report(rows: &[PerformanceRow]) {
    let mut table = Table::new();
    table.add_row(row!["employee", "tasks", "estimated (h)", "actual (h)", "average (h)"]);
    for row in rows {
        table.add_row(row![
            row.user.name,
            row.tasks,
            fmt_hours(row.estimated_minutes as f64),
            fmt_hours(row.actual_minutes as f64),
            row.average_minutes().map_or_else(|| "-".to_string(), fmt_hours)
        ]);
    }
    table.printstd();
}

pub fn notifications(items: &[Notification]) {
    if items.is_empty() {
        println!("No notifications.");
        return;
    }
    let mut table = Table::new();
    for n in items {
        let marker = if n.read { "" } else { "*" };
        table.add_row(row![
            marker,
            fmt_time(n.created_at),
            n.title,
            textwrap::fill(&n.message, WRAP)
        ]);
    }
    table.printstd();
}

pub fn sync(outcome: SyncOutcome) {
    let text = match outcome {
        SyncOutcome::Disabled => "No cloud endpoint configured.",
        SyncOutcome::Offline => "Cloud unreachable, working offline.",
        SyncOutcome::Pulled => "Loaded users and tasks from the cloud.",
        SyncOutcome::Pushed => "Cloud was empty, local data pushed.",
        SyncOutcome::Ignored => "Unexpected cloud response, local data kept.",
    };
    println!("{}", text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nextask::model::TaskStatus;

    fn task() -> Task {
        serde_json::from_value(serde_json::json!({
            "id": "t", "title": "Call supplier", "assigneeId": "a", "creatorId": "c",
            "status": "pending", "createdAt": "2024-01-01T08:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn elapsed_is_hours_and_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 10, 15, 0).unwrap();
        let mut t = task();
        assert_eq!(fmt_elapsed(&t, now), "26h 15m");
        t.status = TaskStatus::Cancelled;
        assert_eq!(fmt_elapsed(&t, now), "-");
    }

    #[test]
    fn hours_have_one_decimal() {
        assert_eq!(fmt_hours(270.0), "4.5");
        assert_eq!(fmt_hours(250.0), "4.2");
        assert_eq!(fmt_hours(300.0), "5.0");
        assert_eq!(fmt_minutes(None), "-");
        assert_eq!(fmt_minutes(Some(30)), "30 min");
    }

    #[test]
    fn recurring_titles_are_marked() {
        let mut t = task();
        assert_eq!(fmt_title(&t), "Call supplier");
        t.is_recurring = true;
        assert_eq!(fmt_title(&t), "Call supplier (daily)");
    }
}
