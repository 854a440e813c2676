use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::error::Result;
use crate::model::{Task, TaskStatus};
use crate::store::Store;

/// Clone every recurring master that has no instance created on `today`.
/// `next_id` provides the ids of the clones.
pub fn generate_instances<F>(
    tasks: &[Task],
    today: NaiveDate,
    now: DateTime<Utc>,
    mut next_id: F,
) -> Vec<Task>
where
    F: FnMut() -> String,
{
    tasks
        .iter()
        .filter(|task| task.is_recurring_master())
        .filter(|master| {
            !tasks.iter().any(|t| {
                t.parent_task_id.as_deref() == Some(master.id.as_str())
                    && t.created_at.date_naive() == today
            })
        })
        .map(|master| Task {
            id: next_id(),
            parent_task_id: Some(master.id.clone()),
            status: TaskStatus::Pending,
            created_at: now,
            assigned_at: Some(now),
            completed_at: None,
            work_duration: None,
            due_date: Some(today),
            notes: Vec::new(),
            ..master.clone()
        })
        .collect()
}

/// Run the recurrence check at most once per UTC day. Returns the number of
/// instances created.
pub fn run_daily(store: &Store, now: DateTime<Utc>) -> Result<usize> {
    run_daily_on(store, now.date_naive(), now)
}

pub fn run_daily_on(store: &Store, today: NaiveDate, now: DateTime<Utc>) -> Result<usize> {
    if store.last_recurrence_run()? == Some(today) {
        return Ok(0);
    }

    let mut tasks = store.tasks()?;
    let instances = generate_instances(&tasks, today, now, crate::model::new_id);
    let created = instances.len();
    if created > 0 {
        tasks.extend(instances);
        store.save_tasks(&tasks)?;
        info!(count = created, "recurring tasks generated");
    }
    store.set_last_recurrence_run(today)?;
    Ok(created)
}
