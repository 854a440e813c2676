//! Task status transitions and the rules guarding them.

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackerError};
use crate::model::{Note, Task, TaskStatus, User};

/// A requested change of status, as entered by a user.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    /// Minutes worked, required when completing.
    pub duration: Option<i64>,
    pub note: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: TaskStatus) -> Self {
        StatusUpdate {
            status,
            duration: None,
            note: None,
        }
    }

    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration = Some(minutes);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The note, trimmed, if anything is left of it.
    fn note_text(&self) -> Option<&str> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Supervisors can edit any task, everybody else only what is assigned to
/// them.
pub fn can_edit(actor: &User, task: &Task) -> bool {
    actor.role.is_supervisor() || task.assignee_id == actor.id
}

/// Validate `update` against `task` and apply it. On error the task is left
/// untouched.
pub fn apply_status_update(
    task: &mut Task,
    update: &StatusUpdate,
    actor: &User,
    now: DateTime<Utc>,
) -> Result<()> {
    let note = update.note_text();

    if matches!(update.status, TaskStatus::Postponed | TaskStatus::Cancelled) && note.is_none() {
        return Err(TrackerError::validation(format!(
            "a note explaining why is required to mark a task {}",
            update.status
        )));
    }

    if update.status == TaskStatus::Completed {
        let minutes = match update.duration {
            Some(minutes) if minutes > 0 => minutes,
            _ => {
                return Err(TrackerError::validation(
                    "a positive work duration is required to complete a task",
                ))
            }
        };
        if let Some(estimate) = task.estimated_duration {
            if minutes > i64::from(estimate) && note.is_none() {
                return Err(TrackerError::validation(format!(
                    "the estimated duration ({} min) was exceeded, a note is required",
                    estimate
                )));
            }
        }
        let minutes = u32::try_from(minutes)
            .map_err(|_| TrackerError::validation("work duration is too large"))?;
        task.completed_at = Some(now);
        task.work_duration = Some(minutes);
    } else {
        task.completed_at = None;
        task.work_duration = None;
    }

    task.status = update.status;

    if let Some(note) = note {
        task.notes.push(Note {
            user_id: actor.id.clone(),
            text: format!("[STATUS: {}] {}", update.status.as_str().to_uppercase(), note),
            time: now,
        });
    }
    Ok(())
}

/// Append a free-form note.
pub fn add_note(task: &mut Task, actor: &User, text: &str, now: DateTime<Utc>) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TrackerError::validation("note text is empty"));
    }
    task.notes.push(Note {
        user_id: actor.id.clone(),
        text: text.to_string(),
        time: now,
    });
    Ok(())
}

/// Change the estimate of a task, supervisors only.
pub fn set_estimate(task: &mut Task, actor: &User, minutes: i64) -> Result<()> {
    if !actor.role.is_supervisor() {
        return Err(TrackerError::permission("only supervisors can change estimates"));
    }
    if minutes <= 0 {
        return Err(TrackerError::validation("the estimate must be positive"));
    }
    let minutes =
        u32::try_from(minutes).map_err(|_| TrackerError::validation("the estimate is too large"))?;
    task.estimated_duration = Some(minutes);
    Ok(())
}
