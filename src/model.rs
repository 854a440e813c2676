use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TrackerError;

/// Access tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    /// Admins and managers can see and edit every task.
    pub fn is_supervisor(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(TrackerError::validation(format!("unknown role '{}'", other))),
        }
    }
}

/// The lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "postponed")]
    Postponed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Postponed,
        TaskStatus::Cancelled,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Postponed => "postponed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Completed => "completed",
        }
    }

    /// Statuses that close a task for time tracking purposes.
    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Cancelled | TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| TrackerError::validation(format!("unknown status '{}'", s)))
    }
}

/// A team member able to log in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// A comment attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub user_id: String,
    pub text: String,
    pub time: DateTime<Utc>,
}

/// A single task, saved as an entry of the tasks list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: String,
    pub creator_id: String,
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// In minutes.
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub estimated_duration: Option<u32>,
    /// In minutes, set when the task is completed.
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub work_duration: Option<u32>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Task {
    /// Time spent since the task was handed over, None for closed tasks.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.status.is_closed() {
            return None;
        }
        let start = self.assigned_at.unwrap_or(self.created_at);
        Some(std::cmp::max(Duration::zero(), now - start))
    }

    /// The moment reports attribute the task to.
    pub fn report_time(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    /// A recurring master is cloned every day; its clones are not masters.
    pub fn is_recurring_master(&self) -> bool {
        self.is_recurring && self.parent_task_id.is_none()
    }
}

/// A message waiting for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// The part of the state mirrored to the cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
}

/// Fresh random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Durations were stored as numbers by some writers and as strings by
/// others. Zero, empty and unparseable values mean "not set".
fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let minutes = match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    };
    Ok(minutes
        .filter(|n| n.is_finite() && *n >= 1.0)
        .map(|n| n.round() as u32))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            // sheet exports write full timestamps, keep the date as written
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw_task() -> serde_json::Value {
        json!({
            "id": "task_h1",
            "title": "Old report",
            "assigneeId": "emp_1",
            "creatorId": "admin_1",
            "status": "completed",
            "dueDate": "2024-01-10",
            "createdAt": "2024-01-01T09:00:00.000Z",
            "estimatedDuration": "300",
            "workDuration": 270,
            "completedAt": "2024-01-10T14:00:00.000Z",
            "completionTime": "14:00"
        })
    }

    #[test]
    fn reads_legacy_task_records() {
        let task: Task = serde_json::from_value(raw_task()).unwrap();
        assert_eq!(task.estimated_duration, Some(300));
        assert_eq!(task.work_duration, Some(270));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert!(task.notes.is_empty());
        assert!(!task.is_recurring);
        assert_eq!(task.description, "");
    }

    #[test]
    fn blank_durations_and_dates_are_unset() {
        let mut raw = raw_task();
        raw["estimatedDuration"] = json!("");
        raw["workDuration"] = json!(null);
        raw["dueDate"] = json!("");
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.estimated_duration, None);
        assert_eq!(task.work_duration, None);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn due_dates_accept_full_timestamps() {
        let mut raw = raw_task();
        raw["dueDate"] = json!("2025-12-31T00:00:00.000Z");
        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 12, 31));

        raw["dueDate"] = json!("2025-12-31T23:30:00+03:00");
        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 12, 31));

        raw["dueDate"] = json!("next friday");
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn writes_camel_case_and_numeric_minutes() {
        let task: Task = serde_json::from_value(raw_task()).unwrap();
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["estimatedDuration"], json!(300));
        assert_eq!(value["assigneeId"], json!("emp_1"));
        assert_eq!(value["dueDate"], json!("2024-01-10"));
    }

    #[test]
    fn status_parses_wire_and_cli_spellings() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("In_Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn elapsed_uses_assignment_time_and_skips_closed_tasks() {
        let mut task: Task = serde_json::from_value(raw_task()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 30, 0).unwrap();
        assert_eq!(task.elapsed(now), None);

        task.status = TaskStatus::Pending;
        assert_eq!(task.elapsed(now), Some(Duration::minutes(27 * 60 + 30)));

        task.assigned_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap());
        assert_eq!(task.elapsed(now), Some(Duration::minutes(30)));
    }
}
