//! Local key/value store.
//!
//! Every piece of state lives under a fixed key of a single SQLite table, as
//! a JSON document. Saving users or tasks also pushes them to the cloud
//! mirror, best effort.

use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cloud::{CloudSync, Offline};
use crate::error::Result;
use crate::model::{Note, Notification, Role, Snapshot, Task, TaskStatus, User};

pub const USERS_KEY: &str = "nex_users";
pub const TASKS_KEY: &str = "nex_tasks";
pub const NOTIFICATIONS_KEY: &str = "nex_notifications";
pub const CURRENT_USER_KEY: &str = "nex_currentUser";
pub const SEED_VERSION_KEY: &str = "nex_seed_version";
pub const LAST_RECURRENCE_KEY: &str = "nex_last_recur_run";

/// Bump to replace the demo dataset on the next start.
pub const SEED_VERSION: &str = "4";

/// What happened when reconciling with the cloud at start up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No remote is configured.
    Disabled,
    /// The remote could not be reached; local data is used as is.
    Offline,
    /// Remote users and/or tasks replaced the local ones.
    Pulled,
    /// The remote was empty and received the local data.
    Pushed,
    /// The remote answered with something unexpected.
    Ignored,
}

pub struct Store {
    db: Connection,
    cloud: Box<dyn CloudSync>,
}

impl Store {
    /// Open the store at `path`, creating its table if needed.
    pub fn open(path: &Path, cloud: Box<dyn CloudSync>) -> Result<Store> {
        let db = Connection::open(path)?;
        Store::with_connection(db, cloud)
    }

    /// A throwaway store, without a cloud mirror.
    pub fn in_memory() -> Result<Store> {
        Store::with_connection(Connection::open_in_memory()?, Box::new(Offline))
    }

    pub fn with_connection(db: Connection, cloud: Box<dyn CloudSync>) -> Result<Store> {
        db.execute(
            "CREATE TABLE if not exists kv (
                  key             TEXT PRIMARY KEY,
                  value           TEXT NOT NULL
                  )",
            [],
        )?;
        Ok(Store { db, cloud })
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, raw],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn users(&self) -> Result<Vec<User>> {
        Ok(self.get(USERS_KEY)?.unwrap_or_default())
    }

    pub fn tasks(&self) -> Result<Vec<Task>> {
        Ok(self.get(TASKS_KEY)?.unwrap_or_default())
    }

    pub fn notifications(&self) -> Result<Vec<Notification>> {
        Ok(self.get(NOTIFICATIONS_KEY)?.unwrap_or_default())
    }

    pub fn save_users(&self, users: &[User]) -> Result<()> {
        self.set(USERS_KEY, users)?;
        self.push_to_cloud()?;
        Ok(())
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.set(TASKS_KEY, tasks)?;
        self.push_to_cloud()?;
        Ok(())
    }

    /// Notifications stay local.
    pub fn save_notifications(&self, notifications: &[Notification]) -> Result<()> {
        self.set(NOTIFICATIONS_KEY, notifications)
    }

    /// The user recorded in the session, if any.
    pub fn current_user(&self) -> Result<Option<User>> {
        self.get(CURRENT_USER_KEY)
    }

    pub fn set_current_user(&self, user: &User) -> Result<()> {
        self.set(CURRENT_USER_KEY, user)
    }

    /// Start a session for the user matching both credentials.
    pub fn login(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self
            .users()?
            .into_iter()
            .find(|u| u.username == username && u.password == password);
        if let Some(user) = &user {
            self.set_current_user(user)?;
        }
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.remove(CURRENT_USER_KEY)
    }

    pub fn seed_version(&self) -> Result<Option<String>> {
        self.get(SEED_VERSION_KEY)
    }

    pub fn last_recurrence_run(&self) -> Result<Option<NaiveDate>> {
        self.get(LAST_RECURRENCE_KEY)
    }

    pub fn set_last_recurrence_run(&self, day: NaiveDate) -> Result<()> {
        self.set(LAST_RECURRENCE_KEY, &day)
    }

    /// Send users and tasks to the cloud. Failures are logged and reported
    /// as `false`; they never fail the local write.
    pub fn push_to_cloud(&self) -> Result<bool> {
        let snapshot = Snapshot {
            users: self.users()?,
            tasks: self.tasks()?,
        };
        match self.cloud.save(&snapshot) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "cloud save failed, working offline");
                Ok(false)
            }
        }
    }

    /// Reconcile with the cloud: a remote document wins over local data, an
    /// empty remote gets the local data.
    pub fn init_from_cloud(&self) -> Result<SyncOutcome> {
        let remote = match self.cloud.load() {
            Ok(Some(remote)) => remote,
            Ok(None) => return Ok(SyncOutcome::Disabled),
            Err(e) => {
                warn!(error = %e, "cloud load failed, starting offline");
                return Ok(SyncOutcome::Offline);
            }
        };

        match remote {
            serde_json::Value::Object(mut doc) => {
                if let Some(users) = doc.remove("users").filter(|v| !v.is_null()) {
                    let users: Vec<User> = serde_json::from_value(users)?;
                    self.set(USERS_KEY, &users)?;
                }
                if let Some(tasks) = doc.remove("tasks").filter(|v| !v.is_null()) {
                    let tasks: Vec<Task> = serde_json::from_value(tasks)?;
                    self.set(TASKS_KEY, &tasks)?;
                }
                info!("loaded data from the cloud");
                Ok(SyncOutcome::Pulled)
            }
            serde_json::Value::Array(items) if items.is_empty() => {
                info!("cloud is empty, pushing local data");
                if self.push_to_cloud()? {
                    Ok(SyncOutcome::Pushed)
                } else {
                    Ok(SyncOutcome::Offline)
                }
            }
            other => {
                warn!(response = %other, "unexpected cloud response, ignoring it");
                Ok(SyncOutcome::Ignored)
            }
        }
    }

    /// Write the demo dataset unless the current seed version is present.
    /// Returns whether it did.
    pub fn seed_if_needed(&self, now: DateTime<Utc>) -> Result<bool> {
        let has_users = self.get::<Vec<User>>(USERS_KEY)?.is_some();
        if has_users && self.seed_version()?.as_deref() == Some(SEED_VERSION) {
            return Ok(false);
        }
        let (users, tasks) = demo_data(now);
        self.set(USERS_KEY, &users)?;
        self.set(TASKS_KEY, &tasks)?;
        self.set::<[Notification]>(NOTIFICATIONS_KEY, &[])?;
        self.set(SEED_VERSION_KEY, SEED_VERSION)?;
        info!(version = SEED_VERSION, "seeded demo data");
        Ok(true)
    }
}

fn demo_user(id: &str, username: &str, name: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        password: "123".to_string(),
        name: name.to_string(),
        role,
    }
}

/// A completed task from January 2024: (id, title, assignee, creator, due
/// day, estimated minutes, worked minutes, finishing hour).
type HistoryRow = (&'static str, &'static str, &'static str, &'static str, u32, u32, u32, u32);

const HISTORY: [HistoryRow; 3] = [
    ("task_h1", "Past report 1", "emp_1", "admin_1", 10, 300, 270, 14),
    ("task_h2", "Past report 2", "emp_1", "admin_1", 11, 180, 240, 16),
    ("task_h3", "Ayse task 1", "emp_2", "manager_1", 12, 480, 420, 10),
];

fn history_task(row: &HistoryRow, now: DateTime<Utc>) -> Task {
    let (id, title, assignee, creator, day, estimated, worked, hour) = *row;
    let at = |day: u32, hour: u32| {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0)
            .single()
            .unwrap_or(now)
    };
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        assignee_id: assignee.to_string(),
        creator_id: creator.to_string(),
        status: TaskStatus::Completed,
        due_date: NaiveDate::from_ymd_opt(2024, 1, day),
        created_at: at(day - 9, 9),
        assigned_at: None,
        completed_at: Some(at(day, hour)),
        estimated_duration: Some(estimated),
        work_duration: Some(worked),
        is_recurring: false,
        parent_task_id: None,
        notes: Vec::new(),
    }
}

/// Four users and a small completed history so reports have something to
/// show.
fn demo_data(now: DateTime<Utc>) -> (Vec<User>, Vec<Task>) {
    let users = vec![
        demo_user("admin_1", "admin", "Administrator", Role::Admin),
        demo_user("manager_1", "mudur", "Manager Ahmet", Role::Manager),
        demo_user("emp_1", "personel", "Employee Ali", Role::Employee),
        demo_user("emp_2", "ayse", "Employee Ayse", Role::Employee),
    ];

    let welcome = Task {
        id: "task_1".to_string(),
        title: "First task".to_string(),
        description: "Welcome to the system.".to_string(),
        assignee_id: "emp_1".to_string(),
        creator_id: "admin_1".to_string(),
        status: TaskStatus::Pending,
        due_date: NaiveDate::from_ymd_opt(2025, 12, 31),
        created_at: now,
        assigned_at: Some(now),
        completed_at: None,
        estimated_duration: Some(120),
        work_duration: None,
        is_recurring: false,
        parent_task_id: None,
        notes: vec![Note {
            user_id: "admin_1".to_string(),
            text: "Welcome message.".to_string(),
            time: now,
        }],
    };

    let mut tasks = vec![welcome];
    tasks.extend(HISTORY.iter().map(|row| history_task(row, now)));
    (users, tasks)
}
