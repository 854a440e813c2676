//! The application controller: every user-facing operation, with the role
//! checks that guard it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::model::{new_id, Note, Notification, Role, Task, TaskStatus, User};
use crate::report::{self, Period, PerformanceRow, RosterRow, Stats};
use crate::store::Store;
use crate::workflow::{self, StatusUpdate};

const UNKNOWN: &str = "Unknown";

/// Which slice of the task list to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTab {
    /// Open work assigned to the viewer.
    Mine,
    /// Every task with the given status.
    Status(TaskStatus),
}

impl fmt::Display for TaskTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskTab::Mine => f.write_str("mine"),
            TaskTab::Status(status) => write!(f, "{}", status),
        }
    }
}

impl FromStr for TaskTab {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mine" | "my" | "my-tasks" => Ok(TaskTab::Mine),
            other => other.parse::<TaskStatus>().map(TaskTab::Status),
        }
    }
}

/// Input of the create task form.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// Id or username; the creator when absent.
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// In minutes.
    pub estimate: Option<i64>,
    pub recurring: bool,
    pub quantity: u32,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            description: String::new(),
            assignee: None,
            due_date: None,
            estimate: None,
            recurring: false,
            quantity: 1,
        }
    }
}

/// Input of the add user form.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// A task with its people resolved to display names.
#[derive(Debug, Clone)]
pub struct TaskDetails {
    pub task: Task,
    pub creator: String,
    pub assignee: String,
    pub notes: Vec<(String, Note)>,
}

pub struct App {
    store: Store,
}

fn name_of(users: &[User], id: &str) -> String {
    users
        .iter()
        .find(|u| u.id == id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn find_task<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| TrackerError::NotFound(format!("task '{}'", id)))
}

fn require_admin(user: &User, action: &str) -> Result<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(TrackerError::permission(format!("only admins can {}", action)))
    }
}

impl App {
    pub fn new(store: Store) -> Self {
        App { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// The logged-in user, refreshed from the roster. A session whose user
    /// was deleted is dropped.
    pub fn session(&self) -> Result<User> {
        let recorded = self.store.current_user()?.ok_or(TrackerError::NotLoggedIn)?;
        match self.store.users()?.into_iter().find(|u| u.id == recorded.id) {
            Some(user) => Ok(user),
            None => {
                self.store.logout()?;
                Err(TrackerError::NotLoggedIn)
            }
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .login(username, password)?
            .ok_or(TrackerError::Auth)?;
        info!(user = %user.username, "logged in");
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.store.logout()
    }

    /// Resolve a user given by id or username.
    fn resolve_user(users: &[User], key: &str) -> Result<User> {
        users
            .iter()
            .find(|u| u.id == key || u.username == key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("user '{}'", key)))
    }

    pub fn create_task(&self, form: NewTask) -> Result<Vec<Task>> {
        let actor = self.session()?;
        let title = form.title.trim();
        if title.is_empty() {
            return Err(TrackerError::validation("the title is required"));
        }
        if form.quantity == 0 {
            return Err(TrackerError::validation("the quantity must be at least 1"));
        }
        let estimate = match form.estimate {
            Some(minutes) if minutes <= 0 => {
                return Err(TrackerError::validation("the estimate must be positive"))
            }
            Some(minutes) => Some(
                u32::try_from(minutes)
                    .map_err(|_| TrackerError::validation("the estimate is too large"))?,
            ),
            None => None,
        };

        let users = self.store.users()?;
        let assignee = match &form.assignee {
            Some(key) => Self::resolve_user(&users, key)?,
            None => actor.clone(),
        };

        let supervisor = actor.role.is_supervisor();
        if !supervisor {
            if assignee.id != actor.id {
                return Err(TrackerError::permission(
                    "only supervisors can assign tasks to others",
                ));
            }
            if form.recurring || form.quantity > 1 {
                return Err(TrackerError::permission(
                    "only supervisors can create recurring or bulk tasks",
                ));
            }
        }

        let now = self.now();
        let created: Vec<Task> = (1..=form.quantity)
            .map(|i| Task {
                id: new_id(),
                title: if form.quantity > 1 {
                    format!("{} #{}", title, i)
                } else {
                    title.to_string()
                },
                description: form.description.trim().to_string(),
                assignee_id: assignee.id.clone(),
                creator_id: actor.id.clone(),
                status: TaskStatus::Pending,
                due_date: form.due_date,
                created_at: now,
                assigned_at: Some(now),
                completed_at: None,
                estimated_duration: estimate,
                work_duration: None,
                is_recurring: form.recurring,
                parent_task_id: None,
                notes: Vec::new(),
            })
            .collect();

        let mut tasks = self.store.tasks()?;
        tasks.extend(created.iter().cloned());
        self.store.save_tasks(&tasks)?;
        info!(count = created.len(), assignee = %assignee.username, "tasks created");

        if assignee.id != actor.id {
            let mut notifications = self.store.notifications()?;
            notifications.push(Notification {
                id: new_id(),
                user_id: assignee.id.clone(),
                title: "New task".to_string(),
                message: format!("{} assigned you a new task: {}", actor.name, title),
                read: false,
                created_at: now,
            });
            self.store.save_notifications(&notifications)?;
        }
        Ok(created)
    }

    pub fn update_status(&self, task_id: &str, update: &StatusUpdate) -> Result<Task> {
        let actor = self.session()?;
        let mut tasks = self.store.tasks()?;
        let task = find_task(&mut tasks, task_id)?;
        if !workflow::can_edit(&actor, task) {
            return Err(TrackerError::permission(
                "only supervisors or the assignee can update this task",
            ));
        }
        workflow::apply_status_update(task, update, &actor, self.now())?;
        let updated = task.clone();
        self.store.save_tasks(&tasks)?;
        info!(task = %updated.id, status = %updated.status, "status updated");
        Ok(updated)
    }

    pub fn add_note(&self, task_id: &str, text: &str) -> Result<Task> {
        let actor = self.session()?;
        let mut tasks = self.store.tasks()?;
        let task = find_task(&mut tasks, task_id)?;
        workflow::add_note(task, &actor, text, self.now())?;
        let updated = task.clone();
        self.store.save_tasks(&tasks)?;
        Ok(updated)
    }

    pub fn set_estimate(&self, task_id: &str, minutes: i64) -> Result<Task> {
        let actor = self.session()?;
        let mut tasks = self.store.tasks()?;
        let task = find_task(&mut tasks, task_id)?;
        workflow::set_estimate(task, &actor, minutes)?;
        let updated = task.clone();
        self.store.save_tasks(&tasks)?;
        Ok(updated)
    }

    /// The default tab of a user.
    pub fn default_tab(user: &User) -> TaskTab {
        if user.role.is_supervisor() {
            TaskTab::Status(TaskStatus::Pending)
        } else {
            TaskTab::Mine
        }
    }

    /// Tasks of a tab, each with the assignee's name.
    pub fn task_list(&self, tab: Option<TaskTab>) -> Result<(TaskTab, Vec<(Task, String)>)> {
        let viewer = self.session()?;
        let tab = tab.unwrap_or_else(|| Self::default_tab(&viewer));
        let users = self.store.users()?;

        let selected: Vec<Task> = if viewer.role.is_supervisor() {
            match tab {
                TaskTab::Status(status) => self
                    .store
                    .tasks()?
                    .into_iter()
                    .filter(|t| t.status == status)
                    .collect(),
                TaskTab::Mine => self
                    .store
                    .tasks()?
                    .into_iter()
                    .filter(|t| t.assignee_id == viewer.id && !t.status.is_closed())
                    .collect(),
            }
        } else {
            let own = self
                .store
                .tasks()?
                .into_iter()
                .filter(|t| t.assignee_id == viewer.id);
            match tab {
                TaskTab::Mine => own.filter(|t| !t.status.is_closed()).collect(),
                TaskTab::Status(TaskStatus::Completed) => {
                    own.filter(|t| t.status == TaskStatus::Completed).collect()
                }
                TaskTab::Status(_) => {
                    return Err(TrackerError::permission(
                        "employees can list 'mine' or 'completed' only",
                    ))
                }
            }
        };

        let rows = selected
            .into_iter()
            .map(|t| {
                let name = name_of(&users, &t.assignee_id);
                (t, name)
            })
            .collect();
        Ok((tab, rows))
    }

    pub fn task_details(&self, task_id: &str) -> Result<TaskDetails> {
        self.session()?;
        let users = self.store.users()?;
        let task = self
            .store
            .tasks()?
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| TrackerError::NotFound(format!("task '{}'", task_id)))?;
        let notes = task
            .notes
            .iter()
            .map(|n| (name_of(&users, &n.user_id), n.clone()))
            .collect();
        Ok(TaskDetails {
            creator: name_of(&users, &task.creator_id),
            assignee: name_of(&users, &task.assignee_id),
            notes,
            task,
        })
    }

    pub fn stats(&self) -> Result<Stats> {
        let viewer = self.session()?;
        Ok(report::stats(&self.store.tasks()?, &viewer))
    }

    pub fn team(&self) -> Result<Vec<RosterRow>> {
        let viewer = self.session()?;
        require_admin(&viewer, "see the team")?;
        Ok(report::roster(&self.store.users()?, &self.store.tasks()?))
    }

    pub fn reports(&self, period: &Period) -> Result<Vec<PerformanceRow>> {
        let viewer = self.session()?;
        require_admin(&viewer, "see reports")?;
        let bounds = period.bounds(&Local::now());
        Ok(report::performance(
            &self.store.users()?,
            &self.store.tasks()?,
            &bounds,
        ))
    }

    pub fn add_user(&self, form: NewUser) -> Result<User> {
        let actor = self.session()?;
        require_admin(&actor, "add users")?;
        let username = form.username.trim();
        if username.is_empty() {
            return Err(TrackerError::validation("the username is required"));
        }
        if form.password.is_empty() {
            return Err(TrackerError::validation("the password is required"));
        }
        let mut users = self.store.users()?;
        if users.iter().any(|u| u.username == username) {
            return Err(TrackerError::validation(format!(
                "the username '{}' is already taken",
                username
            )));
        }
        let name = form.name.trim();
        let user = User {
            id: new_id(),
            username: username.to_string(),
            password: form.password,
            name: if name.is_empty() { username } else { name }.to_string(),
            role: form.role,
        };
        users.push(user.clone());
        self.store.save_users(&users)?;
        info!(user = %user.username, role = %user.role, "user added");
        Ok(user)
    }

    /// Remove a user, given by id or username.
    pub fn delete_user(&self, key: &str) -> Result<User> {
        let actor = self.session()?;
        require_admin(&actor, "delete users")?;
        let mut users = self.store.users()?;
        let target = Self::resolve_user(&users, key)?;
        if target.id == actor.id {
            return Err(TrackerError::validation("you cannot delete yourself"));
        }
        users.retain(|u| u.id != target.id);
        self.store.save_users(&users)?;
        info!(user = %target.username, "user deleted");
        Ok(target)
    }

    /// Change a password: your own, or anyone's as an admin. `key` is an id
    /// or username, yourself when absent.
    pub fn change_password(&self, key: Option<&str>, password: &str) -> Result<User> {
        let actor = self.session()?;
        if password.is_empty() {
            return Err(TrackerError::validation("the password is required"));
        }
        let mut users = self.store.users()?;
        let target_id = match key {
            Some(key) => Self::resolve_user(&users, key)?.id,
            None => actor.id.clone(),
        };
        if target_id != actor.id {
            require_admin(&actor, "reset other users' passwords")?;
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == target_id)
            .ok_or_else(|| TrackerError::NotFound(format!("user '{}'", target_id)))?;
        user.password = password.to_string();
        let updated = user.clone();
        self.store.save_users(&users)?;
        if updated.id == actor.id {
            self.store.set_current_user(&updated)?;
        }
        Ok(updated)
    }

    /// The viewer's notifications, newest first. Unread ones become read.
    pub fn notifications(&self) -> Result<Vec<Notification>> {
        let viewer = self.session()?;
        let mut all = self.store.notifications()?;
        let mut own: Vec<Notification> = all
            .iter()
            .filter(|n| n.user_id == viewer.id)
            .cloned()
            .collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if own.iter().any(|n| !n.read) {
            for n in all.iter_mut().filter(|n| n.user_id == viewer.id) {
                n.read = true;
            }
            self.store.save_notifications(&all)?;
        }
        Ok(own)
    }

    pub fn unread_count(&self) -> Result<usize> {
        let viewer = self.session()?;
        Ok(self
            .store
            .notifications()?
            .iter()
            .filter(|n| n.user_id == viewer.id && !n.read)
            .count())
    }
}
