use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use humantime::parse_duration;
use structopt::StructOpt;

use nextask::model::{Role, TaskStatus};

/// Minutes from either a bare number ("90") or a humantime duration
/// ("1h 30m").
pub fn parse_minutes(src: &str) -> Result<i64, String> {
    if let Ok(minutes) = src.trim().parse::<i64>() {
        return Ok(minutes);
    }
    let duration: Duration = parse_duration(src).map_err(|e| e.to_string())?;
    Ok((duration.as_secs() / 60) as i64)
}

fn parse_day(src: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(src, "%Y-%m-%d").map_err(|e| format!("{} (expected YYYY-MM-DD)", e))
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Start a session.
    Login {
        #[structopt()]
        username: String,
        #[structopt()]
        password: String,
    },
    /// End the current session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Create a task (or several with --quantity).
    Add {
        /// The task title.
        #[structopt()]
        title: String,

        #[structopt(short, long, default_value = "")]
        description: String,

        /// Username or id of the assignee, yourself by default.
        #[structopt(short, long)]
        assignee: Option<String>,

        /// Due date, YYYY-MM-DD.
        #[structopt(long, parse(try_from_str = parse_day))]
        due: Option<NaiveDate>,

        /// Estimated duration, minutes or a duration like "1h 30m".
        #[structopt(short, long, parse(try_from_str = parse_minutes))]
        estimate: Option<i64>,

        /// Clone the task every day.
        #[structopt(short, long)]
        recurring: bool,

        /// How many copies to create.
        #[structopt(short, long, default_value = "1")]
        quantity: u32,
    },
    /// List tasks: "mine" or a status (pending, in-progress, postponed,
    /// cancelled, completed).
    List {
        #[structopt()]
        tab: Option<String>,
    },
    /// Show a task with its notes.
    Show {
        #[structopt()]
        id: String,
    },
    /// Change the status of a task.
    Status {
        #[structopt()]
        id: String,

        #[structopt()]
        status: TaskStatus,

        /// Time worked, required when completing.
        #[structopt(short, long, parse(try_from_str = parse_minutes))]
        duration: Option<i64>,

        /// Reason or comment, required when postponing, cancelling or
        /// exceeding the estimate.
        #[structopt(short, long)]
        note: Option<String>,
    },
    /// Add a note to a task.
    Note {
        #[structopt()]
        id: String,
        #[structopt()]
        text: String,
    },
    /// Change the estimated duration of a task.
    Estimate {
        #[structopt()]
        id: String,
        #[structopt(parse(try_from_str = parse_minutes))]
        duration: i64,
    },
    /// Task counters.
    Stats,
    /// The team with their assignment counters.
    Team,
    /// Performance of employees over a period.
    Report {
        /// daily, weekly, monthly or all.
        #[structopt(short, long)]
        period: Option<String>,

        /// First day, YYYY-MM-DD.
        #[structopt(long, parse(try_from_str = parse_day))]
        from: Option<NaiveDate>,

        /// Last day (inclusive), YYYY-MM-DD.
        #[structopt(long, parse(try_from_str = parse_day))]
        to: Option<NaiveDate>,
    },
    /// Add a team member.
    UserAdd {
        #[structopt()]
        username: String,
        #[structopt()]
        password: String,

        /// Display name, the username by default.
        #[structopt(short, long, default_value = "")]
        name: String,

        #[structopt(short, long, default_value = "employee")]
        role: Role,
    },
    /// Remove a team member.
    UserRm {
        /// Username or id.
        #[structopt()]
        user: String,
    },
    /// Change your password, or another user's as an admin.
    Passwd {
        #[structopt()]
        password: String,

        /// Username or id, yourself by default.
        #[structopt(short, long)]
        user: Option<String>,
    },
    /// Show your notifications and mark them as read.
    Notifications,
    /// Reconcile with the cloud now.
    Sync,
}

#[derive(Debug, StructOpt)]
#[structopt(name = "nextask", about = "A small team task tracker.")]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different store file.
    #[structopt(parse(from_os_str), short, long)]
    pub store_file: Option<PathBuf>,

    /// Cloud endpoint mirroring users and tasks.
    #[structopt(long, env = "NEXTASK_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Cloud request timeout.
    #[structopt(long, default_value = "5")]
    pub timeout_secs: u64,

    /// Do not talk to the cloud.
    #[structopt(long)]
    pub offline: bool,
}
