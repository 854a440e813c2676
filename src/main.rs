#[macro_use] extern crate prettytable;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::Utc;
use directories::ProjectDirs;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod cli;
mod interface;

use nextask::app::{App, NewTask, NewUser, TaskTab};
use nextask::cloud::{CloudSync, Offline, SheetClient};
use nextask::recurrence;
use nextask::report::Period;
use nextask::store::Store;
use nextask::workflow::StatusUpdate;

use cli::{Command::*, CommandLineArgs};

fn find_default_store_file() -> Option<PathBuf> {
    let base_dirs = ProjectDirs::from("com", "gozque", "nextask")?;
    let root_dir = base_dirs.data_dir();
    if !root_dir.exists() {
        std::fs::create_dir_all(root_dir).ok()?;
    }
    let mut path = PathBuf::from(root_dir);
    path.push("store.sqlite");
    Some(path)
}

fn cloud_for(args: &CommandLineArgs) -> Box<dyn CloudSync> {
    match (&args.endpoint, args.offline) {
        (Some(endpoint), false) if !endpoint.trim().is_empty() => Box::new(SheetClient::new(
            endpoint.trim(),
            Duration::from_secs(args.timeout_secs),
        )),
        _ => Box::new(Offline),
    }
}

/// Open the store, seed it, pull the cloud copy and generate today's
/// recurring tasks.
fn open_app(args: &CommandLineArgs) -> anyhow::Result<App> {
    let store_file = args
        .store_file
        .clone()
        .or_else(find_default_store_file)
        .ok_or_else(|| anyhow!("Failed to find store file."))?;

    let store = Store::open(&store_file, cloud_for(args))
        .with_context(|| format!("Failed to open store {}", store_file.display()))?;

    let now = Utc::now();
    store.seed_if_needed(now).context("Failed to seed the store.")?;
    if !matches!(args.action, Sync) {
        store
            .init_from_cloud()
            .context("Failed to apply cloud data.")?;
    }
    recurrence::run_daily(&store, now).context("Failed to generate recurring tasks.")?;
    Ok(App::new(store))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nextask=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CommandLineArgs::from_args();
    let app = open_app(&args)?;

    match args.action {
        Login { username, password } => {
            let user = app.login(&username, &password)?;
            interface::whoami(&user, app.unread_count()?);
        }
        Logout => {
            app.logout()?;
            println!("Logged out.");
        }
        Whoami => interface::whoami(&app.session()?, app.unread_count()?),
        Add {
            title,
            description,
            assignee,
            due,
            estimate,
            recurring,
            quantity,
        } => {
            let created = app.create_task(NewTask {
                title,
                description,
                assignee,
                due_date: due,
                estimate,
                recurring,
                quantity,
            })?;
            interface::created(&created);
        }
        List { tab } => {
            let tab = tab.map(|t| t.parse::<TaskTab>()).transpose()?;
            let (tab, rows) = app.task_list(tab)?;
            interface::task_list(tab, &rows);
        }
        Show { id } => interface::task_details(&app.task_details(&id)?),
        Status {
            id,
            status,
            duration,
            note,
        } => {
            let update = StatusUpdate {
                status,
                duration,
                note,
            };
            interface::task_updated(&app.update_status(&id, &update)?);
        }
        Note { id, text } => {
            app.add_note(&id, &text)?;
            println!("Note added.");
        }
        Estimate { id, duration } => {
            let task = app.set_estimate(&id, duration)?;
            println!("{}  estimate set to {} min", task.id, duration);
        }
        Stats => interface::stats(&app.stats()?),
        Team => interface::team(&app.team()?),
        Report { period, from, to } => {
            let period = match (period, from, to) {
                (Some(name), None, None) => name.parse::<Period>()?,
                (None, None, None) => Period::All,
                (None, start, end) => Period::Custom { start, end },
                (Some(_), _, _) => {
                    return Err(anyhow!("Use either --period or --from/--to, not both."))
                }
            };
            interface::report(&app.reports(&period)?);
        }
        UserAdd {
            username,
            password,
            name,
            role,
        } => {
            let user = app.add_user(NewUser {
                username,
                password,
                name,
                role,
            })?;
            println!("Added {} ({}).", user.username, user.role);
        }
        UserRm { user } => {
            let removed = app.delete_user(&user)?;
            println!("Removed {}.", removed.username);
        }
        Passwd { password, user } => {
            let changed = app.change_password(user.as_deref(), &password)?;
            println!("Password of {} updated.", changed.username);
        }
        Notifications => interface::notifications(&app.notifications()?),
        Sync => interface::sync(app.store().init_from_cloud()?),
    }
    Ok(())
}
