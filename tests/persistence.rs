use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use nextask::app::{App, NewTask, TaskTab};
use nextask::cloud::Offline;
use nextask::model::TaskStatus;
use nextask::recurrence;
use nextask::store::Store;
use nextask::workflow::StatusUpdate;

fn open(path: &std::path::Path) -> App {
    let store = Store::open(path, Box::new(Offline)).unwrap();
    store.seed_if_needed(Utc::now()).unwrap();
    App::new(store)
}

#[test]
fn state_survives_reopening_the_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.sqlite");

    let task_id = {
        let app = open(&path);
        app.login("admin", "123").unwrap();
        let mut form = NewTask::titled("Quarterly audit");
        form.assignee = Some("ayse".into());
        form.estimate = Some(240);
        app.create_task(form).unwrap()[0].id.clone()
    };

    let app = open(&path);
    // the session is kept between runs
    assert_eq!(app.session().unwrap().username, "admin");
    app.login("ayse", "123").unwrap();
    assert_eq!(app.unread_count().unwrap(), 1);

    let update = StatusUpdate::new(TaskStatus::Completed)
        .with_duration(300)
        .with_note("needed extra checks");
    app.update_status(&task_id, &update).unwrap();

    let app = open(&path);
    let (_, done) = app
        .task_list(Some(TaskTab::Status(TaskStatus::Completed)))
        .unwrap();
    let audit = done
        .iter()
        .map(|(t, _)| t)
        .find(|t| t.id == task_id)
        .unwrap();
    assert_eq!(audit.work_duration, Some(300));
    assert_eq!(audit.notes.len(), 1);
    assert!(audit.notes[0].text.starts_with("[STATUS: COMPLETED]"));
}

#[test]
fn recurring_masters_spawn_one_instance_per_day() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.sqlite");

    let app = open(&path);
    app.login("mudur", "123").unwrap();
    let mut form = NewTask::titled("Open the shop");
    form.assignee = Some("personel".into());
    form.recurring = true;
    let master = app.create_task(form).unwrap().remove(0);

    let day1 = Utc.with_ymd_and_hms(2030, 6, 3, 7, 0, 0).unwrap();
    assert_eq!(recurrence::run_daily(app.store(), day1).unwrap(), 1);
    assert_eq!(recurrence::run_daily(app.store(), day1).unwrap(), 0);

    let day2 = Utc.with_ymd_and_hms(2030, 6, 4, 7, 0, 0).unwrap();
    assert_eq!(recurrence::run_daily(app.store(), day2).unwrap(), 1);

    let children: Vec<_> = app
        .store()
        .tasks()
        .unwrap()
        .into_iter()
        .filter(|t| t.parent_task_id.as_deref() == Some(master.id.as_str()))
        .collect();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|t| t.status == TaskStatus::Pending));
}
