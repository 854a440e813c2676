//! Aggregates over the task list: dashboard counters, team roster and
//! per-employee performance over a period.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::TrackerError;
use crate::model::{Role, Task, TaskStatus, User};

/// The time window of a performance report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    /// Today.
    Daily,
    /// From Monday of this week until the end of today.
    Weekly,
    /// The whole current month.
    Monthly,
    /// Everything ever completed.
    All,
    /// Explicit dates, both inclusive, either may be open.
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl FromStr for Period {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Period::Daily),
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            "all" => Ok(Period::All),
            other => Err(TrackerError::validation(format!(
                "unknown period '{}', expected daily, weekly, monthly or all",
                other
            ))),
        }
    }
}

/// Inclusive bounds, `None` meaning unbounded.
pub type Bounds = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);

/// The first existing local instant of `day`. Midnight itself is skipped in
/// zones that switch to summer time at 00:00.
fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight: NaiveDateTime = day.and_hms_opt(0, 0, 0)?;
    (0..=16)
        .map(|step| midnight + Duration::minutes(15 * step))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|t| t.with_timezone(&Utc))
}

fn end_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    let last: NaiveDateTime = day.and_hms_milli_opt(23, 59, 59, 999)?;
    tz.from_local_datetime(&last)
        .latest()
        .map(|t| t.with_timezone(&Utc))
}

fn last_day_of_month(day: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

impl Period {
    /// Resolve the period against `now`, in the time zone of `now`.
    pub fn bounds<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Bounds {
        let tz = now.timezone();
        let today = now.date_naive();
        match self {
            Period::Daily => (start_of_day(&tz, today), end_of_day(&tz, today)),
            Period::Weekly => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (start_of_day(&tz, monday), end_of_day(&tz, today))
            }
            Period::Monthly => {
                let first = today.with_day(1);
                let last = last_day_of_month(today);
                (
                    first.and_then(|d| start_of_day(&tz, d)),
                    last.and_then(|d| end_of_day(&tz, d)),
                )
            }
            Period::All => (None, None),
            Period::Custom { start, end } => (
                start.and_then(|d| start_of_day(&tz, d)),
                end.and_then(|d| end_of_day(&tz, d)),
            ),
        }
    }
}

fn within(bounds: &Bounds, at: DateTime<Utc>) -> bool {
    bounds.0.map_or(true, |start| at >= start) && bounds.1.map_or(true, |end| at <= end)
}

/// Completed work of one employee over a period.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRow {
    pub user: User,
    pub tasks: usize,
    pub estimated_minutes: u64,
    pub actual_minutes: u64,
}

impl PerformanceRow {
    /// Mean worked minutes per completed task.
    pub fn average_minutes(&self) -> Option<f64> {
        if self.tasks == 0 {
            None
        } else {
            Some(self.actual_minutes as f64 / self.tasks as f64)
        }
    }
}

/// One row per employee, in roster order.
pub fn performance(users: &[User], tasks: &[Task], bounds: &Bounds) -> Vec<PerformanceRow> {
    users
        .iter()
        .filter(|u| u.role == Role::Employee)
        .map(|user| {
            let done: Vec<&Task> = tasks
                .iter()
                .filter(|t| t.assignee_id == user.id && t.status == TaskStatus::Completed)
                .filter(|t| within(bounds, t.report_time()))
                .collect();
            PerformanceRow {
                user: user.clone(),
                tasks: done.len(),
                estimated_minutes: done
                    .iter()
                    .map(|t| u64::from(t.estimated_duration.unwrap_or(0)))
                    .sum(),
                actual_minutes: done
                    .iter()
                    .map(|t| u64::from(t.work_duration.unwrap_or(0)))
                    .sum(),
            }
        })
        .collect()
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

/// Admins count every task, everybody else their own.
pub fn stats(tasks: &[Task], viewer: &User) -> Stats {
    tasks
        .iter()
        .filter(|t| viewer.role == Role::Admin || t.assignee_id == viewer.id)
        .fold(Stats::default(), |mut acc, t| {
            acc.total += 1;
            match t.status {
                TaskStatus::Pending => acc.pending += 1,
                TaskStatus::Completed => acc.completed += 1,
                _ => {}
            }
            acc
        })
}

/// A user with their assignment counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub user: User,
    pub assigned: usize,
    pub completed: usize,
}

pub fn roster(users: &[User], tasks: &[Task]) -> Vec<RosterRow> {
    users
        .iter()
        .map(|user| {
            let own = tasks.iter().filter(|t| t.assignee_id == user.id);
            let (assigned, completed) = own.fold((0, 0), |(all, done), t| {
                (all + 1, done + usize::from(t.status == TaskStatus::Completed))
            });
            RosterRow {
                user: user.clone(),
                assigned,
                completed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::{FixedOffset, LocalResult, Timelike};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn demo() -> (Vec<User>, Vec<Task>) {
        let store = Store::in_memory().unwrap();
        store.seed_if_needed(at(2024, 3, 5, 8)).unwrap();
        (store.users().unwrap(), store.tasks().unwrap())
    }

    #[test]
    fn daily_bounds_cover_the_whole_day() {
        // a Wednesday
        let now = at(2024, 1, 10, 15);
        let (start, end) = Period::Daily.bounds(&now);
        assert_eq!(start, Some(at(2024, 1, 10, 0)));
        assert_eq!(
            end,
            Some(at(2024, 1, 10, 23) + Duration::minutes(59) + Duration::milliseconds(59_999))
        );
    }

    #[test]
    fn weekly_starts_on_monday_even_on_sunday() {
        let wednesday = at(2024, 1, 10, 15);
        assert_eq!(Period::Weekly.bounds(&wednesday).0, Some(at(2024, 1, 8, 0)));
        let sunday = at(2024, 1, 14, 15);
        assert_eq!(Period::Weekly.bounds(&sunday).0, Some(at(2024, 1, 8, 0)));
        assert!(Period::Weekly.bounds(&sunday).1.unwrap() < at(2024, 1, 15, 0));
    }

    #[test]
    fn monthly_covers_the_calendar_month() {
        let (start, end) = Period::Monthly.bounds(&at(2024, 2, 10, 15));
        assert_eq!(start, Some(at(2024, 2, 1, 0)));
        assert!(end.unwrap() > at(2024, 2, 29, 23));
        assert!(end.unwrap() < at(2024, 3, 1, 0));

        let (_, end) = Period::Monthly.bounds(&at(2023, 12, 31, 23));
        assert!(end.unwrap() < at(2024, 1, 1, 0));
    }

    /// UTC+1 where the clocks jump from 00:00 to 01:00 on 2024-03-31.
    #[derive(Debug, Clone)]
    struct MidnightSwitch;

    fn plus_one() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    impl TimeZone for MidnightSwitch {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            MidnightSwitch
        }

        fn offset_from_local_date(&self, _: &NaiveDate) -> LocalResult<FixedOffset> {
            LocalResult::Single(plus_one())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            if local.date() == date(2024, 3, 31) && local.hour() == 0 {
                LocalResult::None
            } else {
                LocalResult::Single(plus_one())
            }
        }

        fn offset_from_utc_date(&self, _: &NaiveDate) -> FixedOffset {
            plus_one()
        }

        fn offset_from_utc_datetime(&self, _: &NaiveDateTime) -> FixedOffset {
            plus_one()
        }
    }

    #[test]
    fn days_without_a_midnight_start_at_the_first_valid_time() {
        let now = MidnightSwitch.from_utc_datetime(&at(2024, 3, 31, 12).naive_utc());
        let (start, end) = Period::Daily.bounds(&now);
        // 01:00 local
        assert_eq!(start, Some(at(2024, 3, 31, 0)));
        assert!(end.unwrap() > at(2024, 3, 31, 22));

        let (start, _) = Period::Monthly.bounds(&now);
        assert_eq!(start, Some(at(2024, 2, 29, 23)));

        let custom = Period::Custom {
            start: Some(date(2024, 3, 31)),
            end: None,
        };
        assert_eq!(custom.bounds(&now).0, Some(at(2024, 3, 31, 0)));
    }

    #[test]
    fn performance_sums_completed_work_per_employee() {
        let (users, tasks) = demo();
        let rows = performance(&users, &tasks, &Period::All.bounds(&at(2024, 3, 5, 8)));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user.id, "emp_1");
        assert_eq!(rows[0].tasks, 2);
        assert_eq!(rows[0].estimated_minutes, 480);
        assert_eq!(rows[0].actual_minutes, 510);
        assert_eq!(rows[0].average_minutes(), Some(255.0));

        assert_eq!(rows[1].user.id, "emp_2");
        assert_eq!(rows[1].tasks, 1);
        assert_eq!(rows[1].actual_minutes, 420);
    }

    #[test]
    fn performance_filters_by_completion_date() {
        let (users, tasks) = demo();
        let period = Period::Custom {
            start: Some(date(2024, 1, 11)),
            end: Some(date(2024, 1, 11)),
        };
        let rows = performance(&users, &tasks, &period.bounds(&at(2024, 3, 5, 8)));
        assert_eq!(rows[0].tasks, 1);
        assert_eq!(rows[0].actual_minutes, 240);
        assert_eq!(rows[1].tasks, 0);
        assert_eq!(rows[1].average_minutes(), None);

        let open_start = Period::Custom {
            start: None,
            end: Some(date(2024, 1, 10)),
        };
        let rows = performance(&users, &tasks, &open_start.bounds(&at(2024, 3, 5, 8)));
        assert_eq!(rows[0].tasks, 1);
    }

    #[test]
    fn stats_depend_on_the_viewer() {
        let (users, tasks) = demo();
        let admin = &users[0];
        let manager = &users[1];
        let ali = &users[2];

        assert_eq!(
            stats(&tasks, admin),
            Stats {
                total: 4,
                pending: 1,
                completed: 3
            }
        );
        assert_eq!(
            stats(&tasks, ali),
            Stats {
                total: 3,
                pending: 1,
                completed: 2
            }
        );
        assert_eq!(stats(&tasks, manager), Stats::default());
    }

    #[test]
    fn roster_counts_assignments() {
        let (users, tasks) = demo();
        let rows = roster(&users, &tasks);
        assert_eq!(rows.len(), 4);
        assert_eq!((rows[0].assigned, rows[0].completed), (0, 0));
        assert_eq!((rows[2].assigned, rows[2].completed), (3, 2));
        assert_eq!((rows[3].assigned, rows[3].completed), (1, 1));
    }

    #[test]
    fn period_names() {
        assert_eq!("Weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert!("yearly".parse::<Period>().is_err());
    }
}
