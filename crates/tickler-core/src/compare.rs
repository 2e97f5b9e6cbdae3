use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::datetime;
use crate::task::Task;

struct ScheduleKey {
    day: NaiveDate,
    has_time: bool,
    stamp: DateTime<Utc>,
}

fn schedule_key(tz: Tz, task: &Task) -> Option<ScheduleKey> {
    let stamp = task.remind_at?;
    let (day, _) = datetime::canonical_to_local_in(tz, stamp);
    Some(ScheduleKey {
        day,
        has_time: datetime::has_explicit_time_in(tz, stamp, task.remind_has_time),
        stamp,
    })
}

/// Canonical three-way order over tasks:
///
/// 1. drafts (no schedule) after all scheduled tasks;
/// 2. among scheduled, by local calendar day ascending;
/// 3. on the same day, date-only entries before time-bearing ones;
/// 4. among time-bearing entries, full timestamp ascending.
///
/// Everything else is a tie, so a stable sort keeps input order and
/// repeated renders of unchanged data come out identical.
pub fn compare_tasks_in(tz: Tz, a: &Task, b: &Task) -> Ordering {
    match (schedule_key(tz, a), schedule_key(tz, b)) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
        (Some(ka), Some(kb)) => ka
            .day
            .cmp(&kb.day)
            .then_with(|| ka.has_time.cmp(&kb.has_time))
            .then_with(|| {
                if ka.has_time && kb.has_time {
                    ka.stamp.cmp(&kb.stamp)
                } else {
                    Ordering::Equal
                }
            }),
    }
}

pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    compare_tasks_in(datetime::local_timezone(), a, b)
}

/// Stable in-place sort under [`compare_tasks_in`].
pub fn sort_tasks_in(tz: Tz, tasks: &mut [Task]) {
    tasks.sort_by(|a, b| compare_tasks_in(tz, a, b));
}

pub fn sort_tasks(tasks: &mut [Task]) {
    sort_tasks_in(datetime::local_timezone(), tasks);
}
