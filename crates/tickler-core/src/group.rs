use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::compare;
use crate::datetime;
use crate::task::Task;

/// One day's worth of scheduled tasks, comparator-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub date: String,
    pub tasks: Vec<Task>,
}

/// One month section of the schedule view, days ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGroup {
    pub month: String,
    pub days: Vec<DayGroup>,
}

fn partition<F>(tasks: &[Task], key_of: F) -> Vec<(String, Vec<Task>)>
where
    F: Fn(DateTime<Utc>) -> String,
{
    let mut buckets: BTreeMap<String, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        // drafts and unparseable reminders belong to the draft section,
        // not the calendar
        let Some(ts) = task.remind_at else {
            continue;
        };
        buckets.entry(key_of(ts)).or_default().push(task.clone());
    }
    buckets.into_iter().collect()
}

/// Partition scheduled tasks into `YYYY-MM` buckets, keys ascending.
pub fn group_by_month_in(tz: Tz, tasks: &[Task]) -> Vec<(String, Vec<Task>)> {
    partition(tasks, |ts| datetime::local_month_key_in(tz, ts))
}

pub fn group_by_month(tasks: &[Task]) -> Vec<(String, Vec<Task>)> {
    group_by_month_in(datetime::local_timezone(), tasks)
}

/// Partition scheduled tasks into `YYYY-MM-DD` buckets, keys ascending.
pub fn group_by_date_in(tz: Tz, tasks: &[Task]) -> Vec<(String, Vec<Task>)> {
    partition(tasks, |ts| datetime::local_date_key_in(tz, ts))
}

pub fn group_by_date(tasks: &[Task]) -> Vec<(String, Vec<Task>)> {
    group_by_date_in(datetime::local_timezone(), tasks)
}

/// The canonical calendar pipeline: month partition, then a date
/// partition of each month bucket, then a comparator sort within each
/// day.
pub fn schedule_view_in(tz: Tz, tasks: &[Task]) -> Vec<MonthGroup> {
    group_by_month_in(tz, tasks)
        .into_iter()
        .map(|(month, month_tasks)| {
            let days = group_by_date_in(tz, &month_tasks)
                .into_iter()
                .map(|(date, mut day_tasks)| {
                    compare::sort_tasks_in(tz, &mut day_tasks);
                    DayGroup {
                        date,
                        tasks: day_tasks,
                    }
                })
                .collect();
            MonthGroup { month, days }
        })
        .collect()
}

pub fn schedule_view(tasks: &[Task]) -> Vec<MonthGroup> {
    schedule_view_in(datetime::local_timezone(), tasks)
}

/// The always-visible draft section: tasks with no schedule, input order
/// preserved.
pub fn draft_tasks(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.remind_at.is_none())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chrono_tz::Tz;
    use uuid::Uuid;

    use super::{draft_tasks, group_by_date_in, group_by_month_in, schedule_view_in};
    use crate::task::Task;

    const TOKYO: Tz = chrono_tz::Asia::Tokyo;

    fn scheduled(name: &str, ts: &str) -> Task {
        let mut task = Task::new(name.to_string(), Utc::now());
        task.remind_at = Some(
            crate::datetime::parse_canonical(ts).expect("valid test timestamp"),
        );
        task
    }

    #[test]
    fn pay_rent_lands_in_its_month_and_day() {
        let tasks = vec![scheduled("Pay rent", "2025-01-05T09:00:00Z")];

        let months = group_by_month_in(TOKYO, &tasks);
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].0, "2025-01");
        assert_eq!(months[0].1.len(), 1);

        let days = group_by_date_in(TOKYO, &months[0].1);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].0, "2025-01-05");
        assert_eq!(days[0].1[0].name, "Pay rent");
    }

    #[test]
    fn keys_come_out_ascending() {
        let tasks = vec![
            scheduled("december", "2025-12-01T09:00:00Z"),
            scheduled("january", "2025-01-05T09:00:00Z"),
            scheduled("june", "2025-06-15T09:00:00Z"),
        ];

        let keys: Vec<String> = group_by_month_in(TOKYO, &tasks)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["2025-01", "2025-06", "2025-12"]);
    }

    #[test]
    fn every_scheduled_task_appears_exactly_once() {
        let tasks = vec![
            scheduled("a", "2025-01-05T09:00:00Z"),
            scheduled("b", "2025-01-05T10:00:00Z"),
            scheduled("c", "2025-01-20T10:00:00Z"),
            scheduled("d", "2025-03-01T10:00:00Z"),
            Task::new("draft".to_string(), Utc::now()),
        ];

        let months = group_by_month_in(TOKYO, &tasks);
        let by_month: Vec<Uuid> = months
            .iter()
            .flat_map(|(_, bucket)| bucket.iter().map(|t| t.id))
            .collect();
        let days = group_by_date_in(TOKYO, &tasks);
        let by_date: Vec<Uuid> = days
            .iter()
            .flat_map(|(_, bucket)| bucket.iter().map(|t| t.id))
            .collect();

        assert_eq!(by_month.len(), 4);
        assert_eq!(by_date.len(), 4);
        for task in tasks.iter().filter(|t| t.remind_at.is_some()) {
            assert_eq!(by_month.iter().filter(|id| **id == task.id).count(), 1);
            assert_eq!(by_date.iter().filter(|id| **id == task.id).count(), 1);
        }
    }

    #[test]
    fn view_nests_days_under_months_sorted() {
        let tasks = vec![
            scheduled("late", "2025-01-05T09:00:00Z"),
            scheduled("early", "2025-01-05T01:00:00Z"),
            scheduled("next month", "2025-02-10T01:00:00Z"),
        ];

        let view = schedule_view_in(TOKYO, &tasks);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].month, "2025-01");
        assert_eq!(view[0].days.len(), 1);
        assert_eq!(view[0].days[0].date, "2025-01-05");
        let names: Vec<&str> = view[0].days[0]
            .tasks
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(view[1].month, "2025-02");
    }

    #[test]
    fn drafts_stay_out_of_the_calendar() {
        let tasks = vec![
            Task::new("draft".to_string(), Utc::now()),
            scheduled("real", "2025-01-05T09:00:00Z"),
        ];

        assert_eq!(group_by_month_in(TOKYO, &tasks)[0].1.len(), 1);
        let drafts = draft_tasks(&tasks);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "draft");
    }
}
