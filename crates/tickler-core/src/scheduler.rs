//! Reminder dispatch.
//!
//! One tokio timer per qualifying task, armed from a snapshot of the
//! collection. The handle owns every timer it armed; rearming after any
//! collection change means cancelling the old handle and arming a fresh
//! snapshot. There is no incremental add/remove API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::task::Task;

pub const REMINDER_TITLE: &str = "Reminder";

/// Longest single-shot delay the legacy platform's timers accept
/// (2^31 - 1 ms, about 24.8 days). Longer delays are clamped, so a
/// far-future reminder fires early at the cap rather than being rejected.
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(i32::MAX as u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Delivery is the caller's concern; the scheduler only promises the
/// callback runs at or shortly after the due moment, at most once per
/// armed task.
pub type NotifyFn = Arc<dyn Fn(Notification) + Send + Sync>;

/// Owner of the timers armed from one snapshot.
///
/// Dropping the handle cancels anything still pending, so a stale handle
/// can never leak timers past a rearm.
pub struct ReminderHandle {
    timers: Vec<JoinHandle<()>>,
}

impl ReminderHandle {
    /// Number of timers armed from the snapshot.
    pub fn armed(&self) -> usize {
        self.timers.len()
    }

    /// Timers that have neither fired nor been cancelled yet.
    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancel every still-pending timer. Already-fired timers are
    /// unaffected; calling this twice is harmless.
    pub fn cancel_all(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }

    /// Wait until every armed timer has fired. Cancelled and panicked
    /// timers count as settled.
    pub async fn wait(mut self) {
        for timer in self.timers.drain(..) {
            // a JoinError here is a cancelled timer or a panicking
            // callback; neither may stop the rest
            let _ = timer.await;
        }
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Arm one timer per qualifying task: a reminder strictly in the future
/// on an incomplete task. Past-due, completed, and draft tasks are
/// skipped entirely; they never fire retroactively.
pub fn arm(tasks: &[Task], now: DateTime<Utc>, on_fire: NotifyFn) -> ReminderHandle {
    let mut timers = Vec::new();

    for task in tasks {
        let Some(remind_at) = task.remind_at else {
            continue;
        };
        if task.completed || remind_at <= now {
            continue;
        }

        let delay = delay_until(remind_at, now);
        debug!(id = %task.id, delay_ms = (delay.as_millis() as u64), "arming reminder");

        let on_fire = Arc::clone(&on_fire);
        let body = task.name.clone();
        timers.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // each timer runs in its own task, so a panicking callback
            // cannot stop the other timers from firing
            on_fire(Notification {
                title: REMINDER_TITLE.to_string(),
                body,
            });
        }));
    }

    info!(armed = timers.len(), of = tasks.len(), "armed reminders");
    ReminderHandle { timers }
}

fn delay_until(remind_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let millis = (remind_at - now).num_milliseconds().max(0) as u64;
    let delay = Duration::from_millis(millis);
    if delay > MAX_TIMER_DELAY {
        warn!(
            due = %remind_at,
            "reminder beyond the timer range; clamped and will fire early"
        );
        MAX_TIMER_DELAY
    } else {
        delay
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::{MAX_TIMER_DELAY, Notification, arm};
    use crate::task::Task;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn task_at(name: &str, offset: chrono::Duration, completed: bool) -> Task {
        let mut task = Task::new(name.to_string(), now());
        task.remind_at = Some(now() + offset);
        task.completed = completed;
        task
    }

    async fn settle() {
        // let woken timer tasks run on the paused current-thread runtime
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_future_incomplete_scheduled_tasks_arm() {
        let tasks = vec![
            task_at("future", chrono::Duration::hours(1), false),
            task_at("past", chrono::Duration::hours(-1), false),
            task_at("done", chrono::Duration::hours(1), true),
            Task::new("draft".to_string(), now()),
        ];

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let handle = arm(
            &tasks,
            now(),
            Arc::new(move |n: Notification| {
                sink.lock().expect("fired lock").push(n.body);
            }),
        );

        assert_eq!(handle.armed(), 1);

        // poll the spawned timers so their sleeps register before the
        // paused clock jumps; otherwise the deadline lands past `now`
        settle().await;
        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        settle().await;

        let fired = fired.lock().expect("fired lock").clone();
        assert_eq!(fired, vec!["future".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_fire() {
        let tasks = vec![
            task_at("one", chrono::Duration::minutes(5), false),
            task_at("two", chrono::Duration::minutes(10), false),
        ];

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let mut handle = arm(
            &tasks,
            now(),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(handle.armed(), 2);
        handle.cancel_all();

        tokio::time::advance(Duration::from_secs(3600)).await;
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(handle.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels_pending_timers() {
        let tasks = vec![task_at("one", chrono::Duration::minutes(5), false)];

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = arm(
            &tasks,
            now(),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drop(handle);

        tokio::time::advance(Duration::from_secs(3600)).await;
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_does_not_stop_other_timers() {
        let tasks = vec![
            task_at("boom", chrono::Duration::minutes(1), false),
            task_at("fine", chrono::Duration::minutes(2), false),
        ];

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let handle = arm(
            &tasks,
            now(),
            Arc::new(move |n: Notification| {
                if n.body == "boom" {
                    panic!("notifier exploded");
                }
                sink.lock().expect("fired lock").push(n.body);
            }),
        );

        tokio::time::advance(Duration::from_secs(180)).await;
        handle.wait().await;

        let fired = fired.lock().expect("fired lock").clone();
        assert_eq!(fired, vec!["fine".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn far_future_reminder_clamps_and_fires_at_the_cap() {
        let tasks = vec![task_at("far", chrono::Duration::days(100), false)];

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = arm(
            &tasks,
            now(),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(handle.armed(), 1);

        // poll the spawned timer so its sleep registers before the
        // paused clock jumps; otherwise the deadline lands past `now`
        settle().await;
        tokio::time::advance(MAX_TIMER_DELAY + Duration::from_secs(1)).await;
        settle().await;

        // fires early at the cap, well before the true due moment
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_reflects_a_cleared_reminder() {
        let mut task = task_at("soon", chrono::Duration::minutes(5), false);

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let on_fire: super::NotifyFn = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut handle = arm(std::slice::from_ref(&task), now(), Arc::clone(&on_fire));
        assert_eq!(handle.armed(), 1);

        // edit clears the schedule; caller cancels and rearms the snapshot
        task.remind_at = None;
        task.remind_has_time = None;
        handle.cancel_all();
        let handle = arm(std::slice::from_ref(&task), now(), on_fire);
        assert_eq!(handle.armed(), 0);

        tokio::time::advance(Duration::from_secs(3600)).await;
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
