use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::cli::Command;
use crate::compare;
use crate::config::Config;
use crate::group;
use crate::render::{Renderer, short_id};
use crate::scheduler::{self, Notification, NotifyFn};
use crate::store::{NewTask, TaskCache, TaskPatch, TaskStore};

#[instrument(skip(cache, _cfg, renderer, command))]
pub fn dispatch(
    cache: &TaskCache,
    _cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut store = TaskStore::new(cache.load());
    debug!(count = store.len(), ?command, "dispatching command");

    match command {
        Command::Add {
            name,
            remind_at,
            note,
        } => cmd_add(&mut store, cache, name, remind_at, note, now),
        Command::List => cmd_list(&store, renderer, now),
        Command::Schedule => cmd_schedule(&store, renderer, now),
        Command::Done { id } => cmd_set_completed(&mut store, cache, &id, true, now),
        Command::Reopen { id } => cmd_set_completed(&mut store, cache, &id, false, now),
        Command::Edit {
            id,
            name,
            remind_at,
            clear_at,
            note,
            clear_note,
        } => {
            let patch = TaskPatch {
                name,
                remind_at: if clear_at {
                    Some(None)
                } else {
                    remind_at.map(Some)
                },
                remind_has_time: None,
                note: if clear_note { Some(None) } else { note.map(Some) },
            };
            cmd_edit(&mut store, cache, &id, patch, now)
        }
        Command::Delete { id } => cmd_delete(&mut store, cache, &id),
        Command::Watch => cmd_watch(&store, now),
    }
}

/// Rewrite the slot after a successful mutation. A write failure is
/// logged and swallowed; the in-memory change already happened and the
/// next successful save catches up.
fn persist(cache: &TaskCache, store: &TaskStore) {
    if let Err(err) = cache.save(store.records()) {
        error!(error = %err, "failed saving task cache");
    }
}

/// Accept a full uuid or a unique prefix of its simple form.
fn resolve_id(store: &TaskStore, raw: &str) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }

    let needle = raw.to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("empty task id"));
    }

    let matches: Vec<Uuid> = store
        .records()
        .iter()
        .map(|record| record.id)
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("no task matching id {raw}")),
        _ => Err(anyhow!("ambiguous task id prefix: {raw}")),
    }
}

#[instrument(skip(store, cache, name, remind_at, note, now))]
fn cmd_add(
    store: &mut TaskStore,
    cache: &TaskCache,
    name: String,
    remind_at: Option<String>,
    note: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let task = store.create(
        NewTask {
            name,
            remind_at,
            note,
        },
        now,
    )?;
    persist(cache, store);

    println!("Created task {}.", short_id(&task));
    Ok(())
}

#[instrument(skip(store, renderer, now))]
fn cmd_list(store: &TaskStore, renderer: &mut Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command list");

    let mut tasks = store.snapshot();
    compare::sort_tasks(&mut tasks);
    renderer.print_task_table(&tasks, now)
}

#[instrument(skip(store, renderer, now))]
fn cmd_schedule(
    store: &TaskStore,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command schedule");

    let snapshot = store.snapshot();
    let view = group::schedule_view(&snapshot);
    let drafts = group::draft_tasks(&snapshot);
    renderer.print_schedule(&view, &drafts, now)
}

#[instrument(skip(store, cache, now))]
fn cmd_set_completed(
    store: &mut TaskStore,
    cache: &TaskCache,
    raw_id: &str,
    completed: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!(completed, "command done/reopen");

    let id = resolve_id(store, raw_id)?;
    let task = store.set_completed(id, completed, now)?;
    persist(cache, store);

    if completed {
        println!("Completed task {}.", short_id(&task));
    } else {
        println!("Reopened task {}.", short_id(&task));
    }
    Ok(())
}

#[instrument(skip(store, cache, patch, now))]
fn cmd_edit(
    store: &mut TaskStore,
    cache: &TaskCache,
    raw_id: &str,
    patch: TaskPatch,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command edit");

    let id = resolve_id(store, raw_id)?;
    let task = store.edit(id, patch, now)?;
    persist(cache, store);

    println!("Edited task {}.", short_id(&task));
    Ok(())
}

#[instrument(skip(store, cache))]
fn cmd_delete(store: &mut TaskStore, cache: &TaskCache, raw_id: &str) -> anyhow::Result<()> {
    info!("command delete");

    let id = resolve_id(store, raw_id)?;
    if !store.delete(id) {
        return Err(anyhow!("no task with id {id}"));
    }
    persist(cache, store);

    println!("Deleted task.");
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_watch(store: &TaskStore, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command watch");

    let snapshot = store.snapshot();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build reminder runtime")?;

    runtime.block_on(async move {
        let on_fire: NotifyFn = Arc::new(|notification: Notification| {
            println!("{}: {}", notification.title, notification.body);
        });

        let handle = scheduler::arm(&snapshot, now, on_fire);
        let armed = handle.armed();
        if armed == 0 {
            println!("No upcoming reminders.");
            return Ok(());
        }

        println!("Waiting on {armed} reminder(s); ctrl-c to stop.");
        tokio::select! {
            _ = handle.wait() => {
                println!("All reminders fired.");
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
            }
        }
        Ok(())
    })
}
