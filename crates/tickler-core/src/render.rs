use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime;
use crate::group::MonthGroup;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color.unwrap_or(true),
        }
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&mut self, tasks: &[Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "When".to_string(),
            "Name".to_string(),
            "Note".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&short_id(task), "33");
            let done = if task.completed { "x" } else { "" }.to_string();

            let when = when_label(task);
            let when = match task.remind_at {
                Some(due) if due < now && !task.completed => self.paint(&when, "31"),
                _ => when,
            };

            rows.push(vec![
                id,
                done,
                when,
                task.name.clone(),
                task.note.clone().unwrap_or_default(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// The dashboard: month sections, day cards, drafts trailing.
    #[tracing::instrument(skip(self, view, drafts, now))]
    pub fn print_schedule(
        &mut self,
        view: &[MonthGroup],
        drafts: &[Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if view.is_empty() && drafts.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        for month in view {
            writeln!(out, "{}", self.paint(&month.month, "1"))?;
            for day in &month.days {
                let overdue = day
                    .tasks
                    .iter()
                    .any(|t| !t.completed && t.remind_at.is_some_and(|due| due < now));
                let date = if overdue {
                    self.paint(&day.date, "31")
                } else {
                    day.date.clone()
                };
                writeln!(out, "  {date}")?;

                for task in &day.tasks {
                    writeln!(out, "    {}", task_line(task))?;
                }
            }
            writeln!(out)?;
        }

        if !drafts.is_empty() {
            writeln!(out, "{}", self.paint("Drafts", "1"))?;
            for task in drafts {
                writeln!(out, "    {}", task_line(task))?;
            }
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(task: &Task) -> String {
    task.id.simple().to_string()[..8].to_string()
}

fn when_label(task: &Task) -> String {
    let Some(ts) = task.remind_at else {
        return String::new();
    };
    let (date, time) = datetime::canonical_to_local(ts);
    if datetime::has_explicit_time(ts, task.remind_has_time) {
        format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M"))
    } else {
        date.format("%Y-%m-%d").to_string()
    }
}

fn task_line(task: &Task) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let time = match task.remind_at {
        Some(ts) if datetime::has_explicit_time(ts, task.remind_has_time) => {
            let (_, time) = datetime::canonical_to_local(ts);
            time.format("%H:%M").to_string()
        }
        Some(_) => "all day".to_string(),
        None => String::new(),
    };

    let mut line = format!("{check} {:<7} {} ({})", time, task.name, short_id(task));
    if let Some(note) = &task.note {
        line.push_str(&format!("  # {note}"));
    }
    line
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
