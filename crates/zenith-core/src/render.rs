use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use unicode_width::UnicodeWidthStr;

use crate::advisor::Suggestions;
use crate::checklist;
use crate::config::Config;
use crate::projection::{CalendarMonth, StyleClass, progress_view};
use crate::task::{Status, Task};

const WEEKDAY_LABELS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const CALENDAR_CELL_TITLES: usize = 2;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// List view.
    #[tracing::instrument(skip(self, out, tasks))]
    pub fn write_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Status".to_string(),
            "Priority".to_string(),
            "Due".to_string(),
            "Progress".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let due = task.due_date.to_string();
            let due = if task.due_date < today && task.status != Status::Done {
                self.paint(&due, "critical")
            } else {
                due
            };
            let progress = progress_view(task)
                .map(|p| format!("{}/{} {}%", p.completed, p.total, p.percent()))
                .unwrap_or_default();

            rows.push(vec![
                self.paint(short_id(&task.id), "accent"),
                task.title.clone(),
                self.paint(task.status.label(), task.status.style_class()),
                self.paint(task.priority.label(), task.priority.style_class()),
                due,
                progress,
            ]);
        }

        write_table(out, headers, rows)
    }

    /// Board view: one column per status.
    #[tracing::instrument(skip(self, out, board))]
    pub fn write_board<W: Write>(
        &self,
        out: &mut W,
        board: &BTreeMap<Status, Vec<&Task>>,
    ) -> anyhow::Result<()> {
        for (status, tasks) in board {
            let heading = format!("{} ({})", status.label().to_uppercase(), tasks.len());
            writeln!(out, "{}", self.paint(&heading, status.style_class()))?;
            if tasks.is_empty() {
                writeln!(out, "  -")?;
            }
            for task in tasks {
                writeln!(
                    out,
                    "  {} {} [{}] due {}",
                    self.paint(short_id(&task.id), "accent"),
                    task.title,
                    self.paint(task.priority.label(), task.priority.style_class()),
                    task.due_date
                )?;
                let stripped = checklist::strip_markers(&task.description);
                let summary = first_line(&stripped);
                if !summary.is_empty() {
                    writeln!(out, "      {summary}")?;
                }
                if let Some(progress) = progress_view(task) {
                    writeln!(
                        out,
                        "      {} {}/{}",
                        progress_bar(progress.percent()),
                        progress.completed,
                        progress.total
                    )?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Calendar view: Monday-first month grid with task titles per day.
    #[tracing::instrument(skip(self, out, month))]
    pub fn write_calendar<W: Write>(
        &self,
        out: &mut W,
        month: &CalendarMonth<'_>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{:04}-{:02}", month.year, month.month)?;

        let headers = WEEKDAY_LABELS.iter().map(|d| d.to_string()).collect();
        let mut rows = Vec::new();
        for week in month.weeks() {
            let height = week
                .iter()
                .flatten()
                .map(|day| day.tasks.len().min(CALENDAR_CELL_TITLES + 1))
                .max()
                .unwrap_or(0)
                + 1;

            for line in 0..height {
                let row = week
                    .iter()
                    .map(|cell| match cell {
                        None => String::new(),
                        Some(day) if line == 0 => {
                            let label = day.date.format("%d").to_string();
                            if day.date == today {
                                self.paint(&label, "accent")
                            } else {
                                label
                            }
                        }
                        Some(day) => calendar_cell_line(&day.tasks, line - 1),
                    })
                    .collect();
                rows.push(row);
            }
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn write_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(
            out,
            "status    {}",
            self.paint(task.status.label(), task.status.style_class())
        )?;
        writeln!(
            out,
            "priority  {}",
            self.paint(task.priority.label(), task.priority.style_class())
        )?;
        writeln!(out, "due       {}", task.due_date)?;
        writeln!(out, "created   {}", format_created(task.created_at))?;
        if let Some(tokens) = task.tokens_used {
            writeln!(out, "ai tokens {tokens}")?;
        }

        let items = checklist::parse(&task.description);
        if let Some(progress) = progress_view(task) {
            writeln!(
                out,
                "progress  {} {}/{} ({}%)",
                progress_bar(progress.percent()),
                progress.completed,
                progress.total,
                progress.percent()
            )?;
        }
        if !task.description.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", task.description)?;
        }
        if !items.is_empty() {
            writeln!(out)?;
            for (idx, item) in items.iter().enumerate() {
                let mark = if item.done { "x" } else { " " };
                writeln!(out, "  {idx:>2}. [{mark}] {}", item.text)?;
            }
        }
        Ok(())
    }

    pub fn write_suggestions<W: Write>(
        &self,
        out: &mut W,
        suggestions: &Suggestions,
    ) -> anyhow::Result<()> {
        if suggestions.items.is_empty() {
            writeln!(out, "No suggestions returned.")?;
        }
        for item in &suggestions.items {
            writeln!(out, "  * {item}")?;
        }
        writeln!(out, "({} tokens)", suggestions.tokens)?;
        Ok(())
    }

    fn paint(&self, text: &str, class: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        let code = match class {
            "critical" => "31",
            "warning" => "33",
            "success" => "32",
            "info" => "34",
            "accent" => "36",
            "muted" => "90",
            _ => return text.to_string(),
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent) / 10;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

fn calendar_cell_line(tasks: &[&Task], line: usize) -> String {
    if line < CALENDAR_CELL_TITLES {
        return tasks.get(line).map(|task| truncate(&task.title, 12)).unwrap_or_default();
    }
    if line == CALENDAR_CELL_TITLES && tasks.len() > CALENDAR_CELL_TITLES {
        return format!("+{} more", tasks.len() - CALENDAR_CELL_TITLES);
    }
    String::new()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_created(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
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

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::projection::group_by_status;

    fn sample() -> Vec<Task> {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 9, 10, 0, 0)
            .single()
            .expect("valid now");
        let mut a = Task::new("aaaaaaaa1111".to_string(), "Write report".to_string(), now);
        a.description = "Quarterly\n- [x] draft\n- [ ] send".to_string();
        let mut b = Task::new("bbbbbbbb2222".to_string(), "Отчёт".to_string(), now);
        b.status = Status::Done;
        vec![a, b]
    }

    #[test]
    fn table_aligns_wide_text() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();
        let mut out = Vec::new();
        Renderer::plain()
            .write_task_table(&mut out, &refs, tasks[0].due_date)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("ID "));
        assert!(text.contains("aaaaaaaa Write report"));
        assert!(text.contains("1/2 50%"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn board_lists_every_column() {
        let tasks = sample();
        let board = group_by_status(&tasks);
        let mut out = Vec::new();
        Renderer::plain().write_board(&mut out, &board).expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("TO-DO (1)"));
        assert!(text.contains("REVIEW (0)"));
        assert!(text.contains("DONE (1)"));
        assert!(text.contains("      Quarterly"));
        assert!(text.contains("[#####.....] 1/2"));
    }

    #[test]
    fn calendar_marks_days_with_tasks() {
        let tasks = sample();
        let month = CalendarMonth::build(2026, 3, &tasks).expect("month");
        let mut out = Vec::new();
        Renderer::plain()
            .write_calendar(&mut out, &month, tasks[0].due_date)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("2026-03\n"));
        assert!(text.contains("Write report"));
        assert!(text.contains("31"));
    }

    #[test]
    fn info_numbers_checklist_items() {
        let tasks = sample();
        let mut out = Vec::new();
        Renderer::plain().write_task_info(&mut out, &tasks[0]).expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("progress  [#####.....] 1/2 (50%)"));
        assert!(text.contains("   0. [x] draft"));
        assert!(text.contains("   1. [ ] send"));
    }

    #[test]
    fn strip_ansi_removes_escape_codes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
