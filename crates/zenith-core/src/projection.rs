use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::checklist::{self, Progress};
use crate::task::{Priority, Status, Task};

/// Presentation category for an enum value.
pub trait StyleClass {
    fn style_class(&self) -> &'static str;
}

impl StyleClass for Status {
    fn style_class(&self) -> &'static str {
        match self {
            Status::Todo => "neutral",
            Status::InProgress => "info",
            Status::Review => "warning",
            Status::Done => "success",
        }
    }
}

impl StyleClass for Priority {
    fn style_class(&self) -> &'static str {
        match self {
            Priority::Low => "muted",
            Priority::Normal => "info",
            Priority::High => "warning",
            Priority::Urgent => "critical",
        }
    }
}

/// One bucket per status, in enumeration order, empty buckets included.
pub fn group_by_status<'a, I>(tasks: I) -> BTreeMap<Status, Vec<&'a Task>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut board: BTreeMap<Status, Vec<&'a Task>> =
        Status::ALL.iter().map(|status| (*status, Vec::new())).collect();
    for task in tasks {
        board.entry(task.status).or_default().push(task);
    }
    board
}

pub fn group_by_due_date<'a, I>(tasks: I, date: NaiveDate) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().filter(|task| task.due_date == date).collect()
}

pub fn progress_view(task: &Task) -> Option<Progress> {
    checklist::progress(&task.description)
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<&'a Task>,
}

/// Monday-first month grid for the calendar view.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth<'a> {
    pub year: i32,
    pub month: u32,
    /// Empty cells before the first day of the month.
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay<'a>>,
}

impl<'a> CalendarMonth<'a> {
    /// Returns `None` for an invalid year/month pair.
    pub fn build(year: i32, month: u32, tasks: &'a [Task]) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let leading_blanks = first.weekday().num_days_from_monday();

        let days = first
            .iter_days()
            .take_while(|date| date.month() == month)
            .map(|date| CalendarDay {
                date,
                tasks: group_by_due_date(tasks, date),
            })
            .collect();

        Some(Self {
            year,
            month,
            leading_blanks,
            days,
        })
    }

    /// Rows of seven cells; `None` marks a blank cell.
    pub fn weeks(&self) -> Vec<Vec<Option<&CalendarDay<'a>>>> {
        let mut cells: Vec<Option<&CalendarDay<'a>>> = (0..self.leading_blanks).map(|_| None).collect();
        cells.extend(self.days.iter().map(Some));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }
        cells.chunks(7).map(|week| week.to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn task(id: &str, status: Status, due: NaiveDate) -> Task {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let mut task = Task::new(id.to_string(), id.to_string(), now);
        task.status = status;
        task.due_date = due;
        task
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn board_has_every_status_in_order() {
        let tasks = vec![
            task("b", Status::Done, date(2026, 3, 2)),
            task("a", Status::Todo, date(2026, 3, 2)),
            task("c", Status::Done, date(2026, 3, 3)),
        ];
        let board = group_by_status(&tasks);

        let statuses: Vec<Status> = board.keys().copied().collect();
        assert_eq!(statuses, Status::ALL.to_vec());
        assert!(board[&Status::Review].is_empty());
        let done: Vec<&str> = board[&Status::Done].iter().map(|t| t.id.as_str()).collect();
        assert_eq!(done, vec!["b", "c"]);
    }

    #[test]
    fn groups_by_exact_due_date() {
        let tasks = vec![
            task("a", Status::Todo, date(2026, 3, 2)),
            task("b", Status::Todo, date(2026, 3, 3)),
        ];
        let due = group_by_due_date(&tasks, date(2026, 3, 3));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "b");
    }

    #[test]
    fn style_classes_cover_extremes() {
        assert_eq!(Priority::Urgent.style_class(), "critical");
        assert_eq!(Status::Done.style_class(), "success");
        assert_eq!(Priority::Low.style_class(), "muted");
    }

    #[test]
    fn progress_view_reads_description() {
        let mut t = task("a", Status::Todo, date(2026, 3, 2));
        assert!(progress_view(&t).is_none());
        t.description = "- [x] one\n- [ ] two".to_string();
        assert_eq!(progress_view(&t).map(|p| p.percent()), Some(50));
    }

    #[test]
    fn month_grid_starts_on_monday() {
        // March 2026 starts on a Sunday.
        let tasks = vec![task("a", Status::Todo, date(2026, 3, 15))];
        let month = CalendarMonth::build(2026, 3, &tasks).expect("valid month");
        assert_eq!(month.leading_blanks, 6);
        assert_eq!(month.days.len(), 31);
        assert_eq!(month.days[14].tasks.len(), 1);

        let weeks = month.weeks();
        assert_eq!(weeks.len(), 6);
        assert!(weeks.iter().all(|week| week.len() == 7));
        assert!(weeks[0][5].is_none());
        assert_eq!(weeks[0][6].map(|day| day.date), Some(date(2026, 3, 1)));

        assert!(CalendarMonth::build(2026, 13, &tasks).is_none());
    }
}
