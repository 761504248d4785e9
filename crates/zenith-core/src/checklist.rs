//! Checklist lines embedded in a task description.
//!
//! A checklist line is any line whose left-trimmed form starts with
//! `- [ ] ` (pending) or `- [x] ` (done). Everything else in the description
//! is free text and passes through every operation here untouched.

use serde::Serialize;

use crate::task::Status;

const PENDING_MARKER: &str = "- [ ] ";
const DONE_MARKER: &str = "- [x] ";
const MARKER_LEN: usize = PENDING_MARKER.len();

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub done: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 * 100.0) / self.total as f64).round() as u8
    }
}

/// Whether toggling an item rewrites the task status from its checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    Manual,
    #[default]
    DeriveFromChecklist,
}

impl StatusPolicy {
    pub fn from_flag(auto: bool) -> Self {
        if auto {
            StatusPolicy::DeriveFromChecklist
        } else {
            StatusPolicy::Manual
        }
    }

    pub fn apply(self, description: &str, current: Status) -> Status {
        match self {
            StatusPolicy::Manual => current,
            StatusPolicy::DeriveFromChecklist => derive_status(description, current),
        }
    }
}

/// Byte offset of the marker and its done flag, if `line` is a checklist line.
fn marker_of(line: &str) -> Option<(usize, bool)> {
    let trimmed = line.trim_start();
    let offset = line.len() - trimmed.len();
    if trimmed.starts_with(PENDING_MARKER) {
        Some((offset, false))
    } else if trimmed.starts_with(DONE_MARKER) {
        Some((offset, true))
    } else {
        None
    }
}

pub fn parse(description: &str) -> Vec<ChecklistItem> {
    description
        .split('\n')
        .filter_map(|line| {
            let (offset, done) = marker_of(line)?;
            let rest = &line[offset + MARKER_LEN..];
            let text = rest.strip_suffix('\r').unwrap_or(rest);
            Some(ChecklistItem {
                done,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Flips the marker of the `index`-th checklist line. An out of range index
/// returns the description unchanged.
pub fn toggle(description: &str, index: usize) -> String {
    let mut seen = 0usize;
    let lines: Vec<String> = description
        .split('\n')
        .map(|line| {
            let Some((offset, done)) = marker_of(line) else {
                return line.to_string();
            };
            let current = seen;
            seen += 1;
            if current != index {
                return line.to_string();
            }
            let marker = if done { PENDING_MARKER } else { DONE_MARKER };
            format!("{}{}{}", &line[..offset], marker, &line[offset + MARKER_LEN..])
        })
        .collect();

    lines.join("\n")
}

pub fn progress(description: &str) -> Option<Progress> {
    let items = parse(description);
    if items.is_empty() {
        return None;
    }
    Some(Progress {
        completed: items.iter().filter(|item| item.done).count(),
        total: items.len(),
    })
}

/// Plain-text rendition: every leading checklist marker is removed, nested
/// ones included, so the result never parses as a checklist.
pub fn strip_markers(description: &str) -> String {
    description
        .split('\n')
        .map(|line| {
            let mut current = line.to_string();
            while let Some((offset, _)) = marker_of(&current) {
                current = format!("{}{}", &current[..offset], &current[offset + MARKER_LEN..]);
            }
            current
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Done when every item is checked, in progress when some are, otherwise
/// `current` is kept.
pub fn derive_status(description: &str, current: Status) -> Status {
    let items = parse(description);
    let any_pending = items.iter().any(|item| !item.done);
    let any_done = items.iter().any(|item| item.done);

    if !items.is_empty() && !any_pending {
        Status::Done
    } else if any_done {
        Status::InProgress
    } else {
        current
    }
}

/// Appends suggestions as pending checklist lines, separated from existing
/// text by a blank line.
pub fn append_suggestions(description: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return description.to_string();
    }
    let checklist = suggestions
        .iter()
        .map(|suggestion| format!("{PENDING_MARKER}{}", suggestion.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    if description.is_empty() {
        checklist
    } else {
        format!("{description}\n\n{checklist}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_checklist_lines_in_order() {
        let text = "Intro\n- [ ] wash\n  - [x] dry\n-[ ] not a marker\n- [x] fold";
        let items = parse(text);
        assert_eq!(
            items,
            vec![
                ChecklistItem {
                    done: false,
                    text: "wash".to_string()
                },
                ChecklistItem {
                    done: true,
                    text: "dry".to_string()
                },
                ChecklistItem {
                    done: true,
                    text: "fold".to_string()
                },
            ]
        );
        assert!(parse("just words\nno boxes").is_empty());
    }

    #[test]
    fn toggles_the_indexed_item() {
        assert_eq!(toggle("- [ ] wash\n- [ ] dry", 1), "- [ ] wash\n- [x] dry");
        assert_eq!(toggle("note\n- [x] wash", 0), "note\n- [ ] wash");
    }

    #[test]
    fn toggle_twice_restores_text() {
        let text = "Plan\r\n  - [ ] a [x] b\r\n- [x] c\r\n\r\ntail";
        for index in 0..2 {
            assert_eq!(toggle(&toggle(text, index), index), text);
        }
    }

    #[test]
    fn toggle_out_of_range_is_noop() {
        let text = "- [ ] only";
        assert_eq!(toggle(text, 1), text);
        assert_eq!(toggle("", 0), "");
    }

    #[test]
    fn progress_rounds_to_percent() {
        let progress = progress("- [x] a\n- [ ] b\n- [x] c").expect("has items");
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.percent(), 67);
        assert!(super::progress("no checklist").is_none());
    }

    #[test]
    fn stripped_text_never_parses() {
        let text = "Intro\n- [ ] a\n - [x] - [ ] b\nplain - [x] kept";
        let stripped = strip_markers(text);
        assert_eq!(stripped, "Intro\na\n b\nplain - [x] kept");
        assert!(parse(&stripped).is_empty());
    }

    #[test]
    fn derives_status_from_items() {
        assert_eq!(derive_status("- [x] a\n- [x] b", Status::Todo), Status::Done);
        assert_eq!(derive_status("- [x] a\n- [ ] b", Status::Todo), Status::InProgress);
        assert_eq!(derive_status("- [ ] a", Status::Review), Status::Review);
        assert_eq!(derive_status("text", Status::Review), Status::Review);
        assert_eq!(StatusPolicy::Manual.apply("- [x] a", Status::Todo), Status::Todo);
    }

    #[test]
    fn appends_suggestions_after_blank_line() {
        let suggestions = vec!["Draft".to_string(), " Review ".to_string()];
        assert_eq!(append_suggestions("", &suggestions), "- [ ] Draft\n- [ ] Review");
        assert_eq!(
            append_suggestions("Context", &suggestions),
            "Context\n\n- [ ] Draft\n- [ ] Review"
        );
        assert_eq!(append_suggestions("Context", &[]), "Context");
    }
}
