//! Visible-list derivation: status filter, then title search, then priority
//! sort. Always computed from the full task list, never from a previous view.

use std::fmt;
use std::str::FromStr;

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => task.status == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    None,
    LowToHigh,
    HighToLow,
}

impl SortOrder {
    /// The priority button: ascending first, then flips back and forth.
    pub fn toggled(self) -> Self {
        match self {
            Self::LowToHigh => Self::HighToLow,
            Self::None | Self::HighToLow => Self::LowToHigh,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::LowToHigh => "low-to-high",
            Self::HighToLow => "high-to-low",
        })
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "low-to-high" | "asc" => Ok(Self::LowToHigh),
            "high-to-low" | "desc" => Ok(Self::HighToLow),
            other => Err(format!(
                "unknown sort order '{other}' (expected none, low-to-high or high-to-low)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewQuery {
    pub status: StatusFilter,
    pub sort: SortOrder,
    pub search: String,
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }
}

pub fn derive_visible(all: &[Task], query: &ViewQuery) -> Vec<Task> {
    // Blank means no search; otherwise the query is matched as typed.
    let needle = (!query.search.trim().is_empty()).then(|| query.search.to_lowercase());

    let mut visible: Vec<Task> = all
        .iter()
        .filter(|t| query.status.matches(t))
        .filter(|t| match &needle {
            Some(n) => t.title.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .cloned()
        .collect();

    // sort_by_key is stable, so equal priorities keep their order from `all`.
    match query.sort {
        SortOrder::None => {}
        SortOrder::LowToHigh => visible.sort_by_key(|t| t.priority.rank()),
        SortOrder::HighToLow => visible.sort_by_key(|t| std::cmp::Reverse(t.priority.rank())),
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn sample() -> Vec<Task> {
        vec![
            Task::new("1", "Buy milk").with_priority(Priority::Medium),
            Task::new("2", "Sell car")
                .with_priority(Priority::High)
                .with_status(TaskStatus::Completed),
            Task::new("3", "buy stamps").with_priority(Priority::Low),
            Task::new("4", "Call mum").with_priority(Priority::Medium),
            Task::new("5", "File taxes")
                .with_priority(Priority::High)
                .with_status(TaskStatus::InProgress),
        ]
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let all = vec![Task::new("1", "Buy milk"), Task::new("2", "Sell car")];
        let v = derive_visible(&all, &ViewQuery::new().with_search("Buy"));
        assert_eq!(ids(&v), vec!["1"]);

        let all = sample();
        let v = derive_visible(&all, &ViewQuery::new().with_search("BUY"));
        assert_eq!(ids(&v), vec!["1", "3"]);
    }

    #[test]
    fn blank_search_and_all_filter_keep_everything_in_order() {
        let all = sample();
        let v = derive_visible(&all, &ViewQuery::new().with_search("   "));
        assert_eq!(ids(&v), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn search_keeps_surrounding_spaces() {
        let all = vec![Task::new("1", "Buy milk"), Task::new("2", "Buymilk")];
        let v = derive_visible(&all, &ViewQuery::new().with_search(" milk"));
        assert_eq!(ids(&v), vec!["1"]);
        let v = derive_visible(&all, &ViewQuery::new().with_search("buy "));
        assert_eq!(ids(&v), vec!["1"]);
    }

    #[test]
    fn search_ignores_description() {
        let all = vec![Task::new("1", "Errands").with_description("buy milk")];
        assert!(derive_visible(&all, &ViewQuery::new().with_search("milk")).is_empty());
    }

    #[test]
    fn priority_sort_is_stable_both_ways() {
        let all = sample();
        let asc = derive_visible(&all, &ViewQuery::new().with_sort(SortOrder::LowToHigh));
        assert_eq!(ids(&asc), vec!["3", "1", "4", "2", "5"]);
        let desc = derive_visible(&all, &ViewQuery::new().with_sort(SortOrder::HighToLow));
        assert_eq!(ids(&desc), vec!["2", "5", "1", "4", "3"]);
    }

    #[test]
    fn filtered_out_tasks_never_come_back_through_sorting() {
        let all = sample();
        let q = ViewQuery::new()
            .with_status(StatusFilter::Only(TaskStatus::Pending))
            .with_sort(SortOrder::HighToLow);
        let v = derive_visible(&all, &q);
        assert_eq!(ids(&v), vec!["1", "4", "3"]);
        assert!(v.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[test]
    fn derivation_is_idempotent() {
        let all = sample();
        let q = ViewQuery::new()
            .with_sort(SortOrder::LowToHigh)
            .with_search("l");
        let once = derive_visible(&all, &q);
        let twice = derive_visible(&once, &q);
        assert_eq!(once, twice);
    }

    #[test]
    fn sort_toggle_and_parsing() {
        assert_eq!(SortOrder::None.toggled(), SortOrder::LowToHigh);
        assert_eq!(SortOrder::LowToHigh.toggled(), SortOrder::HighToLow);
        assert_eq!(SortOrder::HighToLow.toggled(), SortOrder::LowToHigh);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::HighToLow);
        assert_eq!("ALL".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "completed".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(TaskStatus::Completed)
        );
    }
}
