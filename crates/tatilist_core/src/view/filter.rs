//! Tab filtering over the canonical collection.
//!
//! Filtering is pure and stateless: the result depends only on the collection,
//! the selected tab and `now`, never on which tab was selected before.

use crate::model::task::Task;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone};

/// Mutually exclusive view selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    All,
    /// Open tasks due on the current local calendar day.
    Today,
    Completed,
}

impl Tab {
    /// Tabs in strip order.
    pub const ALL: [Tab; 3] = [Self::All, Self::Today, Self::Completed];

    /// Maps a tab strip position (0, 1, 2) to a tab.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Self::All => 0,
            Self::Today => 1,
            Self::Completed => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Today => "Today",
            Self::Completed => "Completed",
        }
    }
}

/// Returns the tasks visible under `tab`, preserving canonical order.
pub fn filter_tasks<Tz: TimeZone>(tasks: &[Task], tab: Tab, now: &DateTime<Tz>) -> Vec<Task> {
    let zone = now.timezone();
    let today = now.date_naive();
    tasks
        .iter()
        .filter(|task| matches_tab(task, tab, &zone, today))
        .cloned()
        .collect()
}

fn matches_tab<Tz: TimeZone>(task: &Task, tab: Tab, zone: &Tz, today: NaiveDate) -> bool {
    match tab {
        Tab::All => true,
        Tab::Today => {
            !task.completed
                && task
                    .due_date
                    .and_then(|due| local_date(due, zone))
                    .is_some_and(|due_day| due_day == today)
        }
        Tab::Completed => task.completed,
    }
}

/// Calendar date of an epoch-millisecond instant in `zone`.
pub fn local_date<Tz: TimeZone>(epoch_ms: i64, zone: &Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(epoch_ms).map(|instant| instant.with_timezone(zone).date_naive())
}

/// Returns whether `epoch_ms` falls in the same calendar month and year as `now`.
pub fn same_month<Tz: TimeZone>(epoch_ms: i64, now: &DateTime<Tz>) -> bool {
    let today = now.date_naive();
    local_date(epoch_ms, &now.timezone())
        .is_some_and(|day| day.year() == today.year() && day.month() == today.month())
}

#[cfg(test)]
mod tests {
    use super::{filter_tasks, same_month, Tab};
    use crate::model::task::Task;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn task(id: &str, due: Option<DateTime<Utc>>, completed: bool) -> Task {
        let mut task = Task::new(id);
        task.id = Some(id.to_string());
        task.due_date = due.map(|instant| instant.timestamp_millis());
        task.completed = completed;
        task
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().filter_map(|task| task.id.as_deref()).collect()
    }

    #[test]
    fn today_keeps_open_tasks_due_on_the_current_day() {
        let now = at(2024, 6, 10, 12);
        let tasks = vec![
            task("early", Some(at(2024, 6, 10, 0)), false),
            task("done", Some(at(2024, 6, 10, 9)), true),
            task("tomorrow", Some(at(2024, 6, 11, 0)), false),
            task("undated", None, false),
        ];

        assert_eq!(ids(&filter_tasks(&tasks, Tab::Today, &now)), vec!["early"]);
        assert_eq!(ids(&filter_tasks(&tasks, Tab::Completed, &now)), vec!["done"]);
        assert_eq!(filter_tasks(&tasks, Tab::All, &now), tasks);
    }

    #[test]
    fn today_uses_the_local_calendar_of_now() {
        // 23:30 UTC on June 9 is already June 10 at UTC+2.
        let due = at(2024, 6, 9, 23) + chrono::Duration::minutes(30);
        let tasks = vec![task("late", Some(due), false)];
        let plus_two = FixedOffset::east_opt(2 * 3600).expect("valid offset");
        let now = plus_two
            .with_ymd_and_hms(2024, 6, 10, 8, 0, 0)
            .single()
            .expect("valid instant");

        assert_eq!(ids(&filter_tasks(&tasks, Tab::Today, &now)), vec!["late"]);
        assert!(filter_tasks(&tasks, Tab::Today, &at(2024, 6, 10, 8)).is_empty());
    }

    #[test]
    fn filtering_does_not_depend_on_previous_tabs() {
        let now = at(2024, 6, 10, 12);
        let tasks = vec![
            task("a", Some(at(2024, 6, 1, 0)), true),
            task("b", None, false),
        ];

        let direct = filter_tasks(&tasks, Tab::Completed, &now);
        let _ = filter_tasks(&tasks, Tab::Completed, &now);
        let _ = filter_tasks(&tasks, Tab::All, &now);
        assert_eq!(filter_tasks(&tasks, Tab::Completed, &now), direct);
    }

    #[test]
    fn tab_indices_follow_strip_order() {
        assert_eq!(Tab::from_index(1), Some(Tab::Today));
        assert_eq!(Tab::from_index(3), None);
        for tab in Tab::ALL {
            assert_eq!(Tab::from_index(tab.index()), Some(tab));
        }
    }

    #[test]
    fn same_month_requires_matching_year() {
        let now = at(2024, 6, 10, 12);
        assert!(same_month(at(2024, 6, 30, 0).timestamp_millis(), &now));
        assert!(!same_month(at(2023, 6, 10, 0).timestamp_millis(), &now));
        assert!(!same_month(at(2024, 7, 1, 0).timestamp_millis(), &now));
    }
}
