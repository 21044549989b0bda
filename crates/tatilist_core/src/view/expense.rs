//! Current-month expense aggregation.
//!
//! # Invariants
//! - Only the parent task's due date decides whether an amount counts;
//!   subtasks carry no date of their own.
//! - Tasks without a due date never contribute, whatever their amounts.
//! - Non-positive amounts are ignored.

use crate::model::task::Task;
use crate::view::filter::same_month;
use chrono::{DateTime, TimeZone};

/// Sums task and subtask expenses whose parent is due in the month of `now`.
///
/// Takes the full canonical collection, not a tab view.
pub fn monthly_expense<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> f64 {
    // `Iterator::sum` over no floats yields -0.0, which renders as "$-0.00".
    tasks
        .iter()
        .filter(|task| task.due_date.is_some_and(|due| same_month(due, now)))
        .fold(0.0, |total, task| total + task_total(task))
}

fn task_total(task: &Task) -> f64 {
    task.subtasks
        .iter()
        .fold(positive(task.expense), |total, subtask| {
            total + positive(subtask.expense)
        })
}

fn positive(amount: f64) -> f64 {
    if amount > 0.0 {
        amount
    } else {
        0.0
    }
}

/// Display form of a monthly total, e.g. `$70.00`.
pub fn format_monthly_total(total: f64) -> String {
    format!("${total:.2}")
}
