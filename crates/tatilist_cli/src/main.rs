//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire config, logging, preferences and the list engine end to end.
//! - Print one rendered view per tab against an in-memory store.

use log::info;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tatilist_core::{
    format_monthly_total, init_logging_from_config, CoreConfig, ListEngine, ListView,
    MemorySyncChannel, SqlitePreferenceStore, Subtask, Tab, Task,
};

const VIEW_WAIT: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tatilist: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env();
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("tatilist: logging disabled: {err}");
    }
    println!("tatilist_core version={}", tatilist_core::core_version());

    let preferences = SqlitePreferenceStore::open(&config.prefs_db_path)?;
    let channel = Arc::new(MemorySyncChannel::new());
    let mut engine = ListEngine::new(channel, Box::new(preferences))?;
    let updates = engine.updates();
    engine.start()?;

    let today = chrono::Local::now().timestamp_millis();
    let mut rent = Task::new("Pay rent");
    rent.due_date = Some(today);
    rent.expense = 50.0;
    rent.priority = 1;
    rent.subtasks.push(Subtask::new("transfer fee", 20.0));
    engine.create_task(&rent)?;
    engine.create_task(&Task::new("Call plumber"))?;

    while engine.tasks().len() < 2 {
        updates.recv_timeout(VIEW_WAIT)?;
    }
    info!("event=cli_seed module=cli status=ok tasks={}", engine.tasks().len());

    for tab in Tab::ALL {
        print_view(&engine.select_tab(tab));
    }
    if let Some(list_id) = engine.active_list_id() {
        println!("list={}", tatilist_core::short_list_label(list_id));
    }
    println!("members={}", engine.member_count()?);

    engine.dispose();
    Ok(())
}

fn print_view(view: &ListView) {
    println!(
        "[{}] {} task(s), this month {}",
        view.tab.label(),
        view.tasks.len(),
        format_monthly_total(view.monthly_expense)
    );
    for task in &view.tasks {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] p{} {}", task.priority, task.title);
    }
}
