// readstack CLI - import/export a library and print reading stats
//
// Database path comes from READSTACK_DB (default ./readstack.db),
// the acting user from READSTACK_USER (default "local"). The web API
// lives in the readstack-server binary.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Datelike, Utc};
use rusqlite::Connection;

use readstack::{
    compute_streaks, count_periods, export_csv, get_completion_dates, get_goal, import_csv,
    setup_database, GoalProgress,
};

fn db_path() -> PathBuf {
    env::var("READSTACK_DB")
        .unwrap_or_else(|_| "readstack.db".to_string())
        .into()
}

fn user_id() -> String {
    env::var("READSTACK_USER").unwrap_or_else(|_| "local".to_string())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") if args.len() > 2 => run_import(Path::new(&args[2])),
        Some("export") if args.len() > 2 => run_export(Path::new(&args[2])),
        Some("stats") => run_stats(),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("readstack {} - personal book tracking", readstack::VERSION);
    println!();
    println!("Usage:");
    println!("  readstack import <library.csv>   import books");
    println!("  readstack export <library.csv>   export books");
    println!("  readstack stats                  show streaks and progress");
    println!();
    println!("Environment:");
    println!("  READSTACK_DB    database path (default: readstack.db)");
    println!("  READSTACK_USER  acting user id (default: local)");
}

fn open_database() -> Result<Connection> {
    let path = db_path();
    let conn = Connection::open(&path)?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_import(csv_path: &Path) -> Result<()> {
    println!("📂 Importing {}...", csv_path.display());

    let conn = open_database()?;
    let report = import_csv(&conn, &user_id(), csv_path)?;

    println!("✓ Inserted: {} books", report.inserted);
    println!("✓ Skipped duplicates: {}", report.duplicates);

    if !report.skipped.is_empty() {
        println!("⚠ Skipped {} bad row(s):", report.skipped.len());
        for issue in &report.skipped {
            println!("    {issue}");
        }
    }

    Ok(())
}

fn run_export(csv_path: &Path) -> Result<()> {
    let conn = open_database()?;
    let count = export_csv(&conn, &user_id(), csv_path)?;

    println!("✓ Exported {} books to {}", count, csv_path.display());

    Ok(())
}

fn run_stats() -> Result<()> {
    let conn = open_database()?;
    let user = user_id();

    let completions = get_completion_dates(&conn, &user)?;
    let today = Utc::now().date_naive();

    let streaks = compute_streaks(&completions, today);
    let periods = count_periods(&completions, today);

    println!("📊 Reading stats for {user}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Current streak:  {} day(s)", streaks.current_streak);
    println!("Longest streak:  {} day(s)", streaks.longest_streak);
    match streaks.last_completion_date {
        Some(date) => println!("Last finished:   {date}"),
        None => println!("Last finished:   never"),
    }
    println!("This month:      {}", periods.this_month);
    println!("This year:       {}", periods.this_year);
    println!("All time:        {}", periods.all_time);

    if let Some(goal) = get_goal(&conn, &user, today.year())? {
        let finished_this_year = periods.this_year;
        let progress = GoalProgress::compute(&goal, finished_this_year, today);

        println!();
        println!("🎯 {} goal: {}/{} books", goal.year, progress.finished, progress.target_books);
        println!(
            "   Pace: expected {:.1} by today, projecting {} by year end ({})",
            progress.expected_by_today,
            progress.projected_total,
            if progress.on_track { "on track" } else { "behind" }
        );
    }

    Ok(())
}
