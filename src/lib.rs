// readstack - Personal Book Tracking - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod db;
pub mod entities;
pub mod goals;
pub mod importer;
pub mod recommendations;
pub mod streaks;

// Re-export commonly used types
pub use db::{
    setup_database,
    insert_book, get_books, get_books_by_status, get_books_by_genre, get_book,
    update_book, delete_book, finish_book,
    get_completion_dates,
    insert_quote, get_quotes, get_quotes_for_book, delete_quote,
    insert_session, get_sessions, delete_session,
    upsert_goal, get_goal,
};
pub use entities::{Book, BookStatus, Quote, ReadingGoal, ReadingSession};
pub use goals::GoalProgress;
pub use importer::{
    import_csv, import_records, export_csv, export_csv_string,
    BookRecord, ImportReport, RowIssue,
};
pub use recommendations::{recommend, Recommendation};
pub use streaks::{compute_streaks, count_periods, PeriodCounts, StreakResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
