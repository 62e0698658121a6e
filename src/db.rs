// 🗄️ Data Access Layer - SQLite schema and per-user CRUD
//
// Every read, update and delete is scoped by user_id: ownership is
// enforced here, at the data source, not in the derived-statistics core.
// Timestamps are stored as RFC 3339 TEXT in UTC.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use crate::entities::{Book, BookStatus, Quote, ReadingGoal, ReadingSession};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            dedup_hash TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            genre TEXT NOT NULL,
            status TEXT NOT NULL,
            rating INTEGER,
            page_count INTEGER,
            started_at TEXT,
            finished_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quotes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            text TEXT NOT NULL,
            page INTEGER,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reading_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            occurred_on TEXT NOT NULL,
            minutes INTEGER NOT NULL,
            pages INTEGER,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reading_goals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            target_books INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, year)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id, status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_books_finished ON books(user_id, finished_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quotes_user_book ON quotes(user_id, book_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_day ON reading_sessions(user_id, occurred_on)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    let status_str: String = row.get(5)?;
    let status = BookStatus::parse(&status_str).ok_or(rusqlite::Error::InvalidQuery)?;

    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Book {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        genre: row.get(4)?,
        status,
        rating: row.get(6)?,
        page_count: row.get(7)?,
        started_at: parse_ts(row.get(8)?),
        finished_at: parse_ts(row.get(9)?),
        created_at: parse_ts(Some(created_at)).ok_or(rusqlite::Error::InvalidQuery)?,
        updated_at: parse_ts(Some(updated_at)).ok_or(rusqlite::Error::InvalidQuery)?,
    })
}

const BOOK_COLUMNS: &str = "id, user_id, title, author, genre, status, rating, page_count,
                            started_at, finished_at, created_at, updated_at";

// ============================================================================
// BOOKS
// ============================================================================

/// Insert a book. Returns false (and inserts nothing) when the user
/// already has a book with the same title/author (dedup hash collision).
pub fn insert_book(conn: &Connection, book: &Book) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO books (
            id, user_id, dedup_hash, title, author, genre, status, rating,
            page_count, started_at, finished_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            book.id,
            book.user_id,
            book.dedup_hash(),
            book.title,
            book.author,
            book.genre,
            book.status.as_str(),
            book.rating,
            book.page_count,
            book.started_at.map(|dt| dt.to_rfc3339()),
            book.finished_at.map(|dt| dt.to_rfc3339()),
            book.created_at.to_rfc3339(),
            book.updated_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_books(conn: &Connection, user_id: &str) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS} FROM books WHERE user_id = ?1 ORDER BY created_at DESC"
    ))?;

    let books = stmt
        .query_map(params![user_id], book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(books)
}

pub fn get_books_by_status(
    conn: &Connection,
    user_id: &str,
    status: BookStatus,
) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS} FROM books
         WHERE user_id = ?1 AND status = ?2
         ORDER BY created_at DESC"
    ))?;

    let books = stmt
        .query_map(params![user_id, status.as_str()], book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(books)
}

pub fn get_books_by_genre(conn: &Connection, user_id: &str, genre: &str) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS} FROM books
         WHERE user_id = ?1 AND LOWER(genre) = LOWER(?2)
         ORDER BY created_at DESC"
    ))?;

    let books = stmt
        .query_map(params![user_id, genre], book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(books)
}

pub fn get_book(conn: &Connection, user_id: &str, book_id: &str) -> Result<Option<Book>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS} FROM books WHERE user_id = ?1 AND id = ?2"
    ))?;

    let mut rows = stmt.query_map(params![user_id, book_id], book_from_row)?;
    match rows.next() {
        Some(book) => Ok(Some(book?)),
        None => Ok(None),
    }
}

/// Update a book's values. Returns false when no row matched the
/// (user, id) pair - another user's book is simply not found.
pub fn update_book(conn: &Connection, book: &Book) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE books SET
            title = ?3, author = ?4, genre = ?5, status = ?6, rating = ?7,
            page_count = ?8, started_at = ?9, finished_at = ?10, updated_at = ?11
         WHERE user_id = ?1 AND id = ?2",
        params![
            book.user_id,
            book.id,
            book.title,
            book.author,
            book.genre,
            book.status.as_str(),
            book.rating,
            book.page_count,
            book.started_at.map(|dt| dt.to_rfc3339()),
            book.finished_at.map(|dt| dt.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(changed == 1)
}

/// Delete a book and its quotes and sessions. Returns false when the
/// (user, id) pair matched nothing.
pub fn delete_book(conn: &Connection, user_id: &str, book_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM books WHERE user_id = ?1 AND id = ?2",
        params![user_id, book_id],
    )?;

    if deleted == 0 {
        return Ok(false);
    }

    conn.execute(
        "DELETE FROM quotes WHERE user_id = ?1 AND book_id = ?2",
        params![user_id, book_id],
    )?;
    conn.execute(
        "DELETE FROM reading_sessions WHERE user_id = ?1 AND book_id = ?2",
        params![user_id, book_id],
    )?;

    Ok(true)
}

/// Mark a book finished at the given time and return the updated book.
/// None when the (user, id) pair matched nothing.
pub fn finish_book(
    conn: &Connection,
    user_id: &str,
    book_id: &str,
    finished_at: DateTime<Utc>,
) -> Result<Option<Book>> {
    let Some(mut book) = get_book(conn, user_id, book_id)? else {
        return Ok(None);
    };

    book.finish(finished_at);
    update_book(conn, &book)?;

    Ok(Some(book))
}

// ============================================================================
// COMPLETION-DATE SOURCE
// ============================================================================

/// The streak core's input interface: one timestamp per finished book,
/// absent (NULL or unparseable) entries filtered out. Fetch failures
/// propagate unchanged to the caller - no caching, no retry.
pub fn get_completion_dates(conn: &Connection, user_id: &str) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT finished_at FROM books
         WHERE user_id = ?1 AND status = 'finished' AND finished_at IS NOT NULL",
    )?;

    let raw: Vec<String> = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(raw
        .into_iter()
        .filter_map(|s| parse_ts(Some(s)))
        .collect())
}

// ============================================================================
// QUOTES
// ============================================================================

pub fn insert_quote(conn: &Connection, quote: &Quote) -> Result<()> {
    conn.execute(
        "INSERT INTO quotes (id, user_id, book_id, text, page, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            quote.id,
            quote.user_id,
            quote.book_id,
            quote.text,
            quote.page,
            quote.created_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

fn quote_from_row(row: &Row) -> rusqlite::Result<Quote> {
    let created_at: String = row.get(5)?;

    Ok(Quote {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        text: row.get(3)?,
        page: row.get(4)?,
        created_at: parse_ts(Some(created_at)).ok_or(rusqlite::Error::InvalidQuery)?,
    })
}

pub fn get_quotes(conn: &Connection, user_id: &str) -> Result<Vec<Quote>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, book_id, text, page, created_at
         FROM quotes WHERE user_id = ?1 ORDER BY created_at DESC",
    )?;

    let quotes = stmt
        .query_map(params![user_id], quote_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

pub fn get_quotes_for_book(
    conn: &Connection,
    user_id: &str,
    book_id: &str,
) -> Result<Vec<Quote>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, book_id, text, page, created_at
         FROM quotes WHERE user_id = ?1 AND book_id = ?2 ORDER BY created_at DESC",
    )?;

    let quotes = stmt
        .query_map(params![user_id, book_id], quote_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

pub fn delete_quote(conn: &Connection, user_id: &str, quote_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM quotes WHERE user_id = ?1 AND id = ?2",
        params![user_id, quote_id],
    )?;

    Ok(deleted == 1)
}

// ============================================================================
// READING SESSIONS
// ============================================================================

pub fn insert_session(conn: &Connection, session: &ReadingSession) -> Result<()> {
    conn.execute(
        "INSERT INTO reading_sessions (
            id, user_id, book_id, occurred_on, minutes, pages, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session.id,
            session.user_id,
            session.book_id,
            session.occurred_on.format("%Y-%m-%d").to_string(),
            session.minutes,
            session.pages,
            session.notes,
            session.created_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

fn session_from_row(row: &Row) -> rusqlite::Result<ReadingSession> {
    let occurred_on: String = row.get(3)?;
    let created_at: String = row.get(7)?;

    Ok(ReadingSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        occurred_on: NaiveDate::parse_from_str(&occurred_on, "%Y-%m-%d")
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        minutes: row.get(4)?,
        pages: row.get(5)?,
        notes: row.get(6)?,
        created_at: parse_ts(Some(created_at)).ok_or(rusqlite::Error::InvalidQuery)?,
    })
}

pub fn get_sessions(conn: &Connection, user_id: &str) -> Result<Vec<ReadingSession>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, book_id, occurred_on, minutes, pages, notes, created_at
         FROM reading_sessions WHERE user_id = ?1 ORDER BY occurred_on DESC",
    )?;

    let sessions = stmt
        .query_map(params![user_id], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sessions)
}

pub fn delete_session(conn: &Connection, user_id: &str, session_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM reading_sessions WHERE user_id = ?1 AND id = ?2",
        params![user_id, session_id],
    )?;

    Ok(deleted == 1)
}

// ============================================================================
// READING GOALS
// ============================================================================

/// Set the yearly target. One goal per (user, year): setting it again
/// replaces the target and keeps the original identity.
pub fn upsert_goal(
    conn: &Connection,
    user_id: &str,
    year: i32,
    target_books: u32,
) -> Result<ReadingGoal> {
    let goal = ReadingGoal::new(user_id, year, target_books);

    conn.execute(
        "INSERT INTO reading_goals (id, user_id, year, target_books, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, year)
         DO UPDATE SET target_books = excluded.target_books,
                       updated_at = excluded.updated_at",
        params![
            goal.id,
            goal.user_id,
            goal.year,
            goal.target_books,
            goal.created_at.to_rfc3339(),
            goal.updated_at.to_rfc3339(),
        ],
    )?;

    // Read back: on conflict the stored row keeps its original id.
    get_goal(conn, user_id, year)?
        .ok_or_else(|| anyhow::anyhow!("goal row missing after upsert"))
}

pub fn get_goal(conn: &Connection, user_id: &str, year: i32) -> Result<Option<ReadingGoal>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, year, target_books, created_at, updated_at
         FROM reading_goals WHERE user_id = ?1 AND year = ?2",
    )?;

    let mut rows = stmt.query_map(params![user_id, year], |row| {
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;

        Ok(ReadingGoal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            year: row.get(2)?,
            target_books: row.get(3)?,
            created_at: parse_ts(Some(created_at)).ok_or(rusqlite::Error::InvalidQuery)?,
            updated_at: parse_ts(Some(updated_at)).ok_or(rusqlite::Error::InvalidQuery)?,
        })
    })?;

    match rows.next() {
        Some(goal) => Ok(Some(goal?)),
        None => Ok(None),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn finished_book(user: &str, title: &str, finished_at: DateTime<Utc>) -> Book {
        let mut book = Book::new(user, title, "Test Author", "Fiction");
        book.finish(finished_at);
        book
    }

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_book_crud_round_trip() {
        let conn = test_conn();

        let mut book = Book::new("user-1", "Dune", "Frank Herbert", "Science Fiction");
        assert!(insert_book(&conn, &book).unwrap());

        let loaded = get_book(&conn, "user-1", &book.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Dune");
        assert_eq!(loaded.status, BookStatus::ToRead);

        book.status = BookStatus::Reading;
        book.rate(4);
        assert!(update_book(&conn, &book).unwrap());

        let loaded = get_book(&conn, "user-1", &book.id).unwrap().unwrap();
        assert_eq!(loaded.status, BookStatus::Reading);
        assert_eq!(loaded.rating, Some(4));

        assert!(delete_book(&conn, "user-1", &book.id).unwrap());
        assert!(get_book(&conn, "user-1", &book.id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_book_is_skipped() {
        let conn = test_conn();

        let first = Book::new("user-1", "Dune", "Frank Herbert", "Science Fiction");
        let second = Book::new("user-1", "DUNE", "Frank Herbert", "Sci-Fi");

        assert!(insert_book(&conn, &first).unwrap());
        assert!(!insert_book(&conn, &second).unwrap());
        assert_eq!(get_books(&conn, "user-1").unwrap().len(), 1);
    }

    #[test]
    fn test_ownership_isolation() {
        let conn = test_conn();

        let theirs = Book::new("user-2", "Emma", "Jane Austen", "Classic");
        insert_book(&conn, &theirs).unwrap();

        // user-1 cannot see, update, or delete user-2's book.
        assert!(get_book(&conn, "user-1", &theirs.id).unwrap().is_none());
        assert!(get_books(&conn, "user-1").unwrap().is_empty());

        let mut hijack = theirs.clone();
        hijack.user_id = "user-1".to_string();
        hijack.title = "Defaced".to_string();
        assert!(!update_book(&conn, &hijack).unwrap());
        assert!(!delete_book(&conn, "user-1", &theirs.id).unwrap());

        let intact = get_book(&conn, "user-2", &theirs.id).unwrap().unwrap();
        assert_eq!(intact.title, "Emma");
    }

    #[test]
    fn test_completion_dates_only_cover_finished_books() {
        let conn = test_conn();

        insert_book(&conn, &finished_book("user-1", "Book A", ts(2025, 1, 10))).unwrap();
        insert_book(&conn, &finished_book("user-1", "Book B", ts(2025, 2, 20))).unwrap();

        let mut reading = Book::new("user-1", "Book C", "Test Author", "Fiction");
        reading.status = BookStatus::Reading;
        insert_book(&conn, &reading).unwrap();

        // Finished book of another user must not leak in.
        insert_book(&conn, &finished_book("user-2", "Book D", ts(2025, 3, 1))).unwrap();

        let dates = get_completion_dates(&conn, "user-1").unwrap();
        assert_eq!(dates.len(), 2);
        assert!(dates.contains(&ts(2025, 1, 10)));
        assert!(dates.contains(&ts(2025, 2, 20)));
    }

    #[test]
    fn test_finish_book_sets_status_and_timestamp() {
        let conn = test_conn();

        let book = Book::new("user-1", "Dune", "Frank Herbert", "Science Fiction");
        insert_book(&conn, &book).unwrap();

        let when = ts(2025, 5, 5);
        let finished = finish_book(&conn, "user-1", &book.id, when).unwrap().unwrap();
        assert_eq!(finished.status, BookStatus::Finished);
        assert_eq!(finished.finished_at, Some(when));

        let dates = get_completion_dates(&conn, "user-1").unwrap();
        assert_eq!(dates, vec![when]);

        // Finishing someone else's book is a not-found, not an update.
        assert!(finish_book(&conn, "user-2", &book.id, when).unwrap().is_none());
    }

    #[test]
    fn test_quotes_belong_to_user_and_book() {
        let conn = test_conn();

        let book = Book::new("user-1", "Slaughterhouse-Five", "Kurt Vonnegut", "Fiction");
        insert_book(&conn, &book).unwrap();

        let quote = Quote::new("user-1", &book.id, "So it goes.", Some(112));
        insert_quote(&conn, &quote).unwrap();

        assert_eq!(get_quotes(&conn, "user-1").unwrap().len(), 1);
        assert_eq!(get_quotes_for_book(&conn, "user-1", &book.id).unwrap().len(), 1);
        assert!(get_quotes(&conn, "user-2").unwrap().is_empty());

        assert!(!delete_quote(&conn, "user-2", &quote.id).unwrap());
        assert!(delete_quote(&conn, "user-1", &quote.id).unwrap());
    }

    #[test]
    fn test_deleting_book_removes_quotes_and_sessions() {
        let conn = test_conn();

        let book = Book::new("user-1", "Dune", "Frank Herbert", "Science Fiction");
        insert_book(&conn, &book).unwrap();
        insert_quote(&conn, &Quote::new("user-1", &book.id, "Fear is the mind-killer.", None))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        insert_session(&conn, &ReadingSession::new("user-1", &book.id, day, 45, Some(30)))
            .unwrap();

        assert!(delete_book(&conn, "user-1", &book.id).unwrap());
        assert!(get_quotes(&conn, "user-1").unwrap().is_empty());
        assert!(get_sessions(&conn, "user-1").unwrap().is_empty());
    }

    #[test]
    fn test_goal_upsert_replaces_target() {
        let conn = test_conn();

        let first = upsert_goal(&conn, "user-1", 2025, 24).unwrap();
        let second = upsert_goal(&conn, "user-1", 2025, 36).unwrap();

        // Same identity, new target.
        assert_eq!(second.id, first.id);
        assert_eq!(second.target_books, 36);

        let loaded = get_goal(&conn, "user-1", 2025).unwrap().unwrap();
        assert_eq!(loaded.target_books, 36);

        // Different year is a different goal.
        assert!(get_goal(&conn, "user-1", 2024).unwrap().is_none());
    }
}
