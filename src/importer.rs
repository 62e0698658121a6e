// 📥 Library Import/Export - CSV in, CSV out
//
// Import is forgiving and idempotent: bad rows are reported with a
// reason and skipped (never fatal), and re-importing a file the user
// already loaded inserts nothing thanks to the per-user dedup hash.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::entities::{Book, BookStatus};

// ============================================================================
// CSV RECORD
// ============================================================================

/// One row of the interchange format. Dates are calendar days
/// (YYYY-MM-DD); empty cells mean "not recorded".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Author")]
    pub author: String,

    #[serde(rename = "Genre", default)]
    pub genre: String,

    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "Rating", default)]
    pub rating: Option<u8>,

    #[serde(rename = "Pages", default)]
    pub pages: Option<u32>,

    #[serde(rename = "Started", default)]
    pub started: String,

    #[serde(rename = "Finished", default)]
    pub finished: String,
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        let day = |ts: Option<chrono::DateTime<chrono::Utc>>| {
            ts.map(|t| t.date_naive().format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };

        BookRecord {
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            status: book.status.as_str().to_string(),
            rating: book.rating,
            pages: book.page_count,
            started: day(book.started_at),
            finished: day(book.finished_at),
        }
    }
}

// ============================================================================
// IMPORT REPORT
// ============================================================================

/// Why one CSV row was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowIssue {
    /// 1-based line number in the file (line 1 is the header)
    pub line: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: Vec<RowIssue>,
}

impl ImportReport {
    pub fn total_rows(&self) -> usize {
        self.inserted + self.duplicates + self.skipped.len()
    }
}

// ============================================================================
// ROW VALIDATION
// ============================================================================

fn parse_day(value: &str, field: &str, line: usize) -> Result<Option<NaiveDate>, RowIssue> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| RowIssue {
            line,
            field: field.to_string(),
            message: format!("expected YYYY-MM-DD, got '{value}'"),
        })
}

/// Validate one record and build the Book it describes.
fn record_to_book(user_id: &str, record: &BookRecord, line: usize) -> Result<Book, RowIssue> {
    if record.title.trim().is_empty() {
        return Err(RowIssue {
            line,
            field: "Title".to_string(),
            message: "missing title".to_string(),
        });
    }
    if record.author.trim().is_empty() {
        return Err(RowIssue {
            line,
            field: "Author".to_string(),
            message: "missing author".to_string(),
        });
    }

    if let Some(rating) = record.rating {
        if !(1..=5).contains(&rating) {
            return Err(RowIssue {
                line,
                field: "Rating".to_string(),
                message: format!("rating must be 1-5, got {rating}"),
            });
        }
    }

    let started = parse_day(&record.started, "Started", line)?;
    let finished = parse_day(&record.finished, "Finished", line)?;

    // Empty status is inferred from the dates; anything else must parse.
    let status = if record.status.trim().is_empty() {
        if finished.is_some() {
            BookStatus::Finished
        } else if started.is_some() {
            BookStatus::Reading
        } else {
            BookStatus::ToRead
        }
    } else {
        BookStatus::parse(&record.status).ok_or_else(|| RowIssue {
            line,
            field: "Status".to_string(),
            message: format!("unknown status '{}'", record.status.trim()),
        })?
    };

    let genre = if record.genre.trim().is_empty() {
        "Uncategorized"
    } else {
        record.genre.trim()
    };

    let mut book = Book::new(user_id, &record.title, &record.author, genre);
    book.status = status;
    book.rating = record.rating;
    book.page_count = record.pages;
    book.started_at = started.map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc());
    // The completion event only exists for finished books.
    if status == BookStatus::Finished {
        book.finished_at = finished.map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }

    Ok(book)
}

// ============================================================================
// IMPORT
// ============================================================================

/// Import library rows from any CSV reader. Row problems land in the
/// report; only I/O and database failures are errors.
pub fn import_records(
    conn: &Connection,
    user_id: &str,
    reader: impl io::Read,
) -> Result<ImportReport> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut report = ImportReport::default();

    for (index, row) in rdr.deserialize::<BookRecord>().enumerate() {
        // Header is line 1, first data row is line 2.
        let line = index + 2;

        let record = match row {
            Ok(record) => record,
            Err(e) => {
                report.skipped.push(RowIssue {
                    line,
                    field: "row".to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        match record_to_book(user_id, &record, line) {
            Ok(book) => {
                if db::insert_book(conn, &book)? {
                    report.inserted += 1;
                } else {
                    report.duplicates += 1;
                }
            }
            Err(issue) => report.skipped.push(issue),
        }
    }

    Ok(report)
}

pub fn import_csv(conn: &Connection, user_id: &str, csv_path: &Path) -> Result<ImportReport> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    import_records(conn, user_id, file)
}

// ============================================================================
// EXPORT
// ============================================================================

/// The user's full library as CSV text (used by the API export route).
pub fn export_csv_string(conn: &Connection, user_id: &str) -> Result<String> {
    let books = db::get_books(conn, user_id)?;

    let mut wtr = csv::Writer::from_writer(Vec::new());
    for book in &books {
        wtr.serialize(BookRecord::from(book))
            .context("Failed to serialize book record")?;
    }

    let bytes = wtr.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Write the user's library to a CSV file; returns the row count.
pub fn export_csv(conn: &Connection, user_id: &str, csv_path: &Path) -> Result<usize> {
    let books = db::get_books(conn, user_id)?;

    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV file {}", csv_path.display()))?;
    for book in &books {
        wtr.serialize(BookRecord::from(book))
            .context("Failed to serialize book record")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;

    Ok(books.len())
}

// ============================================================================
// TESTS
// ============================================================================
