// 📚 Book Entity - The catalogued book and its reading status
//
// A book is owned by exactly one user; every query that touches it is
// scoped by user_id at the data-access layer. The completion event for
// streak purposes is the finished_at timestamp of a Finished book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// BOOK STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// On the shelf, not started yet
    ToRead,

    /// Currently being read
    Reading,

    /// Finished - carries a completion timestamp
    Finished,

    /// Abandoned without finishing
    Abandoned,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::ToRead => "to_read",
            BookStatus::Reading => "reading",
            BookStatus::Finished => "finished",
            BookStatus::Abandoned => "abandoned",
        }
    }

    /// Parse a status string (case-insensitive). Unknown values are None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "to_read" | "to-read" => Some(BookStatus::ToRead),
            "reading" => Some(BookStatus::Reading),
            "finished" => Some(BookStatus::Finished),
            "abandoned" => Some(BookStatus::Abandoned),
            _ => None,
        }
    }
}

// ============================================================================
// BOOK
// ============================================================================

/// A book in a user's library.
///
/// Identity: UUID (never changes). Values: title, author, genre, status,
/// rating, timestamps (can change over the book's life).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Stable identity (UUID)
    pub id: String,

    /// Owning user (opaque identifier from the identity provider)
    pub user_id: String,

    pub title: String,
    pub author: String,
    pub genre: String,

    pub status: BookStatus,

    /// User rating 1-5, if rated
    pub rating: Option<u8>,

    pub page_count: Option<u32>,

    /// When the user started reading
    pub started_at: Option<DateTime<Utc>>,

    /// When the user finished - this is the completion event timestamp
    pub finished_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create a new book on a user's shelf (status ToRead).
    pub fn new(user_id: &str, title: &str, author: &str, genre: &str) -> Self {
        let now = Utc::now();
        Book {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.trim().to_string(),
            author: author.trim().to_string(),
            genre: genre.trim().to_string(),
            status: BookStatus::ToRead,
            rating: None,
            page_count: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == BookStatus::Finished
    }

    /// The completion event timestamp, if this book counts as finished.
    /// A Finished book without a timestamp yields None and is filtered
    /// out before streak computation.
    pub fn completion_timestamp(&self) -> Option<DateTime<Utc>> {
        if self.is_finished() {
            self.finished_at
        } else {
            None
        }
    }

    /// Mark the book finished at the given time.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.status = BookStatus::Finished;
        self.finished_at = Some(finished_at);
        if self.started_at.is_none() {
            self.started_at = Some(finished_at);
        }
        self.updated_at = Utc::now();
    }

    /// Rate the book 1-5. Out-of-range values are rejected.
    pub fn rate(&mut self, rating: u8) -> bool {
        if !(1..=5).contains(&rating) {
            return false;
        }
        self.rating = Some(rating);
        self.updated_at = Utc::now();
        true
    }

    /// Duplicate-detection hash over (user, title, author).
    /// NOTE: this is for DEDUPLICATION on import, not identity - the
    /// UUID is the identity and survives title corrections.
    pub fn dedup_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}",
            self.user_id,
            self.title.to_lowercase(),
            self.author.to_lowercase()
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================
