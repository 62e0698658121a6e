// ⏱️ Reading Session Entity - One sitting with a book

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A recorded reading session: one sitting, on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSession {
    /// Stable identity (UUID)
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// The book that was read
    pub book_id: String,

    /// Calendar day the session happened on (UTC)
    pub occurred_on: NaiveDate,

    /// Minutes spent reading
    pub minutes: u32,

    /// Pages covered, if tracked
    pub pages: Option<u32>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ReadingSession {
    pub fn new(
        user_id: &str,
        book_id: &str,
        occurred_on: NaiveDate,
        minutes: u32,
        pages: Option<u32>,
    ) -> Self {
        ReadingSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            occurred_on,
            minutes,
            pages,
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Reading pace in pages per hour, when both signals are present.
    pub fn pages_per_hour(&self) -> Option<f64> {
        let pages = self.pages?;
        if self.minutes == 0 {
            return None;
        }
        Some(pages as f64 * 60.0 / self.minutes as f64)
    }
}
