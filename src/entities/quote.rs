// ✏️ Quote Entity - A saved passage from a book

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quote saved by a user from one of their books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Stable identity (UUID)
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// The book this quote came from
    pub book_id: String,

    /// The quoted text itself
    pub text: String,

    /// Page number, if the user recorded one
    pub page: Option<u32>,

    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(user_id: &str, book_id: &str, text: &str, page: Option<u32>) -> Self {
        Quote {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            text: text.trim().to_string(),
            page,
            created_at: Utc::now(),
        }
    }

    /// Short preview for list views: first `max_chars` characters.
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let cut: String = self.text.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_quote_trims_text() {
        let quote = Quote::new("user-1", "book-1", "  So it goes.  ", Some(112));

        assert_eq!(quote.text, "So it goes.");
        assert_eq!(quote.page, Some(112));
        assert!(!quote.id.is_empty());
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let quote = Quote::new("user-1", "book-1", "All happy families are alike", None);

        assert_eq!(quote.excerpt(100), "All happy families are alike");
        assert_eq!(quote.excerpt(9), "All happy…");
    }
}
