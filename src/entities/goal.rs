// 🎯 Reading Goal Entity - Yearly target book count

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's goal for one calendar year: "finish N books".
/// One goal per (user, year); setting it again replaces the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingGoal {
    /// Stable identity (UUID)
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Calendar year the goal applies to
    pub year: i32,

    /// Books to finish within the year
    pub target_books: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReadingGoal {
    pub fn new(user_id: &str, year: i32, target_books: u32) -> Self {
        let now = Utc::now();
        ReadingGoal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            year,
            target_books,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_goal() {
        let goal = ReadingGoal::new("user-1", 2025, 24);

        assert!(!goal.id.is_empty());
        assert_eq!(goal.year, 2025);
        assert_eq!(goal.target_books, 24);
    }
}
