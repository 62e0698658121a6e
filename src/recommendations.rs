// 💡 Recommendations - Genre/author heuristics over the user's own shelf
//
// Scores unread (to-read) books against the user's finished, rated
// history. No external catalog: the signal is entirely "what did this
// user rate highly, and does the backlog have more of it".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Book, BookStatus};

// ============================================================================
// RECOMMENDATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub genre: String,

    /// Heuristic score; higher is a stronger match
    pub score: f64,

    /// Human-readable signals behind the score
    pub reasons: Vec<String>,
}

// ============================================================================
// TASTE PROFILE
// ============================================================================

/// Mean rating per key (lowercased genre or author), with the sample size.
struct Affinity {
    sum: f64,
    count: u32,
}

impl Affinity {
    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Signal strength centered on the neutral rating 3: a genre rated
    /// 4.5 on average pulls +1.5, one rated 2.0 pushes -1.0.
    fn weight(&self) -> f64 {
        self.mean() - 3.0
    }
}

fn build_profile<'a>(
    finished: impl Iterator<Item = &'a Book>,
    key: impl Fn(&Book) -> String,
) -> HashMap<String, Affinity> {
    let mut profile: HashMap<String, Affinity> = HashMap::new();

    for book in finished {
        // Unrated books carry no taste signal.
        let Some(rating) = book.rating else { continue };

        let entry = profile
            .entry(key(book))
            .or_insert(Affinity { sum: 0.0, count: 0 });
        entry.sum += rating as f64;
        entry.count += 1;
    }

    profile
}

// ============================================================================
// RECOMMENDER
// ============================================================================

/// Author affinity counts for more than genre affinity: liking one
/// specific author is a stronger signal than liking a whole genre.
const AUTHOR_WEIGHT: f64 = 1.5;

/// Rank the user's to-read backlog by genre/author affinity.
///
/// Only books with a positive score are returned: a backlog book from a
/// poorly-rated genre is silently left out rather than ranked last.
pub fn recommend(library: &[Book], limit: usize) -> Vec<Recommendation> {
    let finished: Vec<&Book> = library.iter().filter(|b| b.is_finished()).collect();

    let genre_profile = build_profile(finished.iter().copied(), |b| b.genre.to_lowercase());
    let author_profile = build_profile(finished.iter().copied(), |b| b.author.to_lowercase());

    let mut recommendations: Vec<Recommendation> = library
        .iter()
        .filter(|b| b.status == BookStatus::ToRead)
        .filter_map(|candidate| {
            let mut score = 0.0;
            let mut reasons = Vec::new();

            if let Some(affinity) = genre_profile.get(&candidate.genre.to_lowercase()) {
                score += affinity.weight();
                reasons.push(format!(
                    "you rated {} {} book(s) {:.1} on average",
                    affinity.count,
                    candidate.genre,
                    affinity.mean()
                ));
            }

            if let Some(affinity) = author_profile.get(&candidate.author.to_lowercase()) {
                score += AUTHOR_WEIGHT * affinity.weight();
                reasons.push(format!(
                    "you rated {} book(s) by {} {:.1} on average",
                    affinity.count,
                    candidate.author,
                    affinity.mean()
                ));
            }

            if score <= 0.0 {
                return None;
            }

            Some(Recommendation {
                book_id: candidate.id.clone(),
                title: candidate.title.clone(),
                author: candidate.author.clone(),
                genre: candidate.genre.clone(),
                score,
                reasons,
            })
        })
        .collect();

    // Deterministic order: score descending, title as tiebreak.
    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    recommendations.truncate(limit);

    recommendations
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn finished_rated(title: &str, author: &str, genre: &str, rating: u8) -> Book {
        let mut book = Book::new("user-1", title, author, genre);
        book.finish(Utc::now());
        assert!(book.rate(rating));
        book
    }

    fn backlog(title: &str, author: &str, genre: &str) -> Book {
        Book::new("user-1", title, author, genre)
    }

    #[test]
    fn test_no_history_means_no_recommendations() {
        let library = vec![backlog("Dune", "Frank Herbert", "Science Fiction")];

        assert!(recommend(&library, 10).is_empty());
    }

    #[test]
    fn test_genre_affinity_surfaces_backlog() {
        let library = vec![
            finished_rated("Hyperion", "Dan Simmons", "Science Fiction", 5),
            finished_rated("Neuromancer", "William Gibson", "Science Fiction", 4),
            backlog("Dune", "Frank Herbert", "Science Fiction"),
            backlog("Emma", "Jane Austen", "Classic"),
        ];

        let recs = recommend(&library, 10);

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Dune");
        assert!(recs[0].score > 0.0);
        assert_eq!(recs[0].reasons.len(), 1);
    }

    #[test]
    fn test_author_match_outranks_genre_only() {
        let library = vec![
            finished_rated("Hyperion", "Dan Simmons", "Science Fiction", 4),
            finished_rated("Ilium", "Dan Simmons", "Science Fiction", 5),
            backlog("Olympos", "Dan Simmons", "Science Fiction"),
            backlog("Neuromancer", "William Gibson", "Science Fiction"),
        ];

        let recs = recommend(&library, 10);

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].title, "Olympos");
        assert!(recs[0].score > recs[1].score);
        assert_eq!(recs[0].reasons.len(), 2);
    }

    #[test]
    fn test_disliked_genre_is_not_recommended() {
        let library = vec![
            finished_rated("Book One", "Some Author", "Horror", 1),
            finished_rated("Book Two", "Other Author", "Horror", 2),
            backlog("Book Three", "Third Author", "Horror"),
        ];

        assert!(recommend(&library, 10).is_empty());
    }

    #[test]
    fn test_unrated_finished_books_carry_no_signal() {
        let mut unrated = Book::new("user-1", "Hyperion", "Dan Simmons", "Science Fiction");
        unrated.finish(Utc::now());

        let library = vec![
            unrated,
            backlog("Dune", "Frank Herbert", "Science Fiction"),
        ];

        assert!(recommend(&library, 10).is_empty());
    }

    #[test]
    fn test_only_backlog_books_are_candidates() {
        let mut reading = Book::new("user-1", "Ilium", "Dan Simmons", "Science Fiction");
        reading.status = BookStatus::Reading;

        let library = vec![
            finished_rated("Hyperion", "Dan Simmons", "Science Fiction", 5),
            reading,
        ];

        // The in-progress book matches on both signals but is not ToRead.
        assert!(recommend(&library, 10).is_empty());
    }

    #[test]
    fn test_limit_is_respected() {
        let library = vec![
            finished_rated("Hyperion", "Dan Simmons", "Science Fiction", 5),
            backlog("Dune", "Frank Herbert", "Science Fiction"),
            backlog("Neuromancer", "William Gibson", "Science Fiction"),
            backlog("Foundation", "Isaac Asimov", "Science Fiction"),
        ];

        assert_eq!(recommend(&library, 2).len(), 2);
    }
}
