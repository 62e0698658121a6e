// readstack - Web Server
// JSON API over the library: books, quotes, sessions, goals, stats,
// recommendations, CSV export.
//
// Authentication is delegated to an upstream identity provider: the
// reverse proxy injects the caller's id as the X-User-Id header and
// every query below is scoped by it. A request without the header is
// rejected with 401.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use readstack::{
    compute_streaks, count_periods, db, export_csv_string, recommend, Book, BookStatus,
    GoalProgress, Quote, ReadingSession, Recommendation,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

// ============================================================================
// API Envelope
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn fail(error: &str) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(error.to_string()),
        }
    }
}

fn ok_json<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn fail_json(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::fail(message))).into_response()
}

/// Upstream data-access failures map to one generic failure response;
/// the detail goes to the log, not the client.
fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!("database error: {e:#}");
    fail_json(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn not_found(what: &str) -> Response {
    fail_json(StatusCode::NOT_FOUND, &format!("{what} not found"))
}

// ============================================================================
// Identity
// ============================================================================

/// The caller's user id, injected by the identity-aware proxy.
struct UserId(String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match user {
            Some(user) => Ok(UserId(user.to_string())),
            None => Err(fail_json(
                StatusCode::UNAUTHORIZED,
                "missing X-User-Id header",
            )),
        }
    }
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Deserialize)]
struct CreateBookRequest {
    title: String,
    author: String,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rating: Option<u8>,
    #[serde(default)]
    page_count: Option<u32>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Deserialize)]
struct UpdateBookRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rating: Option<u8>,
    #[serde(default)]
    page_count: Option<u32>,
}

#[derive(Deserialize)]
struct FinishBookRequest {
    /// Calendar day the book was finished; defaults to today (UTC).
    #[serde(default)]
    finished_on: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct BookFilter {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct CreateQuoteRequest {
    book_id: String,
    text: String,
    #[serde(default)]
    page: Option<u32>,
}

#[derive(Deserialize)]
struct QuoteFilter {
    #[serde(default)]
    book_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    book_id: String,
    minutes: u32,
    #[serde(default)]
    occurred_on: Option<NaiveDate>,
    #[serde(default)]
    pages: Option<u32>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
struct GoalRequest {
    target_books: u32,
}

/// The reporting payload: streaks plus period counts, field names fixed
/// by the API contract.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    current_streak: u32,
    longest_streak: u32,
    /// ISO date string or null
    last_read_date: Option<String>,
    total_books_finished: u32,
    books_this_month: u32,
    books_this_year: u32,
}

// ============================================================================
// Books
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ok_json("OK")
}

/// GET /api/books?status= - List the caller's books
async fn list_books(
    State(state): State<AppState>,
    user: UserId,
    Query(filter): Query<BookFilter>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let result = match filter.status.as_deref() {
        None => db::get_books(&conn, &user.0),
        Some(raw) => match BookStatus::parse(raw) {
            Some(status) => db::get_books_by_status(&conn, &user.0, status),
            None => return fail_json(StatusCode::BAD_REQUEST, &format!("unknown status '{raw}'")),
        },
    };

    match result {
        Ok(books) => ok_json(books),
        Err(e) => internal_error(e),
    }
}

/// POST /api/books - Add a book to the caller's shelf
async fn create_book(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<CreateBookRequest>,
) -> Response {
    if req.title.trim().is_empty() || req.author.trim().is_empty() {
        return fail_json(StatusCode::BAD_REQUEST, "title and author are required");
    }

    let genre = req.genre.as_deref().unwrap_or("Uncategorized");
    let mut book = Book::new(&user.0, &req.title, &req.author, genre);

    if let Some(raw) = req.status.as_deref() {
        match BookStatus::parse(raw) {
            Some(status) => book.status = status,
            None => return fail_json(StatusCode::BAD_REQUEST, &format!("unknown status '{raw}'")),
        }
    }
    if let Some(rating) = req.rating {
        if !book.rate(rating) {
            return fail_json(StatusCode::BAD_REQUEST, "rating must be 1-5");
        }
    }
    book.page_count = req.page_count;

    let conn = state.db.lock().unwrap();
    match db::insert_book(&conn, &book) {
        Ok(true) => (StatusCode::CREATED, Json(ApiResponse::ok(book))).into_response(),
        Ok(false) => fail_json(
            StatusCode::CONFLICT,
            "a book with this title and author already exists",
        ),
        Err(e) => internal_error(e),
    }
}

/// GET /api/books/:id
async fn get_book(
    State(state): State<AppState>,
    user: UserId,
    Path(book_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_book(&conn, &user.0, &book_id) {
        Ok(Some(book)) => ok_json(book),
        Ok(None) => not_found("book"),
        Err(e) => internal_error(e),
    }
}

/// PUT /api/books/:id - Partial update of a book's values
async fn update_book(
    State(state): State<AppState>,
    user: UserId,
    Path(book_id): Path<String>,
    Json(req): Json<UpdateBookRequest>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let mut book = match db::get_book(&conn, &user.0, &book_id) {
        Ok(Some(book)) => book,
        Ok(None) => return not_found("book"),
        Err(e) => return internal_error(e),
    };

    if let Some(title) = req.title {
        if title.trim().is_empty() {
            return fail_json(StatusCode::BAD_REQUEST, "title cannot be empty");
        }
        book.title = title.trim().to_string();
    }
    if let Some(author) = req.author {
        if author.trim().is_empty() {
            return fail_json(StatusCode::BAD_REQUEST, "author cannot be empty");
        }
        book.author = author.trim().to_string();
    }
    if let Some(genre) = req.genre {
        book.genre = genre.trim().to_string();
    }
    if let Some(raw) = req.status.as_deref() {
        match BookStatus::parse(raw) {
            Some(status) => book.status = status,
            None => return fail_json(StatusCode::BAD_REQUEST, &format!("unknown status '{raw}'")),
        }
    }
    if let Some(rating) = req.rating {
        if !book.rate(rating) {
            return fail_json(StatusCode::BAD_REQUEST, "rating must be 1-5");
        }
    }
    if let Some(pages) = req.page_count {
        book.page_count = Some(pages);
    }

    match db::update_book(&conn, &book) {
        Ok(true) => ok_json(book),
        Ok(false) => not_found("book"),
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/books/:id
async fn delete_book(
    State(state): State<AppState>,
    user: UserId,
    Path(book_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::delete_book(&conn, &user.0, &book_id) {
        Ok(true) => ok_json("deleted"),
        Ok(false) => not_found("book"),
        Err(e) => internal_error(e),
    }
}

/// POST /api/books/:id/finish - Record the completion event
async fn finish_book(
    State(state): State<AppState>,
    user: UserId,
    Path(book_id): Path<String>,
    Json(req): Json<FinishBookRequest>,
) -> Response {
    let day = req.finished_on.unwrap_or_else(|| Utc::now().date_naive());
    let finished_at = day.and_hms_opt(0, 0, 0).unwrap().and_utc();

    let conn = state.db.lock().unwrap();
    match db::finish_book(&conn, &user.0, &book_id, finished_at) {
        Ok(Some(book)) => ok_json(book),
        Ok(None) => not_found("book"),
        Err(e) => internal_error(e),
    }
}

/// GET /api/books/genre/:genre - Filter by genre (URL-encoded segment)
async fn books_by_genre(
    State(state): State<AppState>,
    user: UserId,
    Path(genre): Path<String>,
) -> Response {
    // Decode URL-encoded genre ("Science%20Fiction")
    let decoded = urlencoding::decode(&genre)
        .unwrap_or_else(|_| genre.clone().into())
        .into_owned();

    let conn = state.db.lock().unwrap();
    match db::get_books_by_genre(&conn, &user.0, &decoded) {
        Ok(books) => ok_json(books),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Quotes
// ============================================================================

/// GET /api/quotes?book_id=
async fn list_quotes(
    State(state): State<AppState>,
    user: UserId,
    Query(filter): Query<QuoteFilter>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let result = match filter.book_id.as_deref() {
        Some(book_id) => db::get_quotes_for_book(&conn, &user.0, book_id),
        None => db::get_quotes(&conn, &user.0),
    };

    match result {
        Ok(quotes) => ok_json(quotes),
        Err(e) => internal_error(e),
    }
}

/// POST /api/quotes
async fn create_quote(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<CreateQuoteRequest>,
) -> Response {
    if req.text.trim().is_empty() {
        return fail_json(StatusCode::BAD_REQUEST, "quote text is required");
    }

    let conn = state.db.lock().unwrap();

    // The quoted book must exist and belong to the caller.
    match db::get_book(&conn, &user.0, &req.book_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("book"),
        Err(e) => return internal_error(e),
    }

    let quote = Quote::new(&user.0, &req.book_id, &req.text, req.page);
    match db::insert_quote(&conn, &quote) {
        Ok(()) => (StatusCode::CREATED, Json(ApiResponse::ok(quote))).into_response(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/quotes/:id
async fn delete_quote(
    State(state): State<AppState>,
    user: UserId,
    Path(quote_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::delete_quote(&conn, &user.0, &quote_id) {
        Ok(true) => ok_json("deleted"),
        Ok(false) => not_found("quote"),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Reading sessions
// ============================================================================

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>, user: UserId) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_sessions(&conn, &user.0) {
        Ok(sessions) => ok_json(sessions),
        Err(e) => internal_error(e),
    }
}

/// POST /api/sessions
async fn create_session(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    if req.minutes == 0 {
        return fail_json(StatusCode::BAD_REQUEST, "minutes must be positive");
    }

    let conn = state.db.lock().unwrap();

    match db::get_book(&conn, &user.0, &req.book_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("book"),
        Err(e) => return internal_error(e),
    }

    let day = req.occurred_on.unwrap_or_else(|| Utc::now().date_naive());
    let mut session = ReadingSession::new(&user.0, &req.book_id, day, req.minutes, req.pages);
    session.notes = req.notes;

    match db::insert_session(&conn, &session) {
        Ok(()) => (StatusCode::CREATED, Json(ApiResponse::ok(session))).into_response(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    user: UserId,
    Path(session_id): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::delete_session(&conn, &user.0, &session_id) {
        Ok(true) => ok_json("deleted"),
        Ok(false) => not_found("session"),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Goals
// ============================================================================

fn finished_in_year(completions: &[DateTime<Utc>], year: i32) -> u32 {
    completions
        .iter()
        .filter(|ts| ts.date_naive().year() == year)
        .count() as u32
}

/// GET /api/goals/:year - Goal progress for one year
async fn get_goal(
    State(state): State<AppState>,
    user: UserId,
    Path(year): Path<i32>,
) -> Response {
    let conn = state.db.lock().unwrap();

    let goal = match db::get_goal(&conn, &user.0, year) {
        Ok(Some(goal)) => goal,
        Ok(None) => return not_found("goal"),
        Err(e) => return internal_error(e),
    };

    let completions = match db::get_completion_dates(&conn, &user.0) {
        Ok(completions) => completions,
        Err(e) => return internal_error(e),
    };

    let progress = GoalProgress::compute(
        &goal,
        finished_in_year(&completions, year),
        Utc::now().date_naive(),
    );
    ok_json(progress)
}

/// PUT /api/goals/:year - Set (or replace) the yearly target
async fn put_goal(
    State(state): State<AppState>,
    user: UserId,
    Path(year): Path<i32>,
    Json(req): Json<GoalRequest>,
) -> Response {
    if req.target_books == 0 {
        return fail_json(StatusCode::BAD_REQUEST, "target_books must be positive");
    }

    let conn = state.db.lock().unwrap();

    let goal = match db::upsert_goal(&conn, &user.0, year, req.target_books) {
        Ok(goal) => goal,
        Err(e) => return internal_error(e),
    };

    let completions = match db::get_completion_dates(&conn, &user.0) {
        Ok(completions) => completions,
        Err(e) => return internal_error(e),
    };

    let progress = GoalProgress::compute(
        &goal,
        finished_in_year(&completions, year),
        Utc::now().date_naive(),
    );
    ok_json(progress)
}

// ============================================================================
// Stats & recommendations
// ============================================================================

/// GET /api/stats - The reporting endpoint: fetch the caller's
/// completion timestamps once, run the two pure calculators, serialize.
async fn get_stats(State(state): State<AppState>, user: UserId) -> Response {
    let conn = state.db.lock().unwrap();

    let completions = match db::get_completion_dates(&conn, &user.0) {
        Ok(completions) => completions,
        Err(e) => return internal_error(e),
    };

    let today = Utc::now().date_naive();
    let streaks = compute_streaks(&completions, today);
    let periods = count_periods(&completions, today);

    ok_json(StatsResponse {
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
        last_read_date: streaks
            .last_completion_date
            .map(|d| d.format("%Y-%m-%d").to_string()),
        total_books_finished: periods.all_time,
        books_this_month: periods.this_month,
        books_this_year: periods.this_year,
    })
}

/// GET /api/recommendations - Rank the caller's backlog by taste
async fn get_recommendations(State(state): State<AppState>, user: UserId) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_books(&conn, &user.0) {
        Ok(books) => {
            let recs: Vec<Recommendation> = recommend(&books, 10);
            ok_json(recs)
        }
        Err(e) => internal_error(e),
    }
}

/// GET /api/export - The caller's library as CSV
async fn export_library(State(state): State<AppState>, user: UserId) -> Response {
    let conn = state.db.lock().unwrap();

    match export_csv_string(&conn, &user.0) {
        Ok(csv) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            csv,
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path =
        std::env::var("READSTACK_DB").unwrap_or_else(|_| "readstack.db".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open database");
    readstack::setup_database(&conn).expect("Failed to initialize schema");
    tracing::info!("database ready at {db_path}");

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/books/:id/finish", post(finish_book))
        .route("/books/genre/:genre", get(books_by_genre))
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/:id", delete(delete_quote))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/goals/:year", get(get_goal).put(put_goal))
        .route("/stats", get(get_stats))
        .route("/recommendations", get(get_recommendations))
        .route("/export", get(export_library))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr =
        std::env::var("READSTACK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("readstack {} listening on http://{addr}", readstack::VERSION);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
