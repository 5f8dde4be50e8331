use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::{
    config::MAX_PDF_BYTES,
    web::{AppState, admin, auth, journals, students},
};

// Headroom for the multipart framing around a maximum-size PDF.
const BODY_LIMIT: usize = (MAX_PDF_BYTES as usize) + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/admin-login", post(auth::admin_login))
        .route("/api/journals", post(journals::upload_journal))
        .route("/api/journals", get(journals::list_public))
        .route("/api/journals/mine", get(journals::list_mine))
        .route("/api/journals/:id", get(journals::get_journal))
        .route("/api/journals/:id/file", get(journals::download_journal_file))
        .route("/api/students/:id/porthole", get(students::porthole))
        .route("/api/admin/journals", get(admin::list_all_journals))
        .route(
            "/api/admin/journals/pending",
            get(admin::list_pending_journals),
        )
        .route("/api/admin/journals/:id/approve", put(admin::approve_journal))
        .route("/api/admin/journals/:id/reject", put(admin::reject_journal))
        .route("/api/admin/stats", get(admin::dashboard_stats))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
