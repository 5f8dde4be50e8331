use axum::{
    Json,
    extract::{Path as AxumPath, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    web::{
        AppState,
        models::{JOURNAL_COLUMNS, JournalRow, StudentProfileRow},
    },
};

/// Public porthole payload: profile, full submission history, and aggregate
/// status counts.
#[derive(Serialize)]
pub struct PortholeResponse {
    pub student: StudentProfileRow,
    pub journals: Vec<PortholeJournal>,
    pub stats: PortholeStats,
}

#[derive(Serialize)]
pub struct PortholeJournal {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub publication_id: String,
    pub status: String,
    pub visibility: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<JournalRow> for PortholeJournal {
    fn from(journal: JournalRow) -> Self {
        Self {
            id: journal.id,
            title: journal.title,
            abstract_text: journal.abstract_text,
            publication_id: journal.publication_id,
            status: journal.status,
            visibility: journal.visibility,
            download_count: journal.download_count,
            created_at: journal.created_at,
            approved_at: journal.approved_at,
        }
    }
}

#[derive(Serialize)]
pub struct PortholeStats {
    pub total_journals: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

pub async fn porthole(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<PortholeResponse>, ApiError> {
    let student = sqlx::query_as::<_, StudentProfileRow>(
        "SELECT id, name, email, college, department, year, created_at
         FROM users WHERE id = $1 AND role = 'student'",
    )
    .bind(id)
    .fetch_optional(state.pool_ref())
    .await?
    .ok_or(ApiError::NotFound("Student"))?;

    let query = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals WHERE uploaded_by = $1 ORDER BY created_at DESC"
    );
    let journals = sqlx::query_as::<_, JournalRow>(&query)
        .bind(student.id)
        .fetch_all(state.pool_ref())
        .await?;

    let stats = PortholeStats {
        total_journals: journals.len(),
        approved: journals.iter().filter(|j| j.status == "approved").count(),
        pending: journals.iter().filter(|j| j.status == "pending").count(),
        rejected: journals.iter().filter(|j| j.status == "rejected").count(),
    };

    Ok(Json(PortholeResponse {
        student,
        journals: journals.into_iter().map(PortholeJournal::from).collect(),
        stats,
    }))
}
