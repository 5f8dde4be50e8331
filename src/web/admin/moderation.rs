use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::ApiError,
    notify::ApprovalNotice,
    web::{
        AppState, auth,
        journals::JournalListResponse,
        models::{JOURNAL_COLUMNS, JournalRow, JournalStatus},
    },
};

#[derive(Deserialize)]
pub struct DecisionPayload {
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Serialize)]
pub struct ApprovalResponse {
    pub message: String,
    pub journal: JournalRow,
    pub email_sent: bool,
}

#[derive(Serialize)]
pub struct RejectionResponse {
    pub message: String,
    pub journal: JournalRow,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

pub async fn list_all_journals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<JournalListResponse>, ApiError> {
    let _admin = auth::require_admin(&state, &headers)?;

    let status = match filter.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            JournalStatus::parse(raw)
                .ok_or_else(|| ApiError::validation("Unknown status filter"))?,
        ),
    };

    let query = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals
         WHERE ($1::text IS NULL OR status = $1)
         ORDER BY created_at DESC"
    );
    let journals = sqlx::query_as::<_, JournalRow>(&query)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(state.pool_ref())
        .await?;

    Ok(Json(JournalListResponse {
        count: journals.len(),
        journals,
    }))
}

pub async fn list_pending_journals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JournalListResponse>, ApiError> {
    let _admin = auth::require_admin(&state, &headers)?;

    let query = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals WHERE status = 'pending'
         ORDER BY created_at DESC"
    );
    let journals = sqlx::query_as::<_, JournalRow>(&query)
        .fetch_all(state.pool_ref())
        .await?;

    Ok(Json(JournalListResponse {
        count: journals.len(),
        journals,
    }))
}

/// Approve a pending journal. The transition is a single check-and-set
/// statement, so of two racing decisions exactly one lands; the loser sees
/// `already_decided`. The approval is committed before the notification goes
/// out, and a failed notification never rolls it back.
pub async fn approve_journal(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let _admin = auth::require_admin(&state, &headers)?;

    let note = payload
        .admin_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let query = format!(
        "UPDATE journals
         SET status = 'approved', approved_at = NOW(), admin_notes = COALESCE($2, admin_notes)
         WHERE id = $1 AND status = 'pending'
         RETURNING {JOURNAL_COLUMNS}"
    );
    let journal = sqlx::query_as::<_, JournalRow>(&query)
        .bind(id)
        .bind(note)
        .fetch_optional(state.pool_ref())
        .await?;

    let Some(journal) = journal else {
        return Err(decision_conflict(&state, id).await?);
    };

    let email_sent = send_approval_notice(&state, &journal).await;

    Ok(Json(ApprovalResponse {
        message: "Journal approved successfully".to_string(),
        journal,
        email_sent,
    }))
}

/// Reject a pending journal. A non-empty note is mandatory; like approve,
/// repeating the decision fails `already_decided` instead of silently
/// re-applying.
pub async fn reject_journal(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> Result<Json<RejectionResponse>, ApiError> {
    let _admin = auth::require_admin(&state, &headers)?;

    let note = payload
        .admin_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("A rejection note is required"))?;

    let query = format!(
        "UPDATE journals
         SET status = 'rejected', admin_notes = $2
         WHERE id = $1 AND status = 'pending'
         RETURNING {JOURNAL_COLUMNS}"
    );
    let journal = sqlx::query_as::<_, JournalRow>(&query)
        .bind(id)
        .bind(note)
        .fetch_optional(state.pool_ref())
        .await?;

    let Some(journal) = journal else {
        return Err(decision_conflict(&state, id).await?);
    };

    Ok(Json(RejectionResponse {
        message: "Journal rejected".to_string(),
        journal,
    }))
}

/// A failed check-and-set means either the journal does not exist or it has
/// already left `pending`. Existence is only probed after the admin gate has
/// passed, so this leaks nothing to unauthorized callers.
async fn decision_conflict(state: &AppState, id: Uuid) -> Result<ApiError, ApiError> {
    let exists: Option<String> = sqlx::query_scalar("SELECT status FROM journals WHERE id = $1")
        .bind(id)
        .fetch_optional(state.pool_ref())
        .await?;

    Ok(match exists {
        Some(_) => ApiError::AlreadyDecided,
        None => ApiError::NotFound("Journal"),
    })
}

async fn send_approval_notice(state: &AppState, journal: &JournalRow) -> bool {
    let owner = sqlx::query_as::<_, (String, String)>("SELECT name, email FROM users WHERE id = $1")
        .bind(journal.uploaded_by)
        .fetch_optional(state.pool_ref())
        .await;

    let (name, email) = match owner {
        Ok(Some(row)) => row,
        Ok(None) => {
            warn!(journal_id = %journal.id, "approval notice skipped: owner account missing");
            return false;
        }
        Err(err) => {
            warn!(?err, journal_id = %journal.id, "approval notice skipped: owner lookup failed");
            return false;
        }
    };

    let notice = ApprovalNotice {
        student_email: email,
        student_name: name,
        journal_title: journal.title.clone(),
        publication_id: journal.publication_id.clone(),
        journal_link: format!("{}/journal/{}", state.config().frontend_url, journal.id),
    };

    match state.mail_client().send_approval(&notice).await {
        Ok(()) => true,
        Err(err) => {
            warn!(?err, journal_id = %journal.id, "approval notification failed");
            false
        }
    }
}
