use axum::{
    Json,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::{
    config::{MAX_PDF_BYTES, PUBLICATION_PREFIX},
    error::ApiError,
    web::{
        AppState, auth,
        models::{JOURNAL_COLUMNS, JournalRow, Visibility},
        storage,
    },
};

const PDF_FIELD: &str = "pdf";

#[derive(Serialize)]
pub struct JournalListResponse {
    pub count: usize,
    pub journals: Vec<JournalRow>,
}

#[derive(Serialize)]
pub struct JournalResponse {
    pub journal: JournalRow,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub journal: UploadedJournal,
}

#[derive(Serialize)]
pub struct UploadedJournal {
    pub id: Uuid,
    pub title: String,
    pub publication_id: String,
    pub status: String,
    pub pdf_filename: String,
}

/// Named optional filters for the public listing. Each one compiles to a
/// case-insensitive substring match; present filters are AND-combined.
#[derive(Debug, Default, Deserialize)]
pub struct JournalFilters {
    pub college: Option<String>,
    pub department: Option<String>,
    pub keyword: Option<String>,
}

impl JournalFilters {
    fn college_pattern(&self) -> Option<String> {
        normalized_pattern(self.college.as_deref())
    }

    fn department_pattern(&self) -> Option<String> {
        normalized_pattern(self.department.as_deref())
    }

    fn keyword_pattern(&self) -> Option<String> {
        normalized_pattern(self.keyword.as_deref())
    }
}

fn normalized_pattern(value: Option<&str>) -> Option<String> {
    let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
    Some(like_pattern(trimmed))
}

/// Wrap user input in a substring ILIKE pattern, escaping the wildcard
/// characters so they match literally.
fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{escaped}%")
}

fn format_publication_id(year: i32, sequence: i64) -> String {
    format!("{PUBLICATION_PREFIX}-{year}-{sequence:04}")
}

/// Split a comma-separated form value into trimmed, non-empty entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

struct UploadForm {
    title: String,
    abstract_text: String,
    authors: Vec<String>,
    primary_author: String,
    keywords: Vec<String>,
    visibility: Visibility,
    pdf_bytes: Vec<u8>,
}

/// Drain the multipart stream. The PDF is held in memory (its size is capped
/// well below the limit check) so nothing touches disk until every text field
/// has validated.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut title = None;
    let mut abstract_text = None;
    let mut authors = None;
    let mut primary_author = None;
    let mut keywords = None;
    let mut visibility = None;
    let mut agreement = None;
    let mut pdf_bytes: Option<Vec<u8>> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::validation(format!("Malformed upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_some() {
            if field_name != PDF_FIELD {
                return Err(ApiError::validation(format!(
                    "Unexpected file field `{field_name}`"
                )));
            }
            if pdf_bytes.is_some() {
                return Err(ApiError::validation("Only one PDF may be uploaded"));
            }

            // Content type is rejected before a single byte is read.
            let content_type = field.content_type().unwrap_or("");
            if content_type != mime::APPLICATION_PDF.as_ref() {
                return Err(ApiError::UnsupportedType);
            }

            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|err| ApiError::validation(format!("Failed to read upload: {err}")))?
            {
                if (buffer.len() + chunk.len()) as u64 > MAX_PDF_BYTES {
                    return Err(ApiError::SizeLimitExceeded(MAX_PDF_BYTES / (1024 * 1024)));
                }
                buffer.extend_from_slice(&chunk);
            }
            pdf_bytes = Some(buffer);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| ApiError::validation(format!("Failed to read field: {err}")))?;

        match field_name.as_str() {
            "title" => title = Some(value),
            "abstract" => abstract_text = Some(value),
            "authors" => authors = Some(value),
            "primary_author" => primary_author = Some(value),
            "keywords" => keywords = Some(value),
            "visibility" => visibility = Some(value),
            "agreement_accepted" => agreement = Some(value),
            _ => {}
        }
    }

    let title = require_text(title, "Title is required")?;
    let abstract_text = require_text(abstract_text, "Abstract is required")?;
    let primary_author = require_text(primary_author, "Primary author is required")?;

    let authors = split_list(authors.as_deref().unwrap_or(""));
    if authors.is_empty() {
        return Err(ApiError::validation("Authors are required"));
    }

    let keywords = split_list(keywords.as_deref().unwrap_or(""));

    let visibility = match visibility.as_deref().map(str::trim) {
        None | Some("") => Visibility::Public,
        Some(raw) => Visibility::parse(raw)
            .ok_or_else(|| ApiError::validation("Visibility must be public or private"))?,
    };

    let agreement = agreement.ok_or_else(|| ApiError::validation("You must accept the agreement"))?;
    if !auth::parse_agreement(&Value::String(agreement))? {
        return Err(ApiError::validation("You must accept the agreement"));
    }

    let pdf_bytes = pdf_bytes.ok_or_else(|| ApiError::validation("PDF file is required"))?;
    if pdf_bytes.is_empty() {
        return Err(ApiError::validation("PDF file is required"));
    }

    Ok(UploadForm {
        title,
        abstract_text,
        authors,
        primary_author,
        keywords,
        visibility,
        pdf_bytes,
    })
}

fn require_text(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

pub async fn upload_journal(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let user = auth::require_student(&state, &headers)?;

    let form = read_upload_form(multipart).await?;

    // Institution attributes are copied from the uploader's current profile
    // at creation time and never re-derived later.
    let profile = sqlx::query_as::<_, (String, String, String)>(
        "SELECT college, department, year FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_optional(state.pool_ref())
    .await?
    .ok_or(ApiError::Unauthorized)?;
    let (college, department, year) = profile;

    let storage_root = state.config().storage_root.clone();
    let artifact = storage::store_pdf(&storage_root, &form.title, &form.pdf_bytes).await?;

    // Everything after this point must unwind the stored file on failure so
    // no orphan remains on disk.
    match insert_journal(&state, user.id, &form, &artifact, college, department, year).await {
        Ok(journal) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "Journal uploaded successfully".to_string(),
                journal,
            }),
        )),
        Err(err) => {
            storage::remove_artifact(&storage_root, &artifact.stored_name).await;
            Err(err)
        }
    }
}

async fn insert_journal(
    state: &AppState,
    owner_id: Uuid,
    form: &UploadForm,
    artifact: &storage::StoredArtifact,
    college: String,
    department: String,
    year: String,
) -> Result<UploadedJournal, ApiError> {
    let mut tx = state.pool_ref().begin().await?;

    // Publication ids are allocated from a per-year counter under row-level
    // serialization, so two concurrent uploads cannot observe the same value.
    let current_year = Utc::now().year();
    let sequence: i64 = sqlx::query_scalar(
        "INSERT INTO publication_sequences (year, value) VALUES ($1, 1)
         ON CONFLICT (year) DO UPDATE SET value = publication_sequences.value + 1
         RETURNING value",
    )
    .bind(current_year)
    .fetch_one(&mut *tx)
    .await?;
    let publication_id = format_publication_id(current_year, sequence);

    let journal_id = Uuid::new_v4();
    let insert = sqlx::query(
        "INSERT INTO journals
             (id, title, abstract, authors, primary_author, college, department, year,
              keywords, pdf_path, visibility, status, publication_id, uploaded_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13)",
    )
    .bind(journal_id)
    .bind(&form.title)
    .bind(&form.abstract_text)
    .bind(&form.authors)
    .bind(&form.primary_author)
    .bind(&college)
    .bind(&department)
    .bind(&year)
    .bind(&form.keywords)
    .bind(&artifact.stored_name)
    .bind(form.visibility.as_str())
    .bind(&publication_id)
    .bind(owner_id)
    .execute(&mut *tx)
    .await;

    if let Err(err) = insert {
        error!(?err, "failed to insert journal record");
        let _ = tx.rollback().await;
        return Err(err.into());
    }

    tx.commit().await?;

    Ok(UploadedJournal {
        id: journal_id,
        title: form.title.clone(),
        publication_id,
        status: "pending".to_string(),
        pdf_filename: artifact.stored_name.clone(),
    })
}

/// Public catalogue: approved and public journals only, newest first.
pub async fn list_public(
    State(state): State<AppState>,
    Query(filters): Query<JournalFilters>,
) -> Result<Json<JournalListResponse>, ApiError> {
    let query = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals
         WHERE status = 'approved' AND visibility = 'public'
           AND ($1::text IS NULL OR college ILIKE $1)
           AND ($2::text IS NULL OR department ILIKE $2)
           AND ($3::text IS NULL OR array_to_string(keywords, ',') ILIKE $3)
         ORDER BY created_at DESC"
    );

    let journals = sqlx::query_as::<_, JournalRow>(&query)
        .bind(filters.college_pattern())
        .bind(filters.department_pattern())
        .bind(filters.keyword_pattern())
        .fetch_all(state.pool_ref())
        .await?;

    Ok(Json(JournalListResponse {
        count: journals.len(),
        journals,
    }))
}

/// Full history for the caller, with no status or visibility restriction.
pub async fn list_mine(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JournalListResponse>, ApiError> {
    let user = auth::require_user(&state, &headers)?;

    let query = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals WHERE uploaded_by = $1 ORDER BY created_at DESC"
    );
    let journals = sqlx::query_as::<_, JournalRow>(&query)
        .bind(user.id)
        .fetch_all(state.pool_ref())
        .await?;

    Ok(Json(JournalListResponse {
        count: journals.len(),
        journals,
    }))
}

/// Single-record fetch. Every successful call bumps the download counter by
/// exactly one, with no de-duplication by caller; the increment and the read
/// happen in one statement.
pub async fn get_journal(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<JournalResponse>, ApiError> {
    let query = format!(
        "UPDATE journals SET download_count = download_count + 1
         WHERE id = $1
         RETURNING {JOURNAL_COLUMNS}"
    );

    let journal = sqlx::query_as::<_, JournalRow>(&query)
        .bind(id)
        .fetch_optional(state.pool_ref())
        .await?
        .ok_or(ApiError::NotFound("Journal"))?;

    Ok(Json(JournalResponse { journal }))
}

/// Stream the stored artifact. Does not touch the download counter; the
/// record fetch path owns that side effect.
pub async fn download_journal_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Response, ApiError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT pdf_path, publication_id FROM journals WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(state.pool_ref())
    .await?
    .ok_or(ApiError::NotFound("Journal"))?;
    let (pdf_path, publication_id) = row;

    let download_name = format!("{publication_id}.pdf");
    storage::stream_pdf(&state.config().storage_root, &pdf_path, &download_name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_id_pads_to_four_digits() {
        assert_eq!(format_publication_id(2025, 1), "JRNL-2025-0001");
        assert_eq!(format_publication_id(2025, 482), "JRNL-2025-0482");
        assert_eq!(format_publication_id(2026, 12345), "JRNL-2026-12345");
    }

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(
            split_list("Ana Li , , Ben Okafor,Chloe Zhang"),
            vec!["Ana Li", "Ben Okafor", "Chloe Zhang"]
        );
        assert!(split_list("  ,  ,").is_empty());
        assert!(split_list("").is_empty());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100% sound"), "%100\\% sound%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn filters_normalize_blank_values_to_none() {
        let filters = JournalFilters {
            college: Some("  ".to_string()),
            department: Some(" Architecture ".to_string()),
            keyword: None,
        };
        assert_eq!(filters.college_pattern(), None);
        assert_eq!(
            filters.department_pattern(),
            Some("%Architecture%".to_string())
        );
        assert_eq!(filters.keyword_pattern(), None);
    }
}
