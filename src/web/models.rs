use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Account role. Assigned at creation and never changed afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Moderation status of a journal. `pending` is the only state with outgoing
/// transitions; `approved` and `rejected` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JournalStatus {
    Pending,
    Approved,
    Rejected,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Pending => "pending",
            JournalStatus::Approved => "approved",
            JournalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JournalStatus::Pending),
            "approved" => Some(JournalStatus::Approved),
            "rejected" => Some(JournalStatus::Rejected),
            _ => None,
        }
    }
}

/// Submitter-chosen exposure class, orthogonal to moderation status. A
/// private journal never shows up in the public listing, approved or not.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub college: String,
    pub department: String,
    pub year: String,
}

#[derive(Clone, FromRow, Serialize)]
pub struct StudentProfileRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub college: String,
    pub department: String,
    pub year: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, FromRow, Serialize)]
pub struct JournalRow {
    pub id: Uuid,
    pub title: String,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub primary_author: String,
    pub college: String,
    pub department: String,
    pub year: String,
    pub keywords: Vec<String>,
    pub pdf_path: String,
    pub visibility: String,
    pub status: String,
    pub publication_id: String,
    pub download_count: i64,
    pub admin_notes: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

pub const JOURNAL_COLUMNS: &str = "id, title, abstract, authors, primary_author, college, \
     department, year, keywords, pdf_path, visibility, status, publication_id, \
     download_count, admin_notes, uploaded_by, created_at, approved_at";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_round_trips() {
        for status in [
            JournalStatus::Pending,
            JournalStatus::Approved,
            JournalStatus::Rejected,
        ] {
            assert_eq!(JournalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JournalStatus::parse("published"), None);
    }

    #[test]
    fn visibility_rejects_unknown_values() {
        assert_eq!(Visibility::parse("public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("Private"), None);
        assert_eq!(Visibility::parse(""), None);
    }
}
