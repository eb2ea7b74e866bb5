//! Project model and queries
//!
//! Every read and write is scoped by the owning user where the caller's
//! identity is known; mutation helpers always bump `updated_at`.
//!
//! Transcript-state invariants maintained here:
//! - `provider_used = "failed"` goes together with a non-null `last_error`
//!   and clears any transcript from the failed attempt
//! - `transcript_id` is only set when the primary vendor produced the text

use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Provider tag recorded when every vendor failed
pub const PROVIDER_FAILED: &str = "failed";

/// Media source kind for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Upload,
    Url,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Upload => "upload",
            SourceKind::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upload" => Some(SourceKind::Upload),
            "url" => Some(SourceKind::Url),
            _ => None,
        }
    }
}

/// A transcription project: one media source and its transcript outcome
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub source_type: String,
    pub source_url: Option<String>,
    pub file_key: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_mime: Option<String>,
    pub transcript_text: Option<String>,
    pub transcript_id: Option<String>,
    pub provider_used: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::parse(&self.source_type)
    }
}

/// Insert a new project and return the stored row
pub async fn create(
    pool: &SqlitePool,
    user_id: &str,
    title: &str,
    source_kind: SourceKind,
    source_url: Option<&str>,
) -> Result<Project> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects (user_id, title, source_type, source_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, datetime('now'), datetime('now'))
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(source_kind.as_str())
    .bind(source_url)
    .execute(pool)
    .await?;

    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await?;

    Ok(project)
}

/// Fetch one project owned by `user_id`
pub async fn get(pool: &SqlitePool, id: i64, user_id: &str) -> Result<Option<Project>> {
    let project =
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(project)
}

/// List the user's projects, newest first
pub async fn list(pool: &SqlitePool, user_id: &str) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

/// Record an uploaded file's storage key and metadata
pub async fn attach_file(
    pool: &SqlitePool,
    id: i64,
    file_key: &str,
    file_name: &str,
    file_size: i64,
    file_mime: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET file_key = ?, file_name = ?, file_size = ?, file_mime = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(file_key)
    .bind(file_name)
    .bind(file_size)
    .bind(file_mime)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a successful transcription outcome
pub async fn set_transcript(
    pool: &SqlitePool,
    id: i64,
    text: &str,
    transcript_id: Option<&str>,
    provider: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET transcript_text = ?, transcript_id = ?, provider_used = ?, last_error = NULL,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(text)
    .bind(transcript_id)
    .bind(provider)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist transcript text edited by the user, leaving provider fields alone
pub async fn set_transcript_text(pool: &SqlitePool, id: i64, text: &str) -> Result<()> {
    sqlx::query(
        "UPDATE projects SET transcript_text = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(text)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist total provider exhaustion for a transcription attempt
pub async fn set_failed(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET provider_used = ?, last_error = ?, transcript_text = NULL, transcript_id = NULL,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(PROVIDER_FAILED)
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record an unexpected error for later diagnostic inspection
pub async fn set_last_error(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query("UPDATE projects SET last_error = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let pool = setup_test_db().await;

        let created = create(&pool, "user-1", "Interview", SourceKind::Upload, None)
            .await
            .unwrap();
        assert_eq!(created.source_type, "upload");
        assert!(created.transcript_text.is_none());
        assert!(created.provider_used.is_none());

        let fetched = get(&pool, created.id, "user-1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Interview");
    }

    #[tokio::test]
    async fn get_is_owner_scoped() {
        let pool = setup_test_db().await;

        let created = create(&pool, "user-1", "Mine", SourceKind::Url, Some("https://x/a.mp3"))
            .await
            .unwrap();

        assert!(get(&pool, created.id, "user-2").await.unwrap().is_none());
        assert!(get(&pool, created.id, "user-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_returns_only_own_projects() {
        let pool = setup_test_db().await;

        create(&pool, "user-1", "A", SourceKind::Upload, None).await.unwrap();
        create(&pool, "user-2", "B", SourceKind::Upload, None).await.unwrap();
        create(&pool, "user-1", "C", SourceKind::Upload, None).await.unwrap();

        let mine = list(&pool, "user-1").await.unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first
        assert_eq!(mine[0].title, "C");
    }

    #[tokio::test]
    async fn set_transcript_fills_provider_fields() {
        let pool = setup_test_db().await;
        let project = create(&pool, "u", "T", SourceKind::Upload, None).await.unwrap();

        set_transcript(&pool, project.id, "hello world", Some("tr-123"), "assemblyai")
            .await
            .unwrap();

        let updated = get(&pool, project.id, "u").await.unwrap().unwrap();
        assert_eq!(updated.transcript_text.as_deref(), Some("hello world"));
        assert_eq!(updated.transcript_id.as_deref(), Some("tr-123"));
        assert_eq!(updated.provider_used.as_deref(), Some("assemblyai"));
        assert!(updated.last_error.is_none());
    }

    #[tokio::test]
    async fn set_failed_clears_transcript_and_records_error() {
        let pool = setup_test_db().await;
        let project = create(&pool, "u", "T", SourceKind::Upload, None).await.unwrap();

        set_transcript(&pool, project.id, "stale", None, "openai").await.unwrap();
        set_failed(&pool, project.id, "all vendors failed").await.unwrap();

        let updated = get(&pool, project.id, "u").await.unwrap().unwrap();
        assert_eq!(updated.provider_used.as_deref(), Some(PROVIDER_FAILED));
        assert_eq!(updated.last_error.as_deref(), Some("all vendors failed"));
        assert!(updated.transcript_text.is_none());
        assert!(updated.transcript_id.is_none());
    }

    #[tokio::test]
    async fn attach_file_fills_file_columns() {
        let pool = setup_test_db().await;
        let project = create(&pool, "u", "T", SourceKind::Upload, None).await.unwrap();

        attach_file(&pool, project.id, "projects/1/a.mp3", "a.mp3", 1234, "audio/mpeg")
            .await
            .unwrap();

        let updated = get(&pool, project.id, "u").await.unwrap().unwrap();
        assert_eq!(updated.file_key.as_deref(), Some("projects/1/a.mp3"));
        assert_eq!(updated.file_size, Some(1234));
    }
}
