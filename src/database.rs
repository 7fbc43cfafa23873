use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

use crate::assistant::word_count;
use crate::config::Config;
use crate::models::*;

pub const MIN_FAMILIARITY: i64 = 1;
pub const MAX_FAMILIARITY: i64 = 5;
pub const MASTERED_FAMILIARITY: i64 = 4;

#[derive(Debug, sqlx::FromRow)]
struct SubmissionRow {
    id: i64,
    user_id: String,
    task_type: String,
    content: String,
    band_score: f64,
    feedback: String,
    created_at: String,
}

impl SubmissionRow {
    fn into_submission(self) -> Result<WritingSubmission> {
        let feedback: Feedback = serde_json::from_str(&self.feedback)
            .map_err(|e| {
                anyhow::anyhow!("stored feedback for submission {} is corrupt: {}", self.id, e)
            })?;
        Ok(WritingSubmission {
            id: self.id,
            user_id: self.user_id,
            task_type: self.task_type,
            content: self.content,
            band_score: self.band_score,
            feedback,
            created_at: self.created_at,
        })
    }
}

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = std::env::current_dir()?.join(&config.database.db_file);
        Self::open(&db_path).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}", db_path.display());

        info!("connecting to database {}", db_path.display());

        // sqlx will not create a missing file
        if !db_path.exists() {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(db_path)?;
            info!("created database file {}", db_path.display());
        }

        let pool = SqlitePool::connect(&db_url).await?;

        let manager = DatabaseManager { pool };
        manager.initialize_tables().await?;

        Ok(manager)
    }

    async fn initialize_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS writing_submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                content TEXT NOT NULL,
                band_score REAL NOT NULL,
                feedback TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_submissions_user ON writing_submissions (user_id, created_at)"
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vocab_progress (
                user_id TEXT NOT NULL,
                word TEXT NOT NULL,
                familiarity INTEGER NOT NULL,
                last_review TEXT NOT NULL,
                topic TEXT NOT NULL DEFAULT 'General',
                PRIMARY KEY (user_id, word)
            )
            "#
        ).execute(&self.pool).await?;

        debug!("database tables ready");
        Ok(())
    }

    // Store a scored essay; id and timestamp are assigned here
    pub async fn save_submission(&self, submission: NewSubmission) -> Result<WritingSubmission> {
        let created_at = timestamp();
        let feedback_json = serde_json::to_string(&submission.feedback)?;

        let result = sqlx::query(
            "INSERT INTO writing_submissions (user_id, task_type, content, band_score, feedback, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&submission.user_id)
        .bind(&submission.task_type)
        .bind(&submission.content)
        .bind(submission.band_score)
        .bind(&feedback_json)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(
            id,
            user = %submission.user_id,
            band = submission.band_score,
            "saved writing submission"
        );

        Ok(WritingSubmission {
            id,
            user_id: submission.user_id,
            task_type: submission.task_type,
            content: submission.content,
            band_score: submission.band_score,
            feedback: submission.feedback,
            created_at,
        })
    }

    // Newest first
    pub async fn get_submissions(&self, user_id: &str) -> Result<Vec<WritingSubmission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, user_id, task_type, content, band_score, feedback, created_at FROM writing_submissions WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRow::into_submission).collect()
    }

    pub async fn get_submission(&self, id: i64) -> Result<Option<WritingSubmission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, user_id, task_type, content, band_score, feedback, created_at FROM writing_submissions WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubmissionRow::into_submission).transpose()
    }

    // Weakest words first
    pub async fn get_at_risk_vocab(
        &self,
        user_id: &str,
        count: usize,
    ) -> Result<Vec<VocabProgress>> {
        let words = sqlx::query_as::<_, VocabProgress>(
            "SELECT user_id, word, familiarity, last_review, topic FROM vocab_progress WHERE user_id = ? ORDER BY familiarity ASC, last_review ASC LIMIT ?"
        )
        .bind(user_id)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(words)
    }

    pub async fn get_vocab_progress(
        &self,
        user_id: &str,
        word: &str,
    ) -> Result<Option<VocabProgress>> {
        let record = sqlx::query_as::<_, VocabProgress>(
            "SELECT user_id, word, familiarity, last_review, topic FROM vocab_progress WHERE user_id = ? AND word = ?"
        )
        .bind(user_id)
        .bind(word)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    // Familiarity stays within MIN_FAMILIARITY..=MAX_FAMILIARITY
    pub async fn update_vocab_familiarity(
        &self,
        user_id: &str,
        word: &str,
        increment: i64,
    ) -> Result<VocabProgress> {
        let now = timestamp();
        let existing = self.get_vocab_progress(user_id, word).await?;

        let familiarity = match &existing {
            Some(record) => clamp_familiarity(record.familiarity + increment),
            None => clamp_familiarity(MIN_FAMILIARITY + increment),
        };

        if existing.is_some() {
            sqlx::query(
                "UPDATE vocab_progress SET familiarity = ?, last_review = ? WHERE user_id = ? AND word = ?"
            )
            .bind(familiarity)
            .bind(&now)
            .bind(user_id)
            .bind(word)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO vocab_progress (user_id, word, familiarity, last_review, topic) VALUES (?, ?, ?, ?, 'General')"
            )
            .bind(user_id)
            .bind(word)
            .bind(familiarity)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        debug!(user = user_id, word, familiarity, "vocabulary familiarity updated");

        Ok(VocabProgress {
            user_id: user_id.to_string(),
            word: word.to_string(),
            familiarity,
            last_review: now,
            topic: existing.map(|r| r.topic).unwrap_or_else(|| "General".to_string()),
        })
    }

    pub async fn get_vocab_stats(&self, user_id: &str) -> Result<VocabStats> {
        let (mastered, total): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(CASE WHEN familiarity >= ? THEN 1 ELSE 0 END), 0), COUNT(*) FROM vocab_progress WHERE user_id = ?"
        )
        .bind(MASTERED_FAMILIARITY)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(VocabStats {
            mastered: mastered as usize,
            learning: (total - mastered) as usize,
            total: total as usize,
        })
    }
}

// Fixed-width RFC 3339 so text ordering matches time ordering
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn clamp_familiarity(value: i64) -> i64 {
    value.clamp(MIN_FAMILIARITY, MAX_FAMILIARITY)
}

// Export submissions as CSV, one row per essay
pub fn write_history_csv(
    submissions: &[WritingSubmission],
    output_file: impl AsRef<Path>,
) -> Result<()> {
    let output_file = output_file.as_ref();
    if let Some(parent) = output_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(output_file)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", output_file.display(), e))?;

    writer.write_record(["id", "created_at", "task_type", "band_score", "word_count", "content"])?;
    for submission in submissions {
        writer.write_record([
            submission.id.to_string(),
            submission.created_at.clone(),
            submission.task_type.clone(),
            format!("{:.1}", submission.band_score),
            word_count(&submission.content).to_string(),
            submission.content.clone(),
        ])?;
    }
    writer.flush()?;

    info!("wrote {} submissions to {}", submissions.len(), output_file.display());
    Ok(())
}
