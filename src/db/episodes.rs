//! Episode catalog records.

use crate::error::DatabaseError;
use crate::types::EpisodeRecord;
use crate::{Error, Result};

use super::{Database, is_unique_violation};

const EPISODE_COLUMNS: &str = "id, title, description, audio, image, audio_length_sec, \
                               maybe_audio_invalid, publish_date";

impl Database {
    /// Insert a new episode.
    ///
    /// A record with the same id fails with
    /// [`DatabaseError::ConstraintViolation`].
    pub async fn insert_episode(&self, episode: &EpisodeRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO episodes (
                id, title, description, audio, image, audio_length_sec,
                maybe_audio_invalid, publish_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&episode.id)
        .bind(&episode.title)
        .bind(&episode.description)
        .bind(&episode.audio)
        .bind(&episode.image)
        .bind(episode.audio_length_sec)
        .bind(episode.maybe_audio_invalid)
        .bind(episode.publish_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "episode {} already exists",
                    episode.id
                )))
            } else {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert episode: {}",
                    e
                )))
            }
        })?;

        Ok(())
    }

    /// Get an episode by id
    pub async fn get_episode(&self, id: &str) -> Result<Option<EpisodeRecord>> {
        sqlx::query_as::<_, EpisodeRecord>(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get episode: {}",
                e
            )))
        })
    }

    /// List episodes newest first.
    ///
    /// With `from_date` (epoch ms), only episodes published strictly after it.
    pub async fn list_episodes(&self, from_date: Option<i64>) -> Result<Vec<EpisodeRecord>> {
        let query = match from_date {
            Some(_) => format!(
                "SELECT {EPISODE_COLUMNS} FROM episodes WHERE publish_date > ? \
                 ORDER BY publish_date DESC"
            ),
            None => format!("SELECT {EPISODE_COLUMNS} FROM episodes ORDER BY publish_date DESC"),
        };

        let mut q = sqlx::query_as::<_, EpisodeRecord>(&query);
        if let Some(from) = from_date {
            q = q.bind(from);
        }

        q.fetch_all(&self.pool).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list episodes: {}",
                e
            )))
        })
    }

    /// Delete an episode, returning the removed record
    pub async fn delete_episode(&self, id: &str) -> Result<Option<EpisodeRecord>> {
        sqlx::query_as::<_, EpisodeRecord>(&format!(
            "DELETE FROM episodes WHERE id = ? RETURNING {EPISODE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete episode: {}",
                e
            )))
        })
    }
}
