//! Postgres-backed state store
//!
//! Schema is created lazily on first use. Profiles are stored as JSON text
//! so new auxiliary fields never need a migration.

use super::StateStore;
use crate::error::OrchestrationError;
use crate::memory::{Transcript, Turn, TurnRole};
use crate::models::{ConversationState, Phase, ViolationCategory, ViolationCounts};
use crate::persona::Profile;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
      user_id UUID PRIMARY KEY,
      data TEXT NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
      conversation_id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      phase TEXT NOT NULL,
      summary TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_conversations_user_time
    ON conversations (user_id, created_at);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_turns (
      seq BIGSERIAL PRIMARY KEY,
      turn_id UUID NOT NULL,
      conversation_id UUID NOT NULL,
      role TEXT NOT NULL,
      content TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_conversation_turns_scope
    ON conversation_turns (conversation_id, seq);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS violation_logs (
      user_id UUID NOT NULL,
      conversation_id UUID NOT NULL,
      category TEXT NOT NULL,
      count INTEGER NOT NULL DEFAULT 0,
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      UNIQUE (user_id, conversation_id, category)
    );
    "#,
];

pub struct PgStateStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> OrchestrationError {
    move |e| OrchestrationError::DatabaseError(format!("{}: {}", context, e))
}

impl PgStateStore {
    /// Build a store over a lazily connecting pool
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        info!("State store backend: postgres");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(db_error("Failed to initialize state schema"))?;

        Ok(())
    }

    async fn load_turns(&self, conversation_id: Uuid) -> Result<Transcript> {
        let rows = sqlx::query(
            r#"
            SELECT turn_id, role, content, created_at
            FROM conversation_turns
            WHERE conversation_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load conversation turns"))?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let db_role: String = row.try_get("role")?;
            let role = TurnRole::parse(&db_role).unwrap_or_else(|| {
                warn!("Unknown stored turn role '{}', treating as user", db_role);
                TurnRole::User
            });

            turns.push(Turn {
                turn_id: row.try_get("turn_id")?,
                role,
                content: row.try_get("content")?,
                timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
            });
        }

        Ok(Transcript::from_turns(turns))
    }

    async fn update_conversation(
        &self,
        query: &'static str,
        conversation_id: Uuid,
        value: Option<&str>,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let result = sqlx::query(query)
            .bind(value)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update conversation"))?;

        if result.rows_affected() == 0 {
            return Err(OrchestrationError::StateError(format!(
                "Unknown conversation {}",
                conversation_id
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for PgStateStore {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT data FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load profile"))?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.ensure_schema().await?;

        let data = serde_json::to_string(profile)?;
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, data, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(profile.user_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save profile"))?;

        Ok(())
    }

    async fn load_active_conversation(&self, user_id: Uuid) -> Result<Option<ConversationState>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT conversation_id, phase, summary, created_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load conversation"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let conversation_id: Uuid = row.try_get("conversation_id")?;
        let db_phase: String = row.try_get("phase")?;
        let phase = Phase::parse(&db_phase).unwrap_or_else(|| {
            warn!("Unknown stored phase '{}', resetting to persona", db_phase);
            Phase::Persona
        });

        Ok(Some(ConversationState {
            conversation_id,
            user_id,
            phase,
            summary: row.try_get("summary")?,
            transcript: self.load_turns(conversation_id).await?,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn create_conversation(&self, state: &ConversationState) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (conversation_id, user_id, phase, summary, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(state.conversation_id)
        .bind(state.user_id)
        .bind(state.phase.as_str())
        .bind(state.summary.as_deref())
        .bind(state.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create conversation"))?;

        Ok(())
    }

    async fn append_turn(&self, conversation_id: Uuid, turn: &Turn) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_turns (turn_id, conversation_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(turn.turn_id)
        .bind(conversation_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to append turn"))?;

        Ok(())
    }

    async fn save_phase(&self, conversation_id: Uuid, phase: Phase) -> Result<()> {
        self.update_conversation(
            "UPDATE conversations SET phase = $1 WHERE conversation_id = $2",
            conversation_id,
            Some(phase.as_str()),
        )
        .await
    }

    async fn save_summary(&self, conversation_id: Uuid, summary: &str) -> Result<()> {
        self.update_conversation(
            "UPDATE conversations SET summary = $1 WHERE conversation_id = $2",
            conversation_id,
            Some(summary),
        )
        .await
    }

    async fn truncate_transcript(&self, conversation_id: Uuid, keep_last: usize) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            DELETE FROM conversation_turns
            WHERE conversation_id = $1
              AND seq NOT IN (
                SELECT seq FROM conversation_turns
                WHERE conversation_id = $1
                ORDER BY seq DESC
                LIMIT $2
              )
            "#,
        )
        .bind(conversation_id)
        .bind(keep_last as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to truncate transcript"))?;

        Ok(())
    }

    async fn violation_counts(&self, user_id: Uuid, conversation_id: Uuid) -> Result<ViolationCounts> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT category, count FROM violation_logs WHERE user_id = $1 AND conversation_id = $2",
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load violation counts"))?;

        let mut counts = ViolationCounts::new();
        for row in rows {
            let category: String = row.try_get("category")?;
            let count: i32 = row.try_get("count")?;
            match ViolationCategory::parse(&category) {
                Some(category) => {
                    counts.insert(category, count.max(0) as u32);
                }
                None => warn!("Ignoring unknown violation category '{}'", category),
            }
        }

        Ok(counts)
    }

    async fn increment_violation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        category: ViolationCategory,
    ) -> Result<u32> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO violation_logs (user_id, conversation_id, category, count, updated_at)
            VALUES ($1, $2, $3, 1, NOW())
            ON CONFLICT (user_id, conversation_id, category)
            DO UPDATE SET count = violation_logs.count + 1, updated_at = NOW()
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(category.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to record violation"))?;

        let count: i32 = row.try_get("count")?;
        Ok(count.max(0) as u32)
    }
}
