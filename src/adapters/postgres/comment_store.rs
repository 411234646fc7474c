//! PostgreSQL implementation of CommentStore and OutboxStore.
//!
//! Comments, likes and outbox rows live in one database so a comment change
//! and its outbox rows commit atomically. The `(comment_id, member_id)`
//! primary key on `comment_likes` is what settles concurrent likes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::comment::{Comment, CommentEvent, CommentSort, LikeRecord, Page, PageRequest};
use crate::domain::foundation::{
    CommentId, DomainError, DomainEvent, ErrorCode, MemberId, PostId, Timestamp,
};
use crate::ports::{
    CommentStore, CommentTransaction, IsolationLevel, OutboxEntry, OutboxStatus, OutboxStore,
};

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, content, is_blind, is_deleted, deleted_at, created_at, updated_at";

const OUTBOX_COLUMNS: &str =
    "id, payload, status, created_at, processed_at, attempts, last_error, partition_key";

/// PostgreSQL-backed comment store.
#[derive(Clone)]
pub struct PostgresCommentStore {
    pool: PgPool,
}

impl PostgresCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))
    }

    async fn update_outbox_status(
        &self,
        id: Uuid,
        status: OutboxStatus,
        error: Option<&str>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE comment_outbox SET
                status = $2,
                processed_at = NOW(),
                attempts = attempts + 1,
                last_error = COALESCE($3, last_error)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_error("update outbox entry"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::OutboxEntryNotFound,
                format!("Outbox entry not found: {}", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PostgresCommentStore {
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn CommentTransaction>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin transaction"))?;

        sqlx::query(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.as_sql()
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_error("set isolation level"))?;

        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn find_active_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE id = $1 AND is_deleted = FALSE",
            COMMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch comment"))?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn find_by_post_id(
        &self,
        post_id: &PostId,
        request: PageRequest,
    ) -> Result<Page<Comment>, DomainError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count comments"))?;

        let order = sort_order(request.sort);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE post_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at {order}, id {order} LIMIT $2 OFFSET $3",
            COMMENT_COLUMNS,
            order = order
        ))
        .bind(post_id.as_str())
        .bind(i64::from(request.size))
        .bind(request.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list comments"))?;

        let items = rows.iter().map(row_to_comment).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, request, total as u64))
    }

    async fn count_likes(&self, comment_id: &CommentId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1")
            .bind(comment_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count likes"))?;

        Ok(count as u64)
    }

    async fn exists_like(
        &self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM comment_likes WHERE comment_id = $1 AND member_id = $2)",
        )
        .bind(comment_id.as_uuid())
        .bind(member_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("check like"))
    }
}

#[async_trait]
impl OutboxStore for PostgresCommentStore {
    async fn get_deliverable(
        &self,
        limit: u32,
        stale_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM comment_outbox \
             WHERE status = 'failed' OR (status = 'pending' AND created_at < $1) \
             ORDER BY created_at LIMIT $2",
            OUTBOX_COLUMNS
        ))
        .bind(stale_before.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch deliverable outbox entries"))?;

        rows.iter().map(row_to_outbox_entry).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        self.update_outbox_status(id, OutboxStatus::Published, None)
            .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        self.update_outbox_status(id, OutboxStatus::Failed, Some(error))
            .await
    }

    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        self.update_outbox_status(id, OutboxStatus::DeadLettered, Some(error))
            .await
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM comment_outbox
            WHERE status = 'published'
              AND processed_at < NOW() - make_interval(hours => $1)
            "#,
        )
        .bind(older_than_hours as i32)
        .execute(&self.pool)
        .await
        .map_err(db_error("clean up outbox"))?;

        Ok(result.rows_affected())
    }
}

/// One open PostgreSQL transaction.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CommentTransaction for PostgresTransaction {
    async fn find_active_by_id(
        &mut self,
        id: &CommentId,
    ) -> Result<Option<Comment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
            COMMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("fetch comment"))?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn save(&mut self, comment: &Comment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO comments (
                id, post_id, author_id, content, is_blind, is_deleted,
                deleted_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                is_blind = EXCLUDED.is_blind,
                is_deleted = EXCLUDED.is_deleted,
                deleted_at = EXCLUDED.deleted_at,
                updated_at = EXCLUDED.updated_at
            WHERE comments.is_deleted = FALSE
            "#,
        )
        .bind(comment.id().as_uuid())
        .bind(comment.post_id().as_str())
        .bind(comment.author_id().as_str())
        .bind(comment.content())
        .bind(comment.is_blind())
        .bind(comment.is_deleted())
        .bind(comment.deleted_at().map(|t| *t.as_datetime()))
        .bind(comment.created_at().as_datetime())
        .bind(comment.updated_at().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("save comment"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::comment_not_found(comment.id()));
        }
        Ok(())
    }

    async fn exists_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM comment_likes WHERE comment_id = $1 AND member_id = $2)",
        )
        .bind(comment_id.as_uuid())
        .bind(member_id.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("check like"))
    }

    async fn insert_like(&mut self, like: &LikeRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            "INSERT INTO comment_likes (comment_id, member_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(like.comment_id.as_uuid())
        .bind(like.member_id.as_str())
        .bind(like.created_at.as_datetime())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                DomainError::new(ErrorCode::DuplicateLike, "Comment already liked by this member")
                    .with_detail("comment_id", like.comment_id.to_string())
                    .with_detail("member_id", like.member_id.as_str()),
            ),
            Err(e) => Err(db_error("insert like")(e)),
        }
    }

    async fn delete_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND member_id = $2")
            .bind(comment_id.as_uuid())
            .bind(member_id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("delete like"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn write_outbox(&mut self, entries: &[OutboxEntry]) -> Result<(), DomainError> {
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO comment_outbox (
                    id, event_type, payload, status, created_at, attempts, partition_key
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(entry.id)
            .bind(entry.event.event_type())
            .bind(Json(&entry.event))
            .bind(entry.status.as_str())
            .bind(entry.created_at.as_datetime())
            .bind(entry.attempts as i32)
            .bind(&entry.partition_key)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("write outbox entry"))?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let PostgresTransaction { tx } = *self;
        tx.commit().await.map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DomainError::new(ErrorCode::DuplicateLike, "Comment already liked by this member")
            }
            e => db_error("commit transaction")(e),
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        let PostgresTransaction { tx } = *self;
        tx.rollback().await.map_err(db_error("roll back transaction"))
    }
}

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::database(format!("Failed to {}: {}", action, e))
}

fn sort_order(sort: CommentSort) -> &'static str {
    match sort {
        CommentSort::Latest => "DESC",
        CommentSort::Oldest => "ASC",
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_comment(row: &PgRow) -> Result<Comment, DomainError> {
    let id: Uuid = column(row, "id")?;
    let post_id: String = column(row, "post_id")?;
    let author_id: String = column(row, "author_id")?;
    let deleted_at: Option<DateTime<Utc>> = column(row, "deleted_at")?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;
    let updated_at: DateTime<Utc> = column(row, "updated_at")?;

    let post_id = PostId::new(post_id)
        .map_err(|e| DomainError::database(format!("Invalid post_id in storage: {}", e)))?;
    let author_id = MemberId::new(author_id)
        .map_err(|e| DomainError::database(format!("Invalid author_id in storage: {}", e)))?;

    Ok(Comment::reconstitute(
        CommentId::from_uuid(id),
        post_id,
        author_id,
        column(row, "content")?,
        column(row, "is_blind")?,
        column(row, "is_deleted")?,
        deleted_at.map(Timestamp::from_datetime),
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

fn row_to_outbox_entry(row: &PgRow) -> Result<OutboxEntry, DomainError> {
    let Json(event): Json<CommentEvent> = column(row, "payload")?;
    let status: String = column(row, "status")?;
    let status = OutboxStatus::parse(&status)
        .ok_or_else(|| DomainError::database(format!("Unknown outbox status: {}", status)))?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;
    let processed_at: Option<DateTime<Utc>> = column(row, "processed_at")?;
    let attempts: i32 = column(row, "attempts")?;

    Ok(OutboxEntry {
        id: column(row, "id")?,
        event,
        status,
        created_at: Timestamp::from_datetime(created_at),
        processed_at: processed_at.map(Timestamp::from_datetime),
        attempts: attempts.max(0) as u32,
        last_error: column(row, "last_error")?,
        partition_key: column(row, "partition_key")?,
    })
}

// Query tests require a running PostgreSQL instance and are exercised
// through the in-memory store's contract tests instead.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_sorts_descending() {
        assert_eq!(sort_order(CommentSort::Latest), "DESC");
        assert_eq!(sort_order(CommentSort::Oldest), "ASC");
    }

    #[test]
    fn db_error_names_the_action() {
        let err = db_error("save comment")(sqlx::Error::RowNotFound);

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.starts_with("Failed to save comment"));
    }
}
