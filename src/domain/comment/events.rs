//! Comment domain events.
//!
//! Field names on the wire follow the external contract consumed by other
//! services (`commentUuid`, `postUuid`, `memberUuid`, `occurredAt`).
//! Consumers must tolerate additive fields, which is how `eventId` and
//! `eventType` ride along.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, CommentId, DomainEvent, EventId, MemberId, PostId, Timestamp,
};

use super::Comment;

pub const COMMENT_CREATED: &str = "comment.created";
pub const COMMENT_DELETED: &str = "comment.deleted";

/// A comment was written and committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub event_id: EventId,
    #[serde(rename = "commentUuid")]
    pub comment_id: CommentId,
    #[serde(rename = "postUuid")]
    pub post_id: PostId,
    #[serde(rename = "memberUuid")]
    pub author_id: MemberId,
    pub content: String,
    pub occurred_at: Timestamp,
}

domain_event!(
    CommentCreated,
    event_type = COMMENT_CREATED,
    aggregate_id = comment_id,
    occurred_at = occurred_at,
    event_id = event_id
);

/// A comment was soft-deleted and the deletion committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeleted {
    pub event_id: EventId,
    #[serde(rename = "commentUuid")]
    pub comment_id: CommentId,
    #[serde(rename = "postUuid")]
    pub post_id: PostId,
    #[serde(rename = "memberUuid")]
    pub author_id: MemberId,
    pub occurred_at: Timestamp,
}

domain_event!(
    CommentDeleted,
    event_type = COMMENT_DELETED,
    aggregate_id = comment_id,
    occurred_at = occurred_at,
    event_id = event_id
);

/// Every event the comment aggregate can announce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum CommentEvent {
    #[serde(rename = "comment.created")]
    Created(CommentCreated),
    #[serde(rename = "comment.deleted")]
    Deleted(CommentDeleted),
}

impl CommentEvent {
    /// Snapshot of a freshly saved comment.
    pub fn created(comment: &Comment) -> Self {
        CommentEvent::Created(CommentCreated {
            event_id: EventId::new(),
            comment_id: *comment.id(),
            post_id: comment.post_id().clone(),
            author_id: comment.author_id().clone(),
            content: comment.content().to_string(),
            occurred_at: Timestamp::now(),
        })
    }

    /// Snapshot of a comment that has just been soft-deleted.
    pub fn deleted(comment: &Comment) -> Self {
        CommentEvent::Deleted(CommentDeleted {
            event_id: EventId::new(),
            comment_id: *comment.id(),
            post_id: comment.post_id().clone(),
            author_id: comment.author_id().clone(),
            occurred_at: comment.deleted_at().copied().unwrap_or_else(Timestamp::now),
        })
    }

    pub fn comment_id(&self) -> &CommentId {
        match self {
            CommentEvent::Created(e) => &e.comment_id,
            CommentEvent::Deleted(e) => &e.comment_id,
        }
    }

    fn inner(&self) -> &dyn DomainEvent {
        match self {
            CommentEvent::Created(e) => e,
            CommentEvent::Deleted(e) => e,
        }
    }
}

impl DomainEvent for CommentEvent {
    fn event_type(&self) -> &'static str {
        self.inner().event_type()
    }

    fn aggregate_id(&self) -> String {
        self.inner().aggregate_id()
    }

    fn occurred_at(&self) -> Timestamp {
        self.inner().occurred_at()
    }

    fn event_id(&self) -> EventId {
        self.inner().event_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn comment() -> Comment {
        Comment::new(
            PostId::new("P1").unwrap(),
            MemberId::new("M1").unwrap(),
            "hi",
        )
        .unwrap()
    }

    #[test]
    fn created_event_uses_external_field_names() {
        let c = comment();
        let json: Value = serde_json::to_value(CommentEvent::created(&c)).unwrap();

        assert_eq!(json["eventType"], "comment.created");
        assert_eq!(json["commentUuid"], c.id().to_string());
        assert_eq!(json["postUuid"], "P1");
        assert_eq!(json["memberUuid"], "M1");
        assert_eq!(json["content"], "hi");
        assert!(json["occurredAt"].is_string());
        assert!(json["eventId"].is_string());
    }

    #[test]
    fn deleted_event_has_no_content() {
        let mut c = comment();
        c.soft_delete().unwrap();
        let json: Value = serde_json::to_value(CommentEvent::deleted(&c)).unwrap();

        assert_eq!(json["eventType"], "comment.deleted");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn deleted_event_occurs_at_deletion_time() {
        let mut c = comment();
        c.soft_delete().unwrap();
        let event = CommentEvent::deleted(&c);
        assert_eq!(Some(&event.occurred_at()), c.deleted_at());
    }

    #[test]
    fn event_reads_back_from_stored_json() {
        let event = CommentEvent::created(&comment());
        let stored = serde_json::to_string(&event).unwrap();
        let restored: CommentEvent = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn aggregate_id_is_comment_id() {
        let c = comment();
        let event = CommentEvent::created(&c);
        assert_eq!(event.aggregate_id(), c.id().to_string());
        assert_eq!(event.event_type(), COMMENT_CREATED);
    }
}
