//! Comment module - the comment aggregate, likes and the events they emit.

mod aggregate;
mod errors;
mod events;
mod like;
mod page;

pub use aggregate::{Comment, MAX_CONTENT_CHARS};
pub use errors::CommentError;
pub use events::{CommentCreated, CommentDeleted, CommentEvent, COMMENT_CREATED, COMMENT_DELETED};
pub use like::LikeRecord;
pub use page::{CommentSort, Page, PageRequest, DEFAULT_PAGE_SIZE};
