use thiserror::Error;

use crate::api::ApiError;
use crate::mutation::EntityKey;

/// Malformed input caught before dispatch. Shown next to the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be a valid URL")]
    InvalidUrl { field: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::InvalidUrl { field } => field,
        }
    }
}

/// A call that would break a state invariant. Rejected without touching state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("post {0} not found")]
    PostNotFound(String),

    #[error("comment {comment_id} not found in post {post_id}")]
    CommentNotFound { post_id: String, comment_id: String },

    #[error("reply {reply_id} not found under comment {comment_id}")]
    ReplyNotFound { comment_id: String, reply_id: String },

    #[error("{0} is a reply; replies are addressed through their parent comment")]
    TargetIsReply(String),

    #[error("{0} is already liked")]
    AlreadyLiked(EntityKey),

    #[error("{0} is not liked")]
    NotLiked(EntityKey),

    #[error("a mutation on {0} is already in flight")]
    MutationInFlight(EntityKey),

    #[error("no thread is open")]
    NoActiveThread,
}

/// Everything a feed session operation can fail with
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid state: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Transport(#[from] ApiError),
}

pub type FeedResult<T> = Result<T, FeedError>;
