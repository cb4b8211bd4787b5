use chrono::{DateTime, Utc};
use picfeed_types::{AddCommentRequest, AddReplyRequest};

use crate::api::{ApiError, Transport};
use crate::composer::Composer;
use crate::mutation::{Confirmation, PendingMutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient user-visible message, e.g. after a reverted like
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// The comments thread currently open, with its compose box
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub post_id: String,
    pub composer: Composer,
}

impl ThreadState {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            composer: Composer::new(),
        }
    }
}

/// The remote call backing an applied mutation
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Like { post_id: String },
    Unlike { post_id: String },
    AddComment(AddCommentRequest),
    AddReply(AddReplyRequest),
}

impl RemoteOp {
    pub fn procedure(&self) -> &'static str {
        match self {
            RemoteOp::Like { .. } => "likePost",
            RemoteOp::Unlike { .. } => "unlikePost",
            RemoteOp::AddComment(_) => "addComment",
            RemoteOp::AddReply(_) => "addReply",
        }
    }

    /// Perform the call; the result is ready to hand to `FeedSession::finish`
    pub async fn send<T: Transport + ?Sized>(&self, transport: &T) -> Result<Confirmation, ApiError> {
        match self {
            RemoteOp::Like { post_id } => transport.like_post(post_id).await.map(Confirmation::Post),
            RemoteOp::Unlike { post_id } => {
                transport.unlike_post(post_id).await.map(Confirmation::Post)
            }
            RemoteOp::AddComment(request) => {
                transport.add_comment(request).await.map(Confirmation::Comment)
            }
            RemoteOp::AddReply(request) => transport.add_reply(request).await.map(Confirmation::Reply),
        }
    }
}

/// An applied optimistic mutation together with the call that will settle it
#[derive(Debug)]
pub struct Dispatch {
    pub pending: PendingMutation,
    pub op: RemoteOp,
}
