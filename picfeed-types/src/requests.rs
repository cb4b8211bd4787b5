use serde::{Deserialize, Serialize};

// Request/Response types for the feed API

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub username: String,
    pub user_avatar: String,
    pub image: String,
    pub caption: String,
}

/// Input for `likePost`, `unlikePost` and `getPostById`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostIdRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub post_id: String,
    pub username: String,
    pub user_avatar: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReplyRequest {
    pub post_id: String,
    /// Always the top-level comment, even for nested replies
    pub comment_id: String,
    /// Present only when replying to a reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    pub username: String,
    pub user_avatar: String,
    pub text: String,
}

/// tRPC responses arrive either wrapped as `{"result":{"data":...}}` or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TrpcEnvelope<T> {
    Wrapped { result: TrpcResult<T> },
    Bare(T),
}

#[derive(Debug, Deserialize)]
pub struct TrpcResult<T> {
    pub data: T,
}

impl<T> TrpcEnvelope<T> {
    pub fn into_data(self) -> T {
        match self {
            TrpcEnvelope::Wrapped { result } => result.data,
            TrpcEnvelope::Bare(data) => data,
        }
    }
}

/// Body of a failed call: `{"error":{"message":...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
}
