mod client;
mod error;

pub use client::ApiClient;
pub use error::{categorize_error, ApiError, ApiResult};

use async_trait::async_trait;
use picfeed_types::{AddCommentRequest, AddReplyRequest, Comment, CreatePostRequest, Post, Reply};

/// Remote operations the feed session depends on.
///
/// `ApiClient` is the HTTP implementation; tests substitute scripted ones.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_posts(&self) -> ApiResult<Vec<Post>>;

    async fn get_post_by_id(&self, post_id: &str) -> ApiResult<Post>;

    async fn create_post(&self, request: &CreatePostRequest) -> ApiResult<Post>;

    async fn like_post(&self, post_id: &str) -> ApiResult<Post>;

    async fn unlike_post(&self, post_id: &str) -> ApiResult<Post>;

    async fn add_comment(&self, request: &AddCommentRequest) -> ApiResult<Comment>;

    async fn add_reply(&self, request: &AddReplyRequest) -> ApiResult<Reply>;
}
