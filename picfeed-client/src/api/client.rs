use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiError, ApiResult, Transport};
use picfeed_types::*;

/// tRPC-over-HTTP client for the feed backend
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client; `base_url` points at the tRPC mount, e.g. `http://localhost:8787/trpc`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn procedure_url(&self, procedure: &str) -> String {
        format!("{}/{}", self.base_url, procedure)
    }

    /// Helper to handle API responses
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            let envelope: TrpcEnvelope<T> = serde_json::from_str(&body)?;
            Ok(envelope.into_data())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // Prefer the server's message; clean up HTML error pages from proxies
            let clean_error = if let Ok(body) = serde_json::from_str::<ErrorResponse>(&error_text) {
                body.error.message
            } else if error_text.contains("<html>") || error_text.contains("<!DOCTYPE") {
                format!("Server returned {} error. Please check the server URL.", status.as_u16())
            } else {
                error_text
            };

            match status.as_u16() {
                404 => Err(ApiError::NotFound(clean_error)),
                401 => Err(ApiError::Unauthorized(clean_error)),
                400 => Err(ApiError::BadRequest(clean_error)),
                _ => Err(ApiError::Api(clean_error)),
            }
        }
    }

    /// Queries are GETs with the input JSON in the `input` query parameter
    async fn query<I: Serialize, T: DeserializeOwned>(&self, procedure: &str, input: Option<&I>) -> ApiResult<T> {
        let mut url = self.procedure_url(procedure);
        if let Some(input) = input {
            let encoded = serde_json::to_string(input)?;
            url.push_str("?input=");
            url.push_str(&urlencoding::encode(&encoded));
        }
        log::debug!(target: "api_calls", "GET {}", url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Mutations are POSTs with a JSON body
    async fn mutation<I: Serialize + ?Sized, T: DeserializeOwned>(&self, procedure: &str, input: &I) -> ApiResult<T> {
        let url = self.procedure_url(procedure);
        log::debug!(target: "api_calls", "POST {}", url);
        let response = self.client.post(&url).json(input).send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn get_posts(&self) -> ApiResult<Vec<Post>> {
        self.query::<PostIdRequest, _>("getPosts", None).await
    }

    async fn get_post_by_id(&self, post_id: &str) -> ApiResult<Post> {
        let request = PostIdRequest { id: post_id.to_string() };
        self.query("getPostById", Some(&request)).await
    }

    async fn create_post(&self, request: &CreatePostRequest) -> ApiResult<Post> {
        self.mutation("createPost", request).await
    }

    async fn like_post(&self, post_id: &str) -> ApiResult<Post> {
        let request = PostIdRequest { id: post_id.to_string() };
        self.mutation("likePost", &request).await
    }

    async fn unlike_post(&self, post_id: &str) -> ApiResult<Post> {
        let request = PostIdRequest { id: post_id.to_string() };
        self.mutation("unlikePost", &request).await
    }

    async fn add_comment(&self, request: &AddCommentRequest) -> ApiResult<Comment> {
        self.mutation("addComment", request).await
    }

    async fn add_reply(&self, request: &AddReplyRequest) -> ApiResult<Reply> {
        self.mutation("addReply", request).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        let base_url = std::env::var("PICFEED_SERVER_URL")
            .unwrap_or_else(|_| crate::server_config::DEFAULT_SERVER_URL.to_string());
        Self::new(base_url)
    }
}
