//! Client-side checks run before any request reaches the transport.

use picfeed_types::{AddCommentRequest, AddReplyRequest, CreatePostRequest};
use reqwest::Url;

use crate::error::ValidationError;

pub const USERNAME_MAX_CHARS: usize = 50;
pub const CAPTION_MAX_CHARS: usize = 500;
pub const COMMENT_MAX_CHARS: usize = 300;

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    required(field, value)?;
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

fn url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    required(field, value)?;
    match Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ValidationError::InvalidUrl { field }),
    }
}

pub fn validate_create_post(request: &CreatePostRequest) -> Result<(), ValidationError> {
    bounded("username", &request.username, USERNAME_MAX_CHARS)?;
    url("userAvatar", &request.user_avatar)?;
    url("image", &request.image)?;
    bounded("caption", &request.caption, CAPTION_MAX_CHARS)
}

pub fn validate_add_comment(request: &AddCommentRequest) -> Result<(), ValidationError> {
    required("postId", &request.post_id)?;
    required("username", &request.username)?;
    url("userAvatar", &request.user_avatar)?;
    bounded("text", &request.text, COMMENT_MAX_CHARS)
}

pub fn validate_add_reply(request: &AddReplyRequest) -> Result<(), ValidationError> {
    required("postId", &request.post_id)?;
    required("commentId", &request.comment_id)?;
    if let Some(reply_id) = &request.reply_id {
        required("replyId", reply_id)?;
    }
    required("username", &request.username)?;
    url("userAvatar", &request.user_avatar)?;
    bounded("text", &request.text, COMMENT_MAX_CHARS)
}
