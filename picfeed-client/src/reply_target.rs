use picfeed_types::Post;

use crate::error::StateError;

/// Which entity a new message in the compose box answers.
///
/// `comment_id` is always a top-level comment. `reply_id` is set only when
/// answering a reply inside that comment's thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub comment_id: String,
    pub reply_id: Option<String>,
    pub username: String,
}

impl ReplyTarget {
    pub fn is_nested_reply(&self) -> bool {
        self.reply_id.is_some()
    }

    /// Same addressed entity, regardless of the username shown
    pub fn addresses(&self, comment_id: &str, reply_id: Option<&str>) -> bool {
        self.comment_id == comment_id && self.reply_id.as_deref() == reply_id
    }

    /// The `"@username "` tag this target owns in the draft
    pub fn mention_tag(&self) -> String {
        format!("@{} ", self.username)
    }
}

/// Outcome of `ReplyTargetResolver::set_target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChange {
    /// Already answering this exact entity; nothing changed
    Unchanged,
    /// The target was set; `previous` is the one it replaced, if any
    Replaced { previous: Option<ReplyTarget> },
}

#[derive(Debug, Default, Clone)]
pub struct ReplyTargetResolver {
    current: Option<ReplyTarget>,
}

impl ReplyTargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ReplyTarget> {
        self.current.as_ref()
    }

    /// Point the draft at a comment (`reply_id == None`) or at a reply inside it.
    ///
    /// The ids are checked against `post`: `comment_id` must be a top-level
    /// comment and `reply_id` must be one of its replies.
    pub fn set_target(
        &mut self,
        post: &Post,
        comment_id: &str,
        username: &str,
        reply_id: Option<&str>,
    ) -> Result<TargetChange, StateError> {
        let Some(comment) = post.comment(comment_id) else {
            if post.is_reply_id(comment_id) {
                return Err(StateError::TargetIsReply(comment_id.to_string()));
            }
            return Err(StateError::CommentNotFound {
                post_id: post.id.clone(),
                comment_id: comment_id.to_string(),
            });
        };
        if let Some(reply_id) = reply_id {
            if comment.reply(reply_id).is_none() {
                return Err(StateError::ReplyNotFound {
                    comment_id: comment_id.to_string(),
                    reply_id: reply_id.to_string(),
                });
            }
        }

        if self
            .current
            .as_ref()
            .is_some_and(|t| t.addresses(comment_id, reply_id))
        {
            return Ok(TargetChange::Unchanged);
        }

        let previous = self.current.replace(ReplyTarget {
            comment_id: comment_id.to_string(),
            reply_id: reply_id.map(str::to_string),
            username: username.to_string(),
        });
        Ok(TargetChange::Replaced { previous })
    }

    pub fn clear(&mut self) -> Option<ReplyTarget> {
        self.current.take()
    }
}
