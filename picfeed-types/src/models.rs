use serde::{Deserialize, Serialize};

/// A feed post. `liked` is a local UI flag and is never sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub username: String,
    pub user_avatar: String,
    pub image: String,
    pub caption: String,
    pub likes: u32,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Total comments including replies, when the server computes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_comments_count: Option<u32>,
    #[serde(default, skip_serializing)]
    pub liked: bool,
}

impl Post {
    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    /// True if `id` names a reply anywhere in this post's thread
    pub fn is_reply_id(&self, id: &str) -> bool {
        self.comments
            .iter()
            .any(|c| c.replies.iter().any(|r| r.id == id))
    }

    /// Comment count shown next to the comment button
    pub fn total_comments(&self) -> u32 {
        self.total_comments_count.unwrap_or_else(|| {
            self.comments
                .iter()
                .map(|c| 1 + c.replies.len() as u32)
                .sum()
        })
    }
}

/// Top-level comment. Replies are flat: a `Reply` cannot own replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    pub text: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default)]
    pub replies: Vec<Reply>,
    #[serde(default, skip_serializing)]
    pub liked: bool,
}

impl Comment {
    pub fn reply(&self, reply_id: &str) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }

    pub fn reply_mut(&mut self, reply_id: &str) -> Option<&mut Reply> {
        self.replies.iter_mut().find(|r| r.id == reply_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    pub text: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default, skip_serializing)]
    pub liked: bool,
}
