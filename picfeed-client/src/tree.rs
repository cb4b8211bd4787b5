use std::collections::HashMap;
use std::fmt;

use picfeed_types::{Comment, Post, Reply};

/// Addresses one mutable entity of the feed.
///
/// Replies are always addressed through their parent comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Post(String),
    Comment { post_id: String, comment_id: String },
    Reply { post_id: String, comment_id: String, reply_id: String },
    /// A post's comment list; new comments and replies are serialized per thread
    Thread(String),
}

impl EntityKey {
    pub fn post_id(&self) -> &str {
        match self {
            EntityKey::Post(post_id) | EntityKey::Thread(post_id) => post_id,
            EntityKey::Comment { post_id, .. } | EntityKey::Reply { post_id, .. } => post_id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Post(post_id) => write!(f, "post {}", post_id),
            EntityKey::Comment { post_id, comment_id } => {
                write!(f, "comment {} in post {}", comment_id, post_id)
            }
            EntityKey::Reply { comment_id, reply_id, .. } => {
                write!(f, "reply {} under comment {}", reply_id, comment_id)
            }
            EntityKey::Thread(post_id) => write!(f, "thread of post {}", post_id),
        }
    }
}

/// Server copies know nothing about `liked`; keep the local flags across a refetch
fn carry_liked(previous: &Post, fresh: &mut Post) {
    fresh.liked = previous.liked;
    for comment in &mut fresh.comments {
        let Some(old) = previous.comment(&comment.id) else {
            continue;
        };
        comment.liked = old.liked;
        for reply in &mut comment.replies {
            if let Some(old_reply) = old.reply(&reply.id) {
                reply.liked = old_reply.liked;
            }
        }
    }
}

/// Mutable view of the like state of a post, comment or reply
pub(crate) struct LikeSlot<'a> {
    pub likes: &'a mut u32,
    pub liked: &'a mut bool,
}

/// Single store holding the feed.
///
/// Readable by any view. Writes are `pub(crate)` and go through the mutation
/// coordinator, except wholesale refetches which replace server truth.
#[derive(Debug, Default)]
pub struct FeedStore {
    posts: Vec<Post>,
    generations: HashMap<String, u64>,
    next_generation: u64,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn comment(&self, post_id: &str, comment_id: &str) -> Option<&Comment> {
        self.post(post_id).and_then(|p| p.comment(comment_id))
    }

    pub fn reply(&self, post_id: &str, comment_id: &str, reply_id: &str) -> Option<&Reply> {
        self.comment(post_id, comment_id).and_then(|c| c.reply(reply_id))
    }

    /// Generation of a post; changes whenever the post is refetched
    pub fn generation(&self, post_id: &str) -> Option<u64> {
        self.generations.get(post_id).copied()
    }

    fn bump(&mut self, post_id: &str) {
        self.next_generation += 1;
        self.generations.insert(post_id.to_string(), self.next_generation);
    }

    /// Replace the whole feed with a server listing
    pub(crate) fn replace_all(&mut self, mut posts: Vec<Post>) {
        for fresh in &mut posts {
            if let Some(previous) = self.post(&fresh.id) {
                carry_liked(previous, fresh);
            }
        }
        self.generations.clear();
        self.posts = posts;
        let ids: Vec<String> = self.posts.iter().map(|p| p.id.clone()).collect();
        for id in ids {
            self.bump(&id);
        }
    }

    /// Replace one post with a refetched copy, or add it at the top if unknown
    pub(crate) fn replace_post(&mut self, mut post: Post) {
        let id = post.id.clone();
        match self.posts.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                carry_liked(existing, &mut post);
                *existing = post;
            }
            None => self.posts.insert(0, post),
        }
        self.bump(&id);
    }

    pub(crate) fn post_mut(&mut self, post_id: &str) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == post_id)
    }

    pub(crate) fn comment_mut(&mut self, post_id: &str, comment_id: &str) -> Option<&mut Comment> {
        self.post_mut(post_id).and_then(|p| p.comment_mut(comment_id))
    }

    pub(crate) fn like_slot(&mut self, key: &EntityKey) -> Option<LikeSlot<'_>> {
        match key {
            EntityKey::Post(post_id) => self.post_mut(post_id).map(|p| LikeSlot {
                likes: &mut p.likes,
                liked: &mut p.liked,
            }),
            EntityKey::Comment { post_id, comment_id } => {
                self.comment_mut(post_id, comment_id).map(|c| LikeSlot {
                    likes: &mut c.likes,
                    liked: &mut c.liked,
                })
            }
            EntityKey::Reply { post_id, comment_id, reply_id } => self
                .comment_mut(post_id, comment_id)
                .and_then(|c| c.reply_mut(reply_id))
                .map(|r| LikeSlot {
                    likes: &mut r.likes,
                    liked: &mut r.liked,
                }),
            EntityKey::Thread(_) => None,
        }
    }

    pub(crate) fn push_comment(&mut self, post_id: &str, comment: Comment) -> bool {
        match self.post_mut(post_id) {
            Some(post) => {
                post.comments.push(comment);
                if let Some(total) = post.total_comments_count.as_mut() {
                    *total += 1;
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_reply(&mut self, post_id: &str, comment_id: &str, reply: Reply) -> bool {
        let Some(post) = self.post_mut(post_id) else {
            return false;
        };
        let Some(comment) = post.comment_mut(comment_id) else {
            return false;
        };
        comment.replies.push(reply);
        if let Some(total) = post.total_comments_count.as_mut() {
            *total += 1;
        }
        true
    }

    /// Swap the provisional comment `comment_id` for the server copy, keeping its position.
    ///
    /// Provisional nodes start at zero likes, so any likes on the slot were made
    /// locally while the insert was in flight and are carried over.
    pub(crate) fn replace_comment(&mut self, post_id: &str, comment_id: &str, mut replacement: Comment) -> bool {
        match self.comment_mut(post_id, comment_id) {
            Some(slot) => {
                replacement.likes = replacement.likes.saturating_add(slot.likes);
                replacement.liked |= slot.liked;
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    pub(crate) fn replace_reply(
        &mut self,
        post_id: &str,
        comment_id: &str,
        reply_id: &str,
        mut replacement: Reply,
    ) -> bool {
        match self
            .comment_mut(post_id, comment_id)
            .and_then(|c| c.reply_mut(reply_id))
        {
            Some(slot) => {
                replacement.likes = replacement.likes.saturating_add(slot.likes);
                replacement.liked |= slot.liked;
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_comment(&mut self, post_id: &str, comment_id: &str) -> Option<Comment> {
        let post = self.post_mut(post_id)?;
        let index = post.comments.iter().position(|c| c.id == comment_id)?;
        if let Some(total) = post.total_comments_count.as_mut() {
            // The comment's replies leave with it
            let removed = 1 + post.comments[index].replies.len() as u32;
            *total = total.saturating_sub(removed);
        }
        Some(post.comments.remove(index))
    }

    pub(crate) fn remove_reply(&mut self, post_id: &str, comment_id: &str, reply_id: &str) -> Option<Reply> {
        let post = self.post_mut(post_id)?;
        let comment = post.comment_mut(comment_id)?;
        let index = comment.replies.iter().position(|r| r.id == reply_id)?;
        let reply = comment.replies.remove(index);
        if let Some(total) = post.total_comments_count.as_mut() {
            *total = total.saturating_sub(1);
        }
        Some(reply)
    }
}
