use picfeed_types::{AddCommentRequest, AddReplyRequest, Comment, CreatePostRequest, Post, Reply};

use crate::api::{categorize_error, ApiError, Transport};
use crate::config::Profile;
use crate::error::{FeedError, FeedResult, StateError, ValidationError};
use crate::logging::LogConfig;
use crate::mutation::{
    Confirmation, EntityKey, MutationCoordinator, MutationKind, PendingMutation, Settlement,
};
use crate::reply_target::{ReplyTarget, TargetChange};
use crate::tree::FeedStore;
use crate::validation;
use crate::{log_api_call, log_compose, log_mutation};

pub mod state;
pub use state::*;
pub mod handlers;

/// Shown on optimistic comments and replies until the server answers
const JUST_NOW: &str = "just now";

/// Owns the feed store and wires user intents to the mutation coordinator.
///
/// Every user action goes through here. Remote calls can be awaited in one
/// go (`like`, `submit_draft`) or split into `begin_*` + [`FeedSession::finish`]
/// when the caller runs its own event loop.
pub struct FeedSession<T: Transport> {
    transport: T,
    store: FeedStore,
    coordinator: MutationCoordinator,
    thread: Option<ThreadState>,
    profile: Profile,
    notices: Vec<Notice>,
    log_config: LogConfig,
}

impl<T: Transport> FeedSession<T> {
    pub fn new(transport: T, profile: Profile) -> Self {
        Self {
            transport,
            store: FeedStore::new(),
            coordinator: MutationCoordinator::new(),
            thread: None,
            profile,
            notices: Vec::new(),
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.coordinator = std::mem::take(&mut self.coordinator).with_log_config(log_config.clone());
        self.log_config = log_config;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    pub fn posts(&self) -> &[Post] {
        self.store.posts()
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.store.post(post_id)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Comment count for the post's comment button
    pub fn total_comments_count(&self, post_id: &str) -> Option<u32> {
        self.store.post(post_id).map(Post::total_comments)
    }

    pub fn active_thread(&self) -> Option<&ThreadState> {
        self.thread.as_ref()
    }

    pub fn reply_target(&self) -> Option<&ReplyTarget> {
        self.thread.as_ref().and_then(|t| t.composer.target())
    }

    /// Text of the compose box, `None` when no thread is open
    pub fn draft_text(&self) -> Option<String> {
        self.thread.as_ref().map(|t| t.composer.text())
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// True while a comment or reply of the open thread awaits the server
    pub fn is_submitting(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| self.coordinator.is_in_flight(&EntityKey::Thread(t.post_id.clone())))
    }

    pub fn is_like_in_flight(&self, post_id: &str) -> bool {
        self.coordinator
            .is_in_flight(&EntityKey::Post(post_id.to_string()))
    }

    fn push_error(&mut self, err: &ApiError) {
        self.notices
            .push(Notice::error(categorize_error(&err.to_string())));
    }

    // Feed loading

    /// Replace the feed with the server listing.
    ///
    /// Like counts of mutations still in flight come from the listing; their
    /// results still settle the local `liked` flags when they arrive.
    pub async fn load_posts(&mut self) -> FeedResult<()> {
        log_api_call!(self.log_config, "getPosts");
        let posts = match self.transport.get_posts().await {
            Ok(posts) => posts,
            Err(err) => {
                log::error!("Failed to load posts: {}", err);
                self.push_error(&err);
                return Err(err.into());
            }
        };
        log_api_call!(self.log_config, "getPosts returned {} posts", posts.len());
        self.store.replace_all(posts);

        // The open thread may point at a post that no longer exists
        if let Some(thread) = &self.thread {
            if self.store.post(&thread.post_id).is_none() {
                log_compose!(self.log_config, "closing thread of vanished post {}", thread.post_id);
                self.notices
                    .push(Notice::info("The post you were viewing is no longer available"));
                self.thread = None;
            }
        }
        Ok(())
    }

    pub async fn refresh_post(&mut self, post_id: &str) -> FeedResult<()> {
        log_api_call!(self.log_config, "getPostById {}", post_id);
        match self.transport.get_post_by_id(post_id).await {
            Ok(post) => {
                self.store.replace_post(post);
                Ok(())
            }
            Err(err) => {
                self.push_error(&err);
                Err(err.into())
            }
        }
    }

    /// Publish a new post as the session's profile. The result goes to the top of the feed.
    pub async fn create_post(&mut self, image: &str, caption: &str) -> FeedResult<Post> {
        let request = CreatePostRequest {
            username: self.profile.username.clone(),
            user_avatar: self.profile.avatar_url.clone(),
            image: image.trim().to_string(),
            caption: caption.trim().to_string(),
        };
        validation::validate_create_post(&request)?;

        log_api_call!(self.log_config, "createPost by {}", request.username);
        match self.transport.create_post(&request).await {
            Ok(post) => {
                self.store.replace_post(post.clone());
                Ok(post)
            }
            Err(err) => {
                self.push_error(&err);
                Err(err.into())
            }
        }
    }

    // Likes

    pub fn begin_like(&mut self, post_id: &str) -> FeedResult<Dispatch> {
        let pending = self
            .coordinator
            .apply_like(&mut self.store, EntityKey::Post(post_id.to_string()))?;
        log_mutation!(self.log_config, "optimistic like on post {}", post_id);
        Ok(Dispatch {
            pending,
            op: RemoteOp::Like {
                post_id: post_id.to_string(),
            },
        })
    }

    pub fn begin_unlike(&mut self, post_id: &str) -> FeedResult<Dispatch> {
        let pending = self
            .coordinator
            .apply_unlike(&mut self.store, EntityKey::Post(post_id.to_string()))?;
        log_mutation!(self.log_config, "optimistic unlike on post {}", post_id);
        Ok(Dispatch {
            pending,
            op: RemoteOp::Unlike {
                post_id: post_id.to_string(),
            },
        })
    }

    pub async fn like(&mut self, post_id: &str) -> FeedResult<()> {
        let dispatch = self.begin_like(post_id)?;
        self.dispatch(dispatch).await
    }

    pub async fn unlike(&mut self, post_id: &str) -> FeedResult<()> {
        let dispatch = self.begin_unlike(post_id)?;
        self.dispatch(dispatch).await
    }

    /// Like button behavior: unlike when liked, like otherwise
    pub async fn toggle_like(&mut self, post_id: &str) -> FeedResult<()> {
        let liked = self
            .store
            .post(post_id)
            .map(|p| p.liked)
            .ok_or_else(|| StateError::PostNotFound(post_id.to_string()))?;
        if liked {
            self.unlike(post_id).await
        } else {
            self.like(post_id).await
        }
    }

    /// Comment and reply likes have no remote endpoint and settle immediately
    pub fn like_comment(&mut self, post_id: &str, comment_id: &str, reply_id: Option<&str>) -> FeedResult<()> {
        let key = comment_key(post_id, comment_id, reply_id);
        self.coordinator.apply_local_like(&mut self.store, key)?;
        Ok(())
    }

    pub fn unlike_comment(&mut self, post_id: &str, comment_id: &str, reply_id: Option<&str>) -> FeedResult<()> {
        let key = comment_key(post_id, comment_id, reply_id);
        self.coordinator.apply_local_unlike(&mut self.store, key)?;
        Ok(())
    }

    // Thread and compose box

    /// Open the comments of `post_id`. Switching to another post starts a fresh draft.
    pub fn open_thread(&mut self, post_id: &str) -> FeedResult<()> {
        if self.store.post(post_id).is_none() {
            return Err(StateError::PostNotFound(post_id.to_string()).into());
        }
        if self.thread.as_ref().is_some_and(|t| t.post_id == post_id) {
            return Ok(());
        }
        log_compose!(self.log_config, "open thread {}", post_id);
        self.thread = Some(ThreadState::new(post_id));
        Ok(())
    }

    /// Close the thread, discarding its draft and reply target
    pub fn close_thread(&mut self) -> Option<ThreadState> {
        let closed = self.thread.take();
        if let Some(thread) = &closed {
            log_compose!(self.log_config, "close thread {}", thread.post_id);
        }
        closed
    }

    /// Id of the open thread, if its compose box may be changed right now
    fn editable_thread_id(&self) -> FeedResult<String> {
        let thread = self.thread.as_ref().ok_or(StateError::NoActiveThread)?;
        let key = EntityKey::Thread(thread.post_id.clone());
        if self.coordinator.is_in_flight(&key) {
            return Err(StateError::MutationInFlight(key).into());
        }
        Ok(thread.post_id.clone())
    }

    /// Point the compose box at a comment, or at a reply inside it
    fn set_reply_target(
        &mut self,
        comment_id: &str,
        username: &str,
        reply_id: Option<&str>,
    ) -> FeedResult<TargetChange> {
        let post_id = self.editable_thread_id()?;
        let post = self
            .store
            .post(&post_id)
            .ok_or_else(|| StateError::PostNotFound(post_id.clone()))?;
        let thread = self.thread.as_mut().ok_or(StateError::NoActiveThread)?;

        let change = thread
            .composer
            .set_target(post, comment_id, username, reply_id)?;
        log_compose!(
            self.log_config,
            "reply target {}/{:?} (@{}): {:?}",
            comment_id,
            reply_id,
            username,
            change
        );
        Ok(change)
    }

    /// "Reply" on a comment; the username comes from the comment itself
    pub fn reply_to_comment(&mut self, comment_id: &str) -> FeedResult<TargetChange> {
        let username = self
            .thread
            .as_ref()
            .and_then(|t| self.store.comment(&t.post_id, comment_id))
            .map(|c| c.username.clone())
            // Unknown ids are rejected by the resolver with the precise reason
            .unwrap_or_default();
        self.set_reply_target(comment_id, &username, None)
    }

    /// "Reply" on a reply inside `comment_id`'s thread
    pub fn reply_to_reply(&mut self, comment_id: &str, reply_id: &str) -> FeedResult<TargetChange> {
        let username = self
            .thread
            .as_ref()
            .and_then(|t| self.store.reply(&t.post_id, comment_id, reply_id))
            .map(|r| r.username.clone())
            .unwrap_or_default();
        self.set_reply_target(comment_id, &username, Some(reply_id))
    }

    pub fn cancel_reply(&mut self) -> FeedResult<Option<ReplyTarget>> {
        self.editable_thread_id()?;
        let thread = self.thread.as_mut().ok_or(StateError::NoActiveThread)?;
        let cancelled = thread.composer.cancel_reply();
        log_compose!(self.log_config, "reply cancelled: {:?}", cancelled);
        Ok(cancelled)
    }

    /// The user typed in the compose box; `text` is the whole new content
    pub fn edit_draft(&mut self, text: &str) -> FeedResult<()> {
        self.editable_thread_id()?;
        let thread = self.thread.as_mut().ok_or(StateError::NoActiveThread)?;
        thread.composer.set_text(text);
        Ok(())
    }

    /// Validate the draft and apply it optimistically.
    ///
    /// With a reply target this becomes an `addReply` (carrying `replyId` for
    /// nested replies), otherwise an `addComment`.
    pub fn begin_submit(&mut self) -> FeedResult<Dispatch> {
        let post_id = self.editable_thread_id()?;
        let thread = self.thread.as_ref().ok_or(StateError::NoActiveThread)?;
        let draft = thread.composer.draft();
        // A bare mention tag is not a message
        if draft.body().trim().is_empty() {
            return Err(ValidationError::Required { field: "text" }.into());
        }
        let text = draft.submission_text();
        let target = thread.composer.target().cloned();
        let username = self.profile.username.clone();
        let user_avatar = self.profile.avatar_url.clone();

        let dispatch = match target {
            None => {
                let request = AddCommentRequest {
                    post_id: post_id.clone(),
                    username: username.clone(),
                    user_avatar: user_avatar.clone(),
                    text: text.clone(),
                };
                validation::validate_add_comment(&request)?;
                let optimistic = Comment {
                    id: String::new(),
                    username,
                    user_avatar,
                    text,
                    likes: 0,
                    time_ago: JUST_NOW.to_string(),
                    replies: Vec::new(),
                    liked: false,
                };
                let pending = self
                    .coordinator
                    .apply_add_comment(&mut self.store, &post_id, optimistic)?;
                Dispatch {
                    pending,
                    op: RemoteOp::AddComment(request),
                }
            }
            Some(target) => {
                let request = AddReplyRequest {
                    post_id: post_id.clone(),
                    comment_id: target.comment_id.clone(),
                    reply_id: target.reply_id.clone(),
                    username: username.clone(),
                    user_avatar: user_avatar.clone(),
                    text: text.clone(),
                };
                validation::validate_add_reply(&request)?;
                let optimistic = Reply {
                    id: String::new(),
                    username,
                    user_avatar,
                    text,
                    likes: 0,
                    time_ago: JUST_NOW.to_string(),
                    liked: false,
                };
                let pending = self.coordinator.apply_add_reply(
                    &mut self.store,
                    &post_id,
                    &target.comment_id,
                    optimistic,
                )?;
                Dispatch {
                    pending,
                    op: RemoteOp::AddReply(request),
                }
            }
        };
        log_mutation!(
            self.log_config,
            "optimistic {} in thread {} as {:?}",
            dispatch.op.procedure(),
            post_id,
            dispatch.pending.provisional_id()
        );
        Ok(dispatch)
    }

    pub async fn submit_draft(&mut self) -> FeedResult<()> {
        let dispatch = self.begin_submit()?;
        self.dispatch(dispatch).await
    }

    // Settlement

    async fn dispatch(&mut self, dispatch: Dispatch) -> FeedResult<()> {
        let Dispatch { pending, op } = dispatch;
        log_api_call!(self.log_config, "{} for {}", op.procedure(), pending.key());
        let outcome = op.send(&self.transport).await;
        self.finish(pending, outcome)
    }

    /// Settle a mutation started with one of the `begin_*` methods.
    ///
    /// A transport failure reverts the optimistic change, queues an error
    /// notice and is returned as `FeedError::Transport`.
    pub fn finish(
        &mut self,
        pending: PendingMutation,
        outcome: Result<Confirmation, ApiError>,
    ) -> FeedResult<()> {
        let kind = pending.kind();
        let post_id = pending.key().post_id().to_string();
        let delivered = outcome.is_ok();

        let settlement = self.coordinator.commit(&mut self.store, pending, outcome);
        log_mutation!(self.log_config, "{:?} on {} settled: {:?}", kind, post_id, settlement);

        // A delivered message must not stay in the compose box, even if a refetch superseded it
        if delivered && matches!(kind, MutationKind::AddComment | MutationKind::AddReply) {
            if let Some(thread) = self.thread.as_mut().filter(|t| t.post_id == post_id) {
                thread.composer.reset();
            }
        }

        match settlement {
            Settlement::Confirmed | Settlement::Superseded => Ok(()),
            Settlement::Reverted(err) => {
                log::warn!("{:?} on {} reverted: {}", kind, post_id, err);
                self.push_error(&err);
                Err(FeedError::Transport(err))
            }
        }
    }
}

fn comment_key(post_id: &str, comment_id: &str, reply_id: Option<&str>) -> EntityKey {
    match reply_id {
        Some(reply_id) => EntityKey::Reply {
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
            reply_id: reply_id.to_string(),
        },
        None => EntityKey::Comment {
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
        },
    }
}

#[cfg(test)]
mod tests;
