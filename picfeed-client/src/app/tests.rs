use super::*;
use crate::api::ApiResult;
use crate::tree::fixtures::{post, thread_post};
use async_trait::async_trait;
use std::sync::Mutex;

/// A remote call as seen by the mock server
#[derive(Debug, Clone, PartialEq)]
enum Call {
    GetPosts,
    GetPostById(String),
    CreatePost(CreatePostRequest),
    LikePost(String),
    UnlikePost(String),
    AddComment(AddCommentRequest),
    AddReply(AddReplyRequest),
}

/// Scripted transport: serves `posts`, fails the procedures listed in `failing`
#[derive(Default)]
struct MockTransport {
    posts: Mutex<Vec<Post>>,
    failing: Mutex<Vec<&'static str>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Default::default()
        }
    }

    fn fail(&self, procedure: &'static str) {
        self.failing.lock().unwrap().push(procedure);
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn set_server_likes(&self, post_id: &str, likes: u32) {
        let mut posts = self.posts.lock().unwrap();
        if let Some(p) = posts.iter_mut().find(|p| p.id == post_id) {
            p.likes = likes;
        }
    }

    fn record(&self, procedure: &'static str, call: Call) -> ApiResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&procedure) {
            return Err(ApiError::Api("connection refused".to_string()));
        }
        Ok(())
    }

    fn adjust_likes(&self, post_id: &str, delta: i64) -> ApiResult<Post> {
        let mut posts = self.posts.lock().unwrap();
        let p = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| ApiError::NotFound(post_id.to_string()))?;
        p.likes = (i64::from(p.likes) + delta).max(0) as u32;
        Ok(p.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_posts(&self) -> ApiResult<Vec<Post>> {
        self.record("getPosts", Call::GetPosts)?;
        Ok(self.posts.lock().unwrap().clone())
    }

    async fn get_post_by_id(&self, post_id: &str) -> ApiResult<Post> {
        self.record("getPostById", Call::GetPostById(post_id.to_string()))?;
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(post_id.to_string()))
    }

    async fn create_post(&self, request: &CreatePostRequest) -> ApiResult<Post> {
        self.record("createPost", Call::CreatePost(request.clone()))?;
        let mut created = post("p100", 0, Vec::new());
        created.username = request.username.clone();
        created.caption = request.caption.clone();
        created.image = request.image.clone();
        self.posts.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn like_post(&self, post_id: &str) -> ApiResult<Post> {
        self.record("likePost", Call::LikePost(post_id.to_string()))?;
        self.adjust_likes(post_id, 1)
    }

    async fn unlike_post(&self, post_id: &str) -> ApiResult<Post> {
        self.record("unlikePost", Call::UnlikePost(post_id.to_string()))?;
        self.adjust_likes(post_id, -1)
    }

    async fn add_comment(&self, request: &AddCommentRequest) -> ApiResult<Comment> {
        self.record("addComment", Call::AddComment(request.clone()))?;
        Ok(Comment {
            id: "c100".to_string(),
            username: request.username.clone(),
            user_avatar: request.user_avatar.clone(),
            text: request.text.clone(),
            likes: 0,
            time_ago: "1s ago".to_string(),
            replies: Vec::new(),
            liked: false,
        })
    }

    async fn add_reply(&self, request: &AddReplyRequest) -> ApiResult<Reply> {
        self.record("addReply", Call::AddReply(request.clone()))?;
        Ok(Reply {
            id: "r100".to_string(),
            username: request.username.clone(),
            user_avatar: request.user_avatar.clone(),
            text: request.text.clone(),
            likes: 0,
            time_ago: "1s ago".to_string(),
            liked: false,
        })
    }
}

fn profile() -> Profile {
    Profile {
        username: "me".to_string(),
        avatar_url: "https://img.example.com/me.png".to_string(),
    }
}

/// Session with p1 (10 likes, thread c1 + c3{r7 dave, r8 erin}) and p2 loaded
async fn loaded_session() -> FeedSession<MockTransport> {
    let transport = MockTransport::with_posts(vec![thread_post(), post("p2", 0, Vec::new())]);
    let mut session = FeedSession::new(transport, profile()).with_log_config(LogConfig::disabled());
    session.load_posts().await.unwrap();
    session
}

fn remote_calls(session: &FeedSession<MockTransport>) -> Vec<Call> {
    session
        .transport()
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::GetPosts | Call::GetPostById(_)))
        .collect()
}

fn like_state(session: &FeedSession<MockTransport>, post_id: &str) -> (u32, bool) {
    let p = session.post(post_id).unwrap();
    (p.likes, p.liked)
}

#[tokio::test]
async fn test_load_posts_fills_feed() {
    let session = loaded_session().await;
    assert_eq!(session.posts().len(), 2);
    assert_eq!(session.total_comments_count("p1"), Some(4));
    assert!(session.notices().is_empty());
}

#[tokio::test]
async fn test_failed_load_keeps_feed_and_notifies() {
    let mut session = loaded_session().await;
    session.transport().fail("getPosts");

    let err = session.load_posts().await.unwrap_err();
    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(session.posts().len(), 2, "previous feed still shown");

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.starts_with("Network Error"));
    assert!(session.notices().is_empty());
}

#[tokio::test]
async fn test_like_reconciles_with_server_count() {
    let mut session = loaded_session().await;
    // Someone else liked it meanwhile
    session.transport().set_server_likes("p1", 41);

    session.like("p1").await.unwrap();
    assert_eq!(like_state(&session, "p1"), (42, true));
    assert_eq!(remote_calls(&session), vec![Call::LikePost("p1".to_string())]);
    assert!(!session.is_like_in_flight("p1"));
}

#[tokio::test]
async fn test_failed_like_reverts_to_previous_state() {
    let mut session = loaded_session().await;
    session.transport().fail("likePost");

    let err = session.like("p1").await.unwrap_err();
    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(like_state(&session, "p1"), (10, false));
    assert_eq!(session.notices().len(), 1);
    assert!(!session.is_like_in_flight("p1"));
}

#[tokio::test]
async fn test_like_is_visible_before_the_server_answers() {
    let mut session = loaded_session().await;
    let dispatch = session.begin_like("p1").unwrap();
    assert_eq!(like_state(&session, "p1"), (11, true));
    assert!(session.is_like_in_flight("p1"));
    assert!(remote_calls(&session).is_empty());

    let outcome = dispatch.op.send(session.transport()).await;
    session.finish(dispatch.pending, outcome).unwrap();
    assert_eq!(like_state(&session, "p1"), (11, true));
}

#[tokio::test]
async fn test_two_rapid_likes_only_count_once() {
    let mut session = loaded_session().await;
    let first = session.begin_like("p1").unwrap();

    let second = session.begin_like("p1").unwrap_err();
    assert!(matches!(
        second,
        FeedError::State(StateError::MutationInFlight(EntityKey::Post(_)))
    ));
    assert_eq!(like_state(&session, "p1"), (11, true));

    let outcome = first.op.send(session.transport()).await;
    session.finish(first.pending, outcome).unwrap();
    assert_eq!(like_state(&session, "p1"), (11, true));
    assert_eq!(remote_calls(&session).len(), 1);
}

#[tokio::test]
async fn test_like_then_unlike_round_trips() {
    let mut session = loaded_session().await;
    session.like("p1").await.unwrap();
    session.unlike("p1").await.unwrap();
    assert_eq!(like_state(&session, "p1"), (10, false));

    // Already not liked: rejected locally, nothing sent
    let err = session.unlike("p1").await.unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::NotLiked(_))));
    assert_eq!(remote_calls(&session).len(), 2);
}

#[tokio::test]
async fn test_unlike_at_zero_stays_at_zero() {
    let mut session = loaded_session().await;
    session.like("p2").await.unwrap();
    // Server count dropped to 0 behind our back
    session.transport().set_server_likes("p2", 0);
    session.refresh_post("p2").await.unwrap();
    assert_eq!(like_state(&session, "p2"), (0, true), "liked survives the refetch");

    session.unlike("p2").await.unwrap();
    assert_eq!(like_state(&session, "p2"), (0, false));
}

#[tokio::test]
async fn test_toggle_like_follows_liked_flag() {
    let mut session = loaded_session().await;
    session.toggle_like("p1").await.unwrap();
    assert_eq!(like_state(&session, "p1"), (11, true));
    session.toggle_like("p1").await.unwrap();
    assert_eq!(like_state(&session, "p1"), (10, false));

    let err = session.toggle_like("missing").await.unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::PostNotFound(_))));
}

#[tokio::test]
async fn test_like_failing_after_refetch_restores_flag_and_notifies() {
    let mut session = loaded_session().await;
    let dispatch = session.begin_like("p1").unwrap();

    session.transport().set_server_likes("p1", 30);
    session.load_posts().await.unwrap();
    assert_eq!(like_state(&session, "p1"), (30, true));

    session.transport().fail("likePost");
    let outcome = dispatch.op.send(session.transport()).await;
    let err = session.finish(dispatch.pending, outcome).unwrap_err();

    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(like_state(&session, "p1"), (30, false), "refetched count kept, flag restored");
    assert_eq!(session.notices().len(), 1);
    assert!(!session.is_like_in_flight("p1"));

    // The toggle follows the restored flag
    session.transport().recover();
    session.toggle_like("p1").await.unwrap();
    assert_eq!(like_state(&session, "p1"), (31, true));
}

#[tokio::test]
async fn test_like_succeeding_after_refetch_takes_server_count() {
    let mut session = loaded_session().await;
    let dispatch = session.begin_like("p1").unwrap();

    session.transport().set_server_likes("p1", 30);
    session.load_posts().await.unwrap();

    let outcome = dispatch.op.send(session.transport()).await;
    session.finish(dispatch.pending, outcome).unwrap();
    assert_eq!(like_state(&session, "p1"), (31, true));
    assert!(session.notices().is_empty());
}

#[tokio::test]
async fn test_reply_failing_after_refetch_keeps_draft() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.reply_to_comment("c3").unwrap();
    session.edit_draft("@carol lovely").unwrap();

    let dispatch = session.begin_submit().unwrap();
    session.load_posts().await.unwrap();
    let refetched = session.post("p1").unwrap().clone();
    assert_eq!(refetched.comment("c3").unwrap().replies.len(), 2, "provisional reply dropped");

    session.transport().fail("addReply");
    let outcome = dispatch.op.send(session.transport()).await;
    let err = session.finish(dispatch.pending, outcome).unwrap_err();

    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(session.post("p1").unwrap(), &refetched);
    assert_eq!(session.draft_text().as_deref(), Some("@carol lovely"));
    assert_eq!(session.notices().len(), 1);
    assert!(!session.is_submitting());
}

#[tokio::test]
async fn test_comment_delivered_after_refetch_is_shown() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.edit_draft("first!").unwrap();

    let dispatch = session.begin_submit().unwrap();
    session.load_posts().await.unwrap();
    assert_eq!(session.post("p1").unwrap().comments.len(), 2);

    let outcome = dispatch.op.send(session.transport()).await;
    session.finish(dispatch.pending, outcome).unwrap();

    let comments = &session.post("p1").unwrap().comments;
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[2].id, "c100");
    assert_eq!(comments[2].text, "first!");
    assert_eq!(session.draft_text().as_deref(), Some(""));
}

#[tokio::test]
async fn test_like_on_pending_comment_survives_confirmation() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.edit_draft("first!").unwrap();

    let dispatch = session.begin_submit().unwrap();
    let provisional = dispatch.pending.provisional_id().unwrap().to_string();
    session.like_comment("p1", &provisional, None).unwrap();

    let outcome = dispatch.op.send(session.transport()).await;
    session.finish(dispatch.pending, outcome).unwrap();

    let confirmed = session.store().comment("p1", "c100").unwrap();
    assert_eq!((confirmed.likes, confirmed.liked), (1, true));
    session.unlike_comment("p1", "c100", None).unwrap();
    assert_eq!(session.store().comment("p1", "c100").unwrap().likes, 0);
}

#[tokio::test]
async fn test_comment_likes_stay_local() {
    let mut session = loaded_session().await;
    session.like_comment("p1", "c3", Some("r7")).unwrap();
    session.like_comment("p1", "c1", None).unwrap();
    assert_eq!(session.store().reply("p1", "c3", "r7").unwrap().likes, 1);
    let c1 = session.store().comment("p1", "c1").unwrap();
    assert_eq!((c1.likes, c1.liked), (4, true));

    session.unlike_comment("p1", "c3", Some("r7")).unwrap();
    assert_eq!(session.store().reply("p1", "c3", "r7").unwrap().likes, 0);
    assert!(session.unlike_comment("p1", "c3", Some("r7")).is_err());
    assert!(remote_calls(&session).is_empty());
}

#[tokio::test]
async fn test_reply_to_nested_reply_end_to_end() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();

    session.reply_to_reply("c3", "r7").unwrap();
    assert_eq!(session.draft_text().as_deref(), Some("@dave "));
    let target = session.reply_target().unwrap();
    assert_eq!(target.comment_id, "c3");
    assert_eq!(target.reply_id.as_deref(), Some("r7"));

    session.edit_draft("@dave nice shot").unwrap();
    session.submit_draft().await.unwrap();

    assert_eq!(
        remote_calls(&session),
        vec![Call::AddReply(AddReplyRequest {
            post_id: "p1".to_string(),
            comment_id: "c3".to_string(),
            reply_id: Some("r7".to_string()),
            username: "me".to_string(),
            user_avatar: "https://img.example.com/me.png".to_string(),
            text: "@dave nice shot".to_string(),
        })]
    );
    let replies = &session.store().comment("p1", "c3").unwrap().replies;
    assert_eq!(replies.last().unwrap().id, "r100");
    assert_eq!(replies.last().unwrap().text, "@dave nice shot");

    // Target and draft reset together
    assert!(session.reply_target().is_none());
    assert_eq!(session.draft_text().as_deref(), Some(""));
}

#[tokio::test]
async fn test_submit_routes_by_target() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();

    session.reply_to_comment("c1").unwrap();
    session.edit_draft("@alice agreed").unwrap();
    session.submit_draft().await.unwrap();

    session.edit_draft("plain comment").unwrap();
    session.submit_draft().await.unwrap();

    let calls = remote_calls(&session);
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        Call::AddReply(request) => {
            assert_eq!(request.comment_id, "c1");
            assert_eq!(request.reply_id, None);
            assert_eq!(request.text, "@alice agreed");
        }
        other => panic!("expected addReply, got {:?}", other),
    }
    match &calls[1] {
        Call::AddComment(request) => assert_eq!(request.text, "plain comment"),
        other => panic!("expected addComment, got {:?}", other),
    }
    assert_eq!(session.post("p1").unwrap().comments.last().unwrap().id, "c100");
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_transport() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    let before = session.post("p1").unwrap().clone();

    let err = session.submit_draft().await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Validation(ValidationError::Required { field: "text" })
    ));

    // A bare mention tag is not a message either
    session.reply_to_reply("c3", "r7").unwrap();
    assert!(matches!(
        session.submit_draft().await.unwrap_err(),
        FeedError::Validation(ValidationError::Required { .. })
    ));

    session.edit_draft(&format!("@dave {}", "x".repeat(301))).unwrap();
    assert!(matches!(
        session.submit_draft().await.unwrap_err(),
        FeedError::Validation(ValidationError::TooLong { max: 300, .. })
    ));

    assert!(remote_calls(&session).is_empty());
    assert_eq!(session.post("p1").unwrap(), &before, "no optimistic node");
    assert!(session.draft_text().unwrap().starts_with("@dave x"));
}

#[tokio::test]
async fn test_failed_submit_restores_thread_and_keeps_draft() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    let before = session.post("p1").unwrap().clone();
    session.transport().fail("addReply");

    session.reply_to_comment("c3").unwrap();
    session.edit_draft("@carol lovely").unwrap();
    let err = session.submit_draft().await.unwrap_err();

    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(session.post("p1").unwrap(), &before);
    assert_eq!(session.draft_text().as_deref(), Some("@carol lovely"));
    assert_eq!(session.reply_target().unwrap().comment_id, "c3");
    assert_eq!(session.notices().len(), 1);

    // Retry succeeds once the network is back
    session.transport().recover();
    session.submit_draft().await.unwrap();
    assert_eq!(session.store().comment("p1", "c3").unwrap().replies.len(), 3);
}

#[tokio::test]
async fn test_compose_box_is_locked_while_submitting() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.edit_draft("first!").unwrap();

    let dispatch = session.begin_submit().unwrap();
    assert!(session.is_submitting());
    let provisional = dispatch.pending.provisional_id().unwrap().to_string();
    assert!(crate::mutation::is_provisional(&provisional));
    assert_eq!(session.post("p1").unwrap().comments.last().unwrap().id, provisional);

    assert!(matches!(
        session.edit_draft("changed").unwrap_err(),
        FeedError::State(StateError::MutationInFlight(EntityKey::Thread(_)))
    ));
    assert!(session.reply_to_comment("c1").is_err());
    assert!(session.begin_submit().is_err());

    let outcome = dispatch.op.send(session.transport()).await;
    session.finish(dispatch.pending, outcome).unwrap();
    assert!(!session.is_submitting());
    assert_eq!(session.post("p1").unwrap().comments.last().unwrap().id, "c100");
    assert_eq!(session.draft_text().as_deref(), Some(""));
}

#[tokio::test]
async fn test_reply_target_must_be_a_comment() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();

    let err = session.reply_to_comment("r7").unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::TargetIsReply(_))));
    let err = session.reply_to_reply("c1", "r7").unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::ReplyNotFound { .. })));
    assert!(session.reply_target().is_none());
}

#[tokio::test]
async fn test_unknown_comment_never_tags_the_draft() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.edit_draft("hello").unwrap();

    let err = session.reply_to_comment("c404").unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::CommentNotFound { .. })));
    let err = session.reply_to_reply("c3", "r404").unwrap_err();
    assert!(matches!(err, FeedError::State(StateError::ReplyNotFound { .. })));
    assert_eq!(session.draft_text().as_deref(), Some("hello"));
    assert!(session.reply_target().is_none());
}

#[tokio::test]
async fn test_repeated_reply_tap_keeps_single_tag() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.reply_to_comment("c1").unwrap();
    session.edit_draft("@alice hi").unwrap();

    assert_eq!(session.reply_to_comment("c1").unwrap(), TargetChange::Unchanged);
    assert_eq!(session.draft_text().as_deref(), Some("@alice hi"));

    session.reply_to_reply("c3", "r8").unwrap();
    assert_eq!(session.draft_text().as_deref(), Some("@erin hi"));

    session.cancel_reply().unwrap();
    assert_eq!(session.draft_text().as_deref(), Some("hi"));
}

#[tokio::test]
async fn test_compose_requires_open_thread() {
    let mut session = loaded_session().await;
    assert!(matches!(
        session.edit_draft("hello").unwrap_err(),
        FeedError::State(StateError::NoActiveThread)
    ));
    assert!(session.open_thread("missing").is_err());
}

#[tokio::test]
async fn test_switching_threads_starts_fresh_draft() {
    let mut session = loaded_session().await;
    session.open_thread("p1").unwrap();
    session.reply_to_comment("c1").unwrap();
    session.edit_draft("@alice half written").unwrap();

    // Reopening the same thread keeps the draft
    session.open_thread("p1").unwrap();
    assert_eq!(session.draft_text().as_deref(), Some("@alice half written"));

    session.open_thread("p2").unwrap();
    assert_eq!(session.draft_text().as_deref(), Some(""));
    assert!(session.reply_target().is_none());

    let closed = session.close_thread().unwrap();
    assert_eq!(closed.post_id, "p2");
    assert!(session.draft_text().is_none());
}

#[tokio::test]
async fn test_create_post_validates_and_goes_on_top() {
    let mut session = loaded_session().await;

    let err = session.create_post("not a url", "caption").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Validation(ValidationError::InvalidUrl { field: "image" })
    ));
    let err = session
        .create_post("https://img.example.com/x.png", "   ")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeedError::Validation(ValidationError::Required { field: "caption" })
    ));
    assert!(remote_calls(&session).is_empty());

    let created = session
        .create_post("https://img.example.com/x.png", " Sunrise ")
        .await
        .unwrap();
    assert_eq!(created.caption, "Sunrise");
    assert_eq!(session.posts()[0].id, "p100");
    assert_eq!(session.posts()[0].username, "me");
}

#[tokio::test]
async fn test_refresh_post_updates_one_post() {
    let mut session = loaded_session().await;
    session.transport().set_server_likes("p1", 77);
    session.refresh_post("p1").await.unwrap();
    assert_eq!(session.post("p1").unwrap().likes, 77);
    assert_eq!(
        session.transport().calls().last(),
        Some(&Call::GetPostById("p1".to_string()))
    );

    let err = session.refresh_post("missing").await.unwrap_err();
    assert!(matches!(err, FeedError::Transport(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_thread_of_vanished_post_is_closed_on_reload() {
    let mut session = loaded_session().await;
    session.open_thread("p2").unwrap();
    session.transport().posts.lock().unwrap().retain(|p| p.id != "p2");

    session.load_posts().await.unwrap();
    assert!(session.active_thread().is_none());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
}
