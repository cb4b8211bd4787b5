use picfeed_types::Post;

use crate::draft::DraftText;
use crate::error::StateError;
use crate::reply_target::{ReplyTarget, ReplyTargetResolver, TargetChange};

/// Compose session for one thread: the reply target and the draft move together.
///
/// Every method takes `&mut self` and updates both halves before returning,
/// so no caller can observe a target without its tag or the reverse.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    resolver: ReplyTargetResolver,
    draft: DraftText,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&ReplyTarget> {
        self.resolver.current()
    }

    pub fn draft(&self) -> &DraftText {
        &self.draft
    }

    pub fn text(&self) -> String {
        self.draft.text()
    }

    /// Start (or switch) replying. Swaps the managed tag for the new username.
    pub fn set_target(
        &mut self,
        post: &Post,
        comment_id: &str,
        username: &str,
        reply_id: Option<&str>,
    ) -> Result<TargetChange, StateError> {
        let change = self
            .resolver
            .set_target(post, comment_id, username, reply_id)?;
        if let TargetChange::Replaced { .. } = change {
            self.draft.retag(username);
        }
        Ok(change)
    }

    /// User cancelled the reply: drop target and tag, keep the typed text
    pub fn cancel_reply(&mut self) -> Option<ReplyTarget> {
        let previous = self.resolver.clear();
        self.draft.untag();
        previous
    }

    /// Free-text edit; the resolver is not involved
    pub fn set_text(&mut self, text: &str) {
        self.draft.set_text(text);
    }

    /// Clear draft and target together, after a successful submit
    pub fn reset(&mut self) {
        self.resolver.clear();
        self.draft.clear();
    }
}
