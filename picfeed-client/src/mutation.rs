//! Optimistic mutations: apply locally, then confirm or revert when the remote call settles.
//!
//! Each mutation goes through three phases:
//!
//! 1. **apply** records a [`MutationSnapshot`] and changes the store right away,
//!    returning a [`PendingMutation`] ticket;
//! 2. **commit** takes the transport outcome and either reconciles the store with
//!    the authoritative payload or reverts it from the snapshot;
//! 3. **settle** (part of every commit) drops the snapshot and releases the
//!    entity's in-flight marker.
//!
//! Only one mutation per [`EntityKey`] may be in flight; a second one is rejected.

use std::collections::HashMap;

use picfeed_types::{Comment, Post, Reply};
use uuid::Uuid;

use crate::api::ApiError;
use crate::error::StateError;
use crate::log_mutation;
use crate::logging::LogConfig;
pub use crate::tree::EntityKey;
use crate::tree::FeedStore;

pub const PROVISIONAL_ID_PREFIX: &str = "pending-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Like,
    Unlike,
    AddComment,
    AddReply,
}

/// State captured right before an optimistic change, used to undo it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationSnapshot {
    /// Like state before the change and the delta actually applied to `likes`
    LikeState { likes: u32, liked: bool, delta: i64 },
    /// The provisional node did not exist before
    Absent {
        provisional_id: String,
        parent_comment_id: Option<String>,
    },
}

/// Authoritative payload returned by a successful remote call
#[derive(Debug, Clone)]
pub enum Confirmation {
    Post(Post),
    Comment(Comment),
    Reply(Reply),
    /// Success without a payload to reconcile
    Ack,
}

/// How a pending mutation ended
#[derive(Debug)]
pub enum Settlement {
    /// Optimistic state kept (and reconciled where a payload was given)
    Confirmed,
    /// Remote call failed; the store is back to the snapshot
    Reverted(ApiError),
    /// The entity was removed meanwhile (or the ticket is stale); the result was ignored
    Superseded,
}

/// Ticket for an applied mutation, handed back to [`MutationCoordinator::commit`]
#[derive(Debug)]
pub struct PendingMutation {
    ticket: u64,
    kind: MutationKind,
    key: EntityKey,
    provisional_id: Option<String>,
}

impl PendingMutation {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Id of the provisional comment or reply inserted by this mutation
    pub fn provisional_id(&self) -> Option<&str> {
        self.provisional_id.as_deref()
    }
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    generation: u64,
    snapshot: MutationSnapshot,
}

pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_ID_PREFIX)
}

fn provisional_id() -> String {
    format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4())
}

fn shift(likes: u32, delta: i64) -> u32 {
    (i64::from(likes) + delta).clamp(0, i64::from(u32::MAX)) as u32
}

fn not_found(key: &EntityKey) -> StateError {
    match key {
        EntityKey::Post(post_id) | EntityKey::Thread(post_id) => {
            StateError::PostNotFound(post_id.clone())
        }
        EntityKey::Comment { post_id, comment_id } => StateError::CommentNotFound {
            post_id: post_id.clone(),
            comment_id: comment_id.clone(),
        },
        EntityKey::Reply { comment_id, reply_id, .. } => StateError::ReplyNotFound {
            comment_id: comment_id.clone(),
            reply_id: reply_id.clone(),
        },
    }
}

#[derive(Debug, Default)]
pub struct MutationCoordinator {
    in_flight: HashMap<EntityKey, InFlight>,
    next_ticket: u64,
    log_config: LogConfig,
}

impl MutationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn is_in_flight(&self, key: &EntityKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn begin(&mut self, store: &FeedStore, key: &EntityKey) -> Result<(u64, u64), StateError> {
        if self.in_flight.contains_key(key) {
            return Err(StateError::MutationInFlight(key.clone()));
        }
        let generation = store
            .generation(key.post_id())
            .ok_or_else(|| StateError::PostNotFound(key.post_id().to_string()))?;
        self.next_ticket += 1;
        Ok((self.next_ticket, generation))
    }

    fn register(
        &mut self,
        ticket: u64,
        generation: u64,
        kind: MutationKind,
        key: EntityKey,
        snapshot: MutationSnapshot,
    ) -> PendingMutation {
        let provisional_id = match &snapshot {
            MutationSnapshot::Absent { provisional_id, .. } => Some(provisional_id.clone()),
            MutationSnapshot::LikeState { .. } => None,
        };
        log_mutation!(self.log_config, "apply {:?} on {} (ticket {})", kind, key, ticket);
        self.in_flight.insert(
            key.clone(),
            InFlight {
                ticket,
                generation,
                snapshot,
            },
        );
        PendingMutation {
            ticket,
            kind,
            key,
            provisional_id,
        }
    }

    pub fn apply_like(&mut self, store: &mut FeedStore, key: EntityKey) -> Result<PendingMutation, StateError> {
        self.apply_like_change(store, key, true)
    }

    pub fn apply_unlike(&mut self, store: &mut FeedStore, key: EntityKey) -> Result<PendingMutation, StateError> {
        self.apply_like_change(store, key, false)
    }

    fn apply_like_change(
        &mut self,
        store: &mut FeedStore,
        key: EntityKey,
        liking: bool,
    ) -> Result<PendingMutation, StateError> {
        let (ticket, generation) = self.begin(store, &key)?;
        let slot = store.like_slot(&key).ok_or_else(|| not_found(&key))?;

        if liking && *slot.liked {
            return Err(StateError::AlreadyLiked(key));
        }
        if !liking && !*slot.liked {
            return Err(StateError::NotLiked(key));
        }
        // Clamped changes record a zero delta, so the revert undoes exactly what was applied
        let delta = match (liking, *slot.likes) {
            (true, u32::MAX) | (false, 0) => 0,
            (true, _) => 1,
            (false, _) => -1,
        };

        let snapshot = MutationSnapshot::LikeState {
            likes: *slot.likes,
            liked: *slot.liked,
            delta,
        };
        *slot.likes = shift(*slot.likes, delta);
        *slot.liked = liking;

        let kind = if liking {
            MutationKind::Like
        } else {
            MutationKind::Unlike
        };
        Ok(self.register(ticket, generation, kind, key, snapshot))
    }

    /// Insert `comment` at the end of the post's comments under a provisional id
    pub fn apply_add_comment(
        &mut self,
        store: &mut FeedStore,
        post_id: &str,
        mut comment: Comment,
    ) -> Result<PendingMutation, StateError> {
        let key = EntityKey::Thread(post_id.to_string());
        let (ticket, generation) = self.begin(store, &key)?;

        let id = provisional_id();
        comment.id = id.clone();
        comment.replies.clear();
        comment.likes = 0;
        comment.liked = false;
        if !store.push_comment(post_id, comment) {
            return Err(not_found(&key));
        }

        let snapshot = MutationSnapshot::Absent {
            provisional_id: id,
            parent_comment_id: None,
        };
        Ok(self.register(ticket, generation, MutationKind::AddComment, key, snapshot))
    }

    /// Append `reply` to the replies of `comment_id` under a provisional id
    pub fn apply_add_reply(
        &mut self,
        store: &mut FeedStore,
        post_id: &str,
        comment_id: &str,
        mut reply: Reply,
    ) -> Result<PendingMutation, StateError> {
        let key = EntityKey::Thread(post_id.to_string());
        let (ticket, generation) = self.begin(store, &key)?;

        if store.comment(post_id, comment_id).is_none() {
            return Err(StateError::CommentNotFound {
                post_id: post_id.to_string(),
                comment_id: comment_id.to_string(),
            });
        }
        let id = provisional_id();
        reply.id = id.clone();
        reply.likes = 0;
        reply.liked = false;
        store.push_reply(post_id, comment_id, reply);

        let snapshot = MutationSnapshot::Absent {
            provisional_id: id,
            parent_comment_id: Some(comment_id.to_string()),
        };
        Ok(self.register(ticket, generation, MutationKind::AddReply, key, snapshot))
    }

    /// Finish a pending mutation with the remote outcome.
    ///
    /// Always settles: the snapshot is dropped and the entity is free again.
    /// If the post was refetched meanwhile, the refetched count is kept, but
    /// a failure still restores the local `liked` flag and is reported.
    pub fn commit(
        &mut self,
        store: &mut FeedStore,
        pending: PendingMutation,
        outcome: Result<Confirmation, ApiError>,
    ) -> Settlement {
        let Some(in_flight) = self.in_flight.remove(&pending.key) else {
            log_mutation!(self.log_config, "no in-flight record for {}", pending.key);
            return Settlement::Superseded;
        };
        if in_flight.ticket != pending.ticket {
            // Stale ticket; the newer mutation keeps its marker
            self.in_flight.insert(pending.key.clone(), in_flight);
            return Settlement::Superseded;
        }
        let refetched = store.generation(pending.key.post_id()) != Some(in_flight.generation);

        match in_flight.snapshot {
            MutationSnapshot::LikeState { likes, liked, delta } => {
                Self::settle_like(store, &pending.key, (likes, liked), delta, refetched, outcome)
            }
            MutationSnapshot::Absent {
                provisional_id,
                parent_comment_id,
            } => self.settle_insert(
                store,
                pending.key.post_id(),
                &provisional_id,
                parent_comment_id.as_deref(),
                outcome,
            ),
        }
    }

    fn settle_like(
        store: &mut FeedStore,
        key: &EntityKey,
        (prior_likes, prior_liked): (u32, bool),
        delta: i64,
        refetched: bool,
        outcome: Result<Confirmation, ApiError>,
    ) -> Settlement {
        match (outcome, store.like_slot(key)) {
            (Ok(Confirmation::Post(server)), Some(slot)) => {
                // Server count is canonical and newer than any refetch; `liked` is ours
                if let EntityKey::Post(_) = key {
                    *slot.likes = server.likes;
                }
                Settlement::Confirmed
            }
            (Ok(_), Some(_)) => Settlement::Confirmed,
            (Ok(_), None) => Settlement::Superseded,
            (Err(err), Some(slot)) => {
                // A refetched count never carried our delta
                if !refetched {
                    *slot.likes = shift(*slot.likes, -delta);
                    debug_assert_eq!(*slot.likes, prior_likes);
                }
                *slot.liked = prior_liked;
                Settlement::Reverted(err)
            }
            // Entity gone; nothing left to restore, but the failure is still reported
            (Err(err), None) => Settlement::Reverted(err),
        }
    }

    fn settle_insert(
        &self,
        store: &mut FeedStore,
        post_id: &str,
        provisional_id: &str,
        parent_comment_id: Option<&str>,
        outcome: Result<Confirmation, ApiError>,
    ) -> Settlement {
        let confirmed = match (outcome, parent_comment_id) {
            (Ok(Confirmation::Comment(server)), None) => {
                if store.comment(post_id, provisional_id).is_some() {
                    store.replace_comment(post_id, provisional_id, server)
                } else {
                    // A refetch dropped the provisional node; add the comment unless the refetch has it
                    store.comment(post_id, &server.id).is_some() || store.push_comment(post_id, server)
                }
            }
            (Ok(Confirmation::Reply(server)), Some(comment_id)) => {
                if store.reply(post_id, comment_id, provisional_id).is_some() {
                    store.replace_reply(post_id, comment_id, provisional_id, server)
                } else {
                    store.reply(post_id, comment_id, &server.id).is_some()
                        || store.push_reply(post_id, comment_id, server)
                }
            }
            (Ok(other), _) => {
                if !matches!(other, Confirmation::Ack) {
                    log_mutation!(self.log_config, "unexpected confirmation payload for {}", provisional_id);
                }
                true
            }
            (Err(err), None) => {
                store.remove_comment(post_id, provisional_id);
                return Settlement::Reverted(err);
            }
            (Err(err), Some(comment_id)) => {
                store.remove_reply(post_id, comment_id, provisional_id);
                return Settlement::Reverted(err);
            }
        };
        if confirmed {
            Settlement::Confirmed
        } else {
            Settlement::Superseded
        }
    }

    /// Like an entity that has no remote like endpoint; applied and settled at once
    pub fn apply_local_like(&mut self, store: &mut FeedStore, key: EntityKey) -> Result<(), StateError> {
        let pending = self.apply_like(store, key)?;
        self.commit(store, pending, Ok(Confirmation::Ack));
        Ok(())
    }

    pub fn apply_local_unlike(&mut self, store: &mut FeedStore, key: EntityKey) -> Result<(), StateError> {
        let pending = self.apply_unlike(store, key)?;
        self.commit(store, pending, Ok(Confirmation::Ack));
        Ok(())
    }
}
