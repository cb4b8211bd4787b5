// Library interface for the picfeed client (shared by the binary and tests)
pub mod api;
pub mod app;
pub mod composer;
pub mod config;
pub mod draft;
pub mod error;

#[macro_use]
pub mod logging;

pub mod mutation;
pub mod reply_target;
pub mod server_config;
pub mod tree;
pub mod validation;

pub use app::FeedSession;
pub use error::{FeedError, FeedResult};
