use anyhow::{bail, Result};
use picfeed_types::Post;

use crate::api::Transport;
use crate::app::FeedSession;
use crate::error::FeedResult;
use crate::log_debug;

pub const HELP: &str = "\
Commands:
  load                              reload the feed
  show [post]                       print the feed, or one post with its comments
  open <post>                       open the comments of a post
  close                             close the comments
  like <post> [comment [reply]]     like a post, comment or reply
  unlike <post> [comment [reply]]   remove a like
  reply <comment> [reply]           reply to a comment or to a reply in it
  cancel                            stop replying, keep the typed text
  type <text>                       replace the compose box content
  submit                            send the compose box
  post <image url> <caption>        publish a new post
  help                              show this help
  quit                              exit";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load,
    Show(Option<String>),
    Open(String),
    Close,
    Like {
        post_id: String,
        comment_id: Option<String>,
        reply_id: Option<String>,
    },
    Unlike {
        post_id: String,
        comment_id: Option<String>,
        reply_id: Option<String>,
    },
    Reply {
        comment_id: String,
        reply_id: Option<String>,
    },
    Cancel,
    Type(String),
    Submit,
    Post { image: String, caption: String },
    Help,
    Quit,
}

/// Parse a line; `Ok(None)` for a blank one
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line
        .trim_start_matches(' ')
        .trim_end_matches(|c| c == '\r' || c == '\n');
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match (name, args.as_slice()) {
        ("", _) => return Ok(None),
        ("load", []) => Command::Load,
        ("show", []) => Command::Show(None),
        ("show", [post_id]) => Command::Show(Some(post_id.to_string())),
        ("open", [post_id]) => Command::Open(post_id.to_string()),
        ("close", []) => Command::Close,
        ("like" | "unlike", [post_id, ids @ ..]) if ids.len() <= 2 => {
            let post_id = post_id.to_string();
            let comment_id = ids.first().map(|s| s.to_string());
            let reply_id = ids.get(1).map(|s| s.to_string());
            if name == "like" {
                Command::Like { post_id, comment_id, reply_id }
            } else {
                Command::Unlike { post_id, comment_id, reply_id }
            }
        }
        ("reply", [comment_id]) => Command::Reply {
            comment_id: comment_id.to_string(),
            reply_id: None,
        },
        ("reply", [comment_id, reply_id]) => Command::Reply {
            comment_id: comment_id.to_string(),
            reply_id: Some(reply_id.to_string()),
        },
        ("cancel", []) => Command::Cancel,
        // The rest of the line is taken verbatim, spaces included
        ("type", _) => Command::Type(rest.to_string()),
        ("submit", []) => Command::Submit,
        ("post", [image, ..]) if args.len() > 1 => {
            let caption = rest.trim_start().strip_prefix(*image).unwrap_or_default().trim();
            Command::Post {
                image: image.to_string(),
                caption: caption.to_string(),
            }
        }
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        _ => bail!("Unrecognized command '{}'. Type 'help' for the list.", line.trim()),
    };
    Ok(Some(command))
}

/// Run a command against the session, returning text to print
pub async fn handle_command<T: Transport>(
    session: &mut FeedSession<T>,
    command: Command,
) -> FeedResult<Option<String>> {
    log_debug!(session.log_config, "command {:?}", command);
    match command {
        Command::Load => {
            session.load_posts().await?;
            Ok(Some(render_feed(session)))
        }
        Command::Show(None) => Ok(Some(render_feed(session))),
        Command::Show(Some(post_id)) => Ok(Some(match session.post(&post_id) {
            Some(post) => render_thread(post),
            None => format!("No post {}", post_id),
        })),
        Command::Open(post_id) => {
            session.open_thread(&post_id)?;
            Ok(Some(render_compose(session)))
        }
        Command::Close => {
            session.close_thread();
            Ok(None)
        }
        Command::Like { post_id, comment_id: None, .. } => {
            session.like(&post_id).await?;
            Ok(None)
        }
        Command::Like { post_id, comment_id: Some(comment_id), reply_id } => {
            session.like_comment(&post_id, &comment_id, reply_id.as_deref())?;
            Ok(None)
        }
        Command::Unlike { post_id, comment_id: None, .. } => {
            session.unlike(&post_id).await?;
            Ok(None)
        }
        Command::Unlike { post_id, comment_id: Some(comment_id), reply_id } => {
            session.unlike_comment(&post_id, &comment_id, reply_id.as_deref())?;
            Ok(None)
        }
        Command::Reply { comment_id, reply_id: None } => {
            session.reply_to_comment(&comment_id)?;
            Ok(Some(render_compose(session)))
        }
        Command::Reply { comment_id, reply_id: Some(reply_id) } => {
            session.reply_to_reply(&comment_id, &reply_id)?;
            Ok(Some(render_compose(session)))
        }
        Command::Cancel => {
            session.cancel_reply()?;
            Ok(Some(render_compose(session)))
        }
        Command::Type(text) => {
            session.edit_draft(&text)?;
            Ok(Some(render_compose(session)))
        }
        Command::Submit => {
            session.submit_draft().await?;
            Ok(session
                .active_thread()
                .and_then(|t| session.post(&t.post_id))
                .map(render_thread))
        }
        Command::Post { image, caption } => {
            let post = session.create_post(&image, &caption).await?;
            Ok(Some(format!("Posted {}", post.id)))
        }
        Command::Help => Ok(Some(HELP.to_string())),
        Command::Quit => Ok(None),
    }
}

fn like_marker(liked: bool) -> &'static str {
    if liked {
        "♥"
    } else {
        "♡"
    }
}

fn render_post_line(post: &Post) -> String {
    format!(
        "[{}] @{} · {}\n    {}\n    {} {} · {} comments",
        post.id,
        post.username,
        post.time_ago,
        post.caption,
        like_marker(post.liked),
        post.likes,
        post.total_comments()
    )
}

pub fn render_feed<T: Transport>(session: &FeedSession<T>) -> String {
    if session.posts().is_empty() {
        return "No posts yet. Try 'load'.".to_string();
    }
    session
        .posts()
        .iter()
        .map(render_post_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A post with its comments, replies indented under their comment
pub fn render_thread(post: &Post) -> String {
    let mut lines = vec![render_post_line(post)];
    for comment in &post.comments {
        lines.push(format!(
            "  [{}] @{}: {}  {} {}",
            comment.id,
            comment.username,
            comment.text,
            like_marker(comment.liked),
            comment.likes
        ));
        for reply in &comment.replies {
            lines.push(format!(
                "      [{}] @{}: {}  {} {}",
                reply.id,
                reply.username,
                reply.text,
                like_marker(reply.liked),
                reply.likes
            ));
        }
    }
    lines.join("\n")
}

/// The compose box of the open thread
pub fn render_compose<T: Transport>(session: &FeedSession<T>) -> String {
    let Some(thread) = session.active_thread() else {
        return "No thread open".to_string();
    };
    let mut out = String::new();
    if let Some(target) = thread.composer.target() {
        out.push_str(&format!("Replying to @{}\n", target.username));
    }
    out.push_str(&format!("[{}] > {}", thread.post_id, thread.composer.text()));
    if session.is_submitting() {
        out.push_str("  (sending...)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line_is_nothing() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   \n").unwrap(), None);
    }

    #[test]
    fn test_like_targets() {
        assert_eq!(
            parse("like p1"),
            Command::Like {
                post_id: "p1".to_string(),
                comment_id: None,
                reply_id: None
            }
        );
        assert_eq!(
            parse("unlike p1 c3 r7"),
            Command::Unlike {
                post_id: "p1".to_string(),
                comment_id: Some("c3".to_string()),
                reply_id: Some("r7".to_string())
            }
        );
        assert!(parse_command("like p1 c3 r7 extra").is_err());
        assert!(parse_command("like").is_err());
    }

    #[test]
    fn test_type_keeps_text_verbatim() {
        assert_eq!(
            parse("type @dave  two  spaces "),
            Command::Type("@dave  two  spaces ".to_string())
        );
        assert_eq!(parse("type"), Command::Type(String::new()));
    }

    #[test]
    fn test_post_splits_image_and_caption() {
        assert_eq!(
            parse("post https://img.example.com/a.png Sunset over the bay"),
            Command::Post {
                image: "https://img.example.com/a.png".to_string(),
                caption: "Sunset over the bay".to_string()
            }
        );
        assert!(parse_command("post https://img.example.com/a.png").is_err());
    }

    #[test]
    fn test_reply_forms() {
        assert_eq!(
            parse("reply c3 r7"),
            Command::Reply {
                comment_id: "c3".to_string(),
                reply_id: Some("r7".to_string())
            }
        );
        assert_eq!(
            parse("reply c1"),
            Command::Reply {
                comment_id: "c1".to_string(),
                reply_id: None
            }
        );
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let err = parse_command("frobnicate").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_render_thread_indents_replies() {
        let rendered = render_thread(&crate::tree::fixtures::thread_post());
        assert!(rendered.contains("  [c3] @carol"));
        assert!(rendered.contains("      [r7] @dave"));
    }
}
