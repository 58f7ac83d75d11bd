//! Comment command handlers.

use serde::Serialize;
use tabled::Tabled;

use vaccimap_core::{Command as CoreCommand, CommandResult};

use crate::cli::{CommentsArgs, CommentsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

/// A comment with its 1-based position, oldest first.
#[derive(Serialize)]
struct CommentView<'a> {
    index: usize,
    id: &'a str,
    text: &'a str,
}

#[derive(Tabled)]
struct CommentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Comment")]
    text: String,
}

pub async fn handle(
    session: Session,
    args: CommentsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CommentsCommand::List(at) => {
            let key = util::coordinate_key(&at)?;
            let comments = session
                .oneshot(|c| async move {
                    let site = c.require_site(&key)?;
                    c.comments(site.collection, &key).await
                })
                .await?;

            let views: Vec<CommentView<'_>> = comments
                .iter()
                .enumerate()
                .map(|(i, comment)| CommentView {
                    index: i + 1,
                    id: comment.id.as_str(),
                    text: &comment.text,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| CommentRow {
                    index: v.index,
                    text: v.text.to_owned(),
                },
                |v| v.text.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CommentsCommand::Add { at, text } => {
            let key = util::coordinate_key(&at)?;
            let result = session
                .oneshot(|c| async move {
                    let site = c.require_site(&key)?;
                    c.execute(CoreCommand::AddComment {
                        kind: site.collection,
                        key,
                        text,
                    })
                    .await
                })
                .await?;

            if let CommandResult::Comment(comment) = result {
                output::print_output(comment.id.as_str(), global.quiet);
            }
            Ok(())
        }
    }
}
