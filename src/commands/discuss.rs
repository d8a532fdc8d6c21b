use tracing::info;

use crate::commands::{Session, open_in_editor};
use crate::console::{Console, EditorInput, editable};
use crate::error::{ConsError, Result};
use crate::ledger::{Artifact, RoundKind};
use crate::pipeline::InputRequest;
use crate::topic::TopicContext;
use crate::types::Discussion;

fn guidance_prefill(round: u32) -> String {
    if round == 1 {
        "# Guidance for round 1\n\n".to_string()
    } else {
        format!(
            "# Guidance for round {}\n\n\
             Answer questions from the previous round, or name an area to focus on next.\n\n",
            round
        )
    }
}

/// `cons discuss`: run round `round`, or the next one.
pub async fn discuss(session: &Session, round: Option<u32>) -> Result<Vec<Discussion>> {
    let topic = &session.topic;
    let description = topic.description()?;
    let round = match round {
        Some(0) => return Err(ConsError::missing("Rounds start at 1.")),
        Some(round) => round,
        None => topic.latest_discussion_round() + 1,
    };

    // Checked before any input is gathered so nothing is written.
    let perspectives = if round == 1 {
        topic.require_perspectives()?
    } else {
        Vec::new()
    };
    let history = topic.ledger().history(RoundKind::Discussion, None, round);

    info!("Starting discussion round {}", round);
    let input = InputRequest::new(
        topic.discussion_file(round, Artifact::Input),
        guidance_prefill(round),
    );
    let response_file = topic.discussion_file(round, Artifact::Response);

    session
        .executor
        .execute(
            Some(input),
            |user_input| {
                Console::display_loading(&format!("discussion round {}", round));
                if round == 1 {
                    session
                        .prompts
                        .first_round(&description, &perspectives, user_input)
                } else {
                    session
                        .prompts
                        .subsequent_round(&description, &history, round, user_input)
                }
            },
            &response_file,
            |response: &Vec<Discussion>| {
                Console::display_response(response);
                Console::display_saved(&response_file);
            },
        )
        .await
}

/// `cons discuss --edit N`: open round N's files in the editor.
pub async fn edit_round(topic: &TopicContext, editor: &EditorInput, round: u32) -> Result<()> {
    let latest = topic.latest_discussion_round();
    if round == 0 || round > latest {
        return Err(ConsError::missing(format!(
            "Round {} does not exist (latest is {}).",
            round, latest
        )));
    }
    let files: Vec<_> = [Artifact::Input, Artifact::Response]
        .into_iter()
        .map(|artifact| topic.discussion_file(round, artifact))
        .filter(|path| editable(path))
        .collect();
    open_in_editor(editor, files).await
}
