use std::path::PathBuf;

use crate::commands::Session;
use crate::console::Console;
use crate::error::{ConsError, Result};
use crate::ledger::RoundKind;
use crate::prompts::Analysis;
use crate::types::{BiasAnalysis, Clarification, ResponseModel, StressAnalysis, Summary};

/// `cons clarify`: questions about the README before any discussion.
pub async fn clarify(session: &Session) -> Result<Clarification> {
    let description = session.topic.description()?;
    let response_file = session.topic.clarification_file();

    Console::display_loading("clarifying questions");
    session
        .executor
        .execute(
            None,
            |_| session.prompts.clarify(&description),
            &response_file,
            |response: &Clarification| {
                Console::display_response(response);
                Console::display_saved(&response_file);
            },
        )
        .await
}

pub async fn bias(session: &Session) -> Result<BiasAnalysis> {
    analyse(session, Analysis::Bias, session.topic.bias_file()).await
}

pub async fn stress(session: &Session) -> Result<StressAnalysis> {
    analyse(session, Analysis::Stress, session.topic.stress_file()).await
}

pub async fn summary(session: &Session) -> Result<Summary> {
    analyse(session, Analysis::Summary, session.topic.summary_file()).await
}

/// Run one analysis over every discussion round so far.
async fn analyse<R: ResponseModel>(
    session: &Session,
    analysis: Analysis,
    response_file: PathBuf,
) -> Result<R> {
    let topic = &session.topic;
    let description = topic.description()?;
    let latest = topic.latest_discussion_round();
    if latest == 0 {
        return Err(ConsError::missing(
            "No discussion rounds yet. Start one with 'cons discuss'.",
        ));
    }
    let perspectives = topic.perspectives()?;
    let history = topic
        .ledger()
        .history(RoundKind::Discussion, None, latest + 1);

    Console::display_loading(&R::name());
    session
        .executor
        .execute(
            None,
            |_| {
                session
                    .prompts
                    .analysis(analysis, &description, &perspectives, &history)
            },
            &response_file,
            |response: &R| {
                Console::display_response(response);
                Console::display_saved(&response_file);
            },
        )
        .await
}
