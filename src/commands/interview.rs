use tracing::info;

use crate::commands::Session;
use crate::console::Console;
use crate::error::{ConsError, Result};
use crate::ledger::{Artifact, RoundKind};
use crate::pipeline::InputRequest;
use crate::types::Discussion;

const QUESTION_PREFILL: &str = "# Questions for the expert\n\n";

/// `cons interview start`: interview the given perspective, or ask which one.
pub async fn start(session: &Session, perspective: Option<u32>) -> Result<Discussion> {
    let index = match perspective {
        Some(index) => index,
        None => select_perspective(session).await?,
    };
    interview(session, index).await
}

/// `cons interview next`: continue with the most recently interviewed perspective.
pub async fn next(session: &Session, perspective: Option<u32>) -> Result<Discussion> {
    let index = perspective
        .or_else(|| session.topic.most_recent_interview())
        .ok_or_else(|| {
            ConsError::missing("No interviews yet. Start one with 'cons interview start'.")
        })?;
    interview(session, index).await
}

async fn interview(session: &Session, index: u32) -> Result<Discussion> {
    let topic = &session.topic;
    let description = topic.description()?;
    let perspective = topic.perspective(index)?;
    let round = topic.latest_interview_round(index) + 1;

    let ledger = topic.ledger();
    let discussion = ledger.history(
        RoundKind::Discussion,
        None,
        topic.latest_discussion_round() + 1,
    );
    let previous = ledger.history(RoundKind::Interview, Some(index), round);

    info!("Interviewing perspective #{} ({}), round {}", index, perspective.title, round);
    Console::display_info(&format!(
        "Interviewing #{} {} (round {})",
        index, perspective.title, round
    ));
    let input = InputRequest::new(
        topic.interview_file(index, round, Artifact::Input),
        QUESTION_PREFILL,
    );
    let response_file = topic.interview_file(index, round, Artifact::Response);

    session
        .executor
        .execute(
            Some(input),
            |question| {
                Console::display_loading(&format!("{}'s answer", perspective.title));
                session.prompts.interview(
                    &description,
                    &perspective,
                    &discussion,
                    &previous,
                    round,
                    question,
                )
            },
            &response_file,
            |response: &Discussion| {
                Console::display_response(response);
                Console::display_saved(&response_file);
            },
        )
        .await
}

async fn select_perspective(session: &Session) -> Result<u32> {
    let perspectives = session.topic.require_perspectives()?;
    if !session.interactive {
        return Err(ConsError::missing(
            "Pass --perspective when reading input from stdin.",
        ));
    }

    Console::display_perspectives(&perspectives);
    loop {
        let answer = session
            .executor
            .unless_cancelled(Console::prompt_user("Select perspective number: "))
            .await?;
        if answer.is_empty() {
            return Err(ConsError::NoInputProvided);
        }
        match parse_choice(&answer, perspectives.len()) {
            Some(index) => return Ok(index),
            None => Console::display_warning(&format!(
                "Invalid selection. Choose 0-{}.",
                perspectives.len() - 1
            )),
        }
    }
}

fn parse_choice(answer: &str, count: usize) -> Option<u32> {
    answer
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&index| (index as usize) < count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedInput, ScriptedLlm, session_in};
    use crate::types::Perspective;
    use serde_json::json;
    use std::fs;

    fn panel() -> Vec<Perspective> {
        ["Economist", "Educator"]
            .into_iter()
            .map(|title| Perspective {
                title: title.into(),
                expertise: "e".into(),
                goal: "g".into(),
                role: "r".into(),
            })
            .collect()
    }

    fn answer() -> serde_json::Value {
        json!({"perspective": "Educator", "opinion": "Visit the schools."})
    }

    #[test]
    fn choices_must_be_in_range() {
        assert_eq!(parse_choice("1", 2), Some(1));
        assert_eq!(parse_choice(" 0 ", 2), Some(0));
        assert_eq!(parse_choice("2", 2), None);
        assert_eq!(parse_choice("-1", 2), None);
        assert_eq!(parse_choice("one", 2), None);
    }

    #[tokio::test]
    async fn interview_rounds_advance_per_perspective() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(answer()), Ok(answer())]);
        let input = ScriptedInput::reply("Which district?");
        let session = session_in(dir.path(), &llm, &input);
        let topic = &session.topic;
        fs::write(topic.readme_file(), "Move?").unwrap();
        topic.save_perspectives(&panel()).unwrap();

        start(&session, Some(1)).await.unwrap();
        next(&session, None).await.unwrap();

        assert_eq!(topic.latest_interview_round(1), 2);
        assert_eq!(topic.latest_interview_round(0), 0);
        assert!(topic.interview_file(1, 2, Artifact::Response).exists());
        let second = &llm.requests()[1].prompt;
        assert!(second.contains("Visit the schools."));
        assert!(second.contains("Title: Educator"));
    }

    #[tokio::test]
    async fn next_without_history_is_a_missing_prerequisite() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![]);
        let session = session_in(dir.path(), &llm, &ScriptedInput::reply("q"));
        fs::write(session.topic.readme_file(), "Move?").unwrap();
        session.topic.save_perspectives(&panel()).unwrap();

        assert!(matches!(
            next(&session, None).await.unwrap_err(),
            ConsError::MissingPrerequisite(_)
        ));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_perspective_is_rejected_before_input() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![]);
        let input = ScriptedInput::reply("q");
        let session = session_in(dir.path(), &llm, &input);
        fs::write(session.topic.readme_file(), "Move?").unwrap();
        session.topic.save_perspectives(&panel()).unwrap();

        assert!(start(&session, Some(7)).await.is_err());
        assert_eq!(input.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_selection_starts_no_interview() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![]);
        let input = ScriptedInput::reply("q");
        let mut session = session_in(dir.path(), &llm, &input);
        session.interactive = true;
        fs::write(session.topic.readme_file(), "Move?").unwrap();
        session.topic.save_perspectives(&panel()).unwrap();
        session.executor.cancellation().cancel();

        assert!(matches!(
            start(&session, None).await.unwrap_err(),
            ConsError::NoInputProvided
        ));
        assert_eq!(input.calls(), 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn selection_is_refused_without_a_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![]);
        let session = session_in(dir.path(), &llm, &ScriptedInput::reply("q"));
        fs::write(session.topic.readme_file(), "Move?").unwrap();
        session.topic.save_perspectives(&panel()).unwrap();

        assert!(matches!(
            start(&session, None).await.unwrap_err(),
            ConsError::MissingPrerequisite(_)
        ));
    }
}
