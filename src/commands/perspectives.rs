use crate::commands::{Session, open_in_editor};
use crate::console::{Console, EditorInput};
use crate::error::{ConsError, Result};
use crate::pipeline::InputRequest;
use crate::topic::TopicContext;
use crate::types::Perspective;

pub const DEFAULT_COUNT: u8 = 5;
pub const MAX_COUNT: u8 = 10;

/// `cons perspectives generate`: replace the panel with a fresh one.
pub async fn generate(session: &Session, count: Option<u8>) -> Result<Vec<Perspective>> {
    let topic = &session.topic;
    let description = topic.description()?;
    let count = match count {
        Some(count) => validate_count(count)?,
        None => ask_count(session).await?,
    };
    let response_file = topic.perspectives_file();

    Console::display_loading(&format!("{} perspectives", count));
    let perspectives = session
        .executor
        .execute(
            None,
            |_| session.prompts.perspectives(&description, count),
            &response_file,
            |perspectives: &Vec<Perspective>| {
                Console::display_perspectives(perspectives);
                Console::display_saved(&response_file);
            },
        )
        .await?;

    if session.interactive
        && session
            .executor
            .unless_cancelled(Console::confirm("Would you like to edit the perspectives?", false))
            .await?
    {
        return edit(topic, &session.editor).await;
    }
    Ok(perspectives)
}

/// `cons perspectives add`: ask the model for one more perspective.
pub async fn add(session: &Session, description: Option<String>) -> Result<Perspective> {
    let topic = &session.topic;
    let topic_description = topic.description()?;
    let mut perspectives = topic.perspectives()?;

    let input = match &description {
        Some(_) => None,
        None => Some(InputRequest::unsaved("")),
    };
    Console::display_loading("a new perspective");
    let added: Perspective = session
        .executor
        .run(input, |typed| {
            let request = description.as_deref().unwrap_or(typed);
            session
                .prompts
                .additional_perspective(&topic_description, &perspectives, request)
        })
        .await?;

    perspectives.push(added.clone());
    topic.save_perspectives(&perspectives)?;
    Console::display_perspectives(&perspectives);
    Console::display_saved(&topic.perspectives_file());
    Ok(added)
}

/// `cons perspectives edit`: hand-edit the stored JSON, then re-validate it.
pub async fn edit(topic: &TopicContext, editor: &EditorInput) -> Result<Vec<Perspective>> {
    let path = topic.perspectives_file();
    if !path.is_file() {
        return Err(ConsError::missing(
            "No perspectives found. Generate them first with 'cons perspectives generate'.",
        ));
    }
    open_in_editor(editor, vec![path]).await?;
    let perspectives = topic.perspectives()?;
    Console::display_perspectives(&perspectives);
    Ok(perspectives)
}

/// `cons perspectives list`
pub fn list(topic: &TopicContext) -> Result<Vec<Perspective>> {
    let perspectives = topic.require_perspectives()?;
    Console::display_perspectives(&perspectives);
    Ok(perspectives)
}

fn validate_count(count: u8) -> Result<u8> {
    if (1..=MAX_COUNT).contains(&count) {
        Ok(count)
    } else {
        Err(ConsError::missing(format!(
            "Perspective count must be between 1 and {}.",
            MAX_COUNT
        )))
    }
}

async fn ask_count(session: &Session) -> Result<u8> {
    if !session.interactive {
        return Ok(DEFAULT_COUNT);
    }
    let question = format!(
        "How many perspectives? (1-{}) [{}]: ",
        MAX_COUNT, DEFAULT_COUNT
    );
    let answer = session
        .executor
        .unless_cancelled(Console::prompt_user(&question))
        .await?;
    Ok(parse_count(&answer).unwrap_or_else(|| {
        Console::display_warning(&format!("Using the default of {}.", DEFAULT_COUNT));
        DEFAULT_COUNT
    }))
}

/// Blank means the default; anything outside 1..=10 is rejected.
fn parse_count(answer: &str) -> Option<u8> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(DEFAULT_COUNT);
    }
    answer.parse::<u8>().ok().and_then(|n| validate_count(n).ok())
}
