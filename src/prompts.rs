//! Prompt text for every command, rendered from the templates under `src/prompts/`.
//!
//! Rendering is strict: a template that references a variable the caller did
//! not pass fails with [`ConsError::Template`] instead of emitting it verbatim.
//! Optional inputs are passed as empty strings.

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value, context};

use crate::error::{ConsError, Result};
use crate::ledger::RoundEntry;
use crate::types::Perspective;

const TEMPLATES: &[(&str, &str)] = &[
    ("system.j2", include_str!("prompts/system.j2")),
    ("rounds.j2", include_str!("prompts/rounds.j2")),
    ("perspective_list.j2", include_str!("prompts/perspective_list.j2")),
    ("first_round.j2", include_str!("prompts/first_round.j2")),
    ("subsequent_round.j2", include_str!("prompts/subsequent_round.j2")),
    ("interview.j2", include_str!("prompts/interview.j2")),
    ("perspectives.j2", include_str!("prompts/perspectives.j2")),
    ("additional_perspective.j2", include_str!("prompts/additional_perspective.j2")),
    ("clarify.j2", include_str!("prompts/clarify.j2")),
    ("bias.j2", include_str!("prompts/bias.j2")),
    ("stress.j2", include_str!("prompts/stress.j2")),
    ("summary.j2", include_str!("prompts/summary.j2")),
];

/// Analyses computed over the whole discussion history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Bias,
    Stress,
    Summary,
}

impl Analysis {
    fn template(self) -> &'static str {
        match self {
            Analysis::Bias => "bias.j2",
            Analysis::Stress => "stress.j2",
            Analysis::Summary => "summary.j2",
        }
    }
}

pub struct PromptAssembler {
    env: Environment<'static>,
}

impl PromptAssembler {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source).map_err(|e| template_error(name, e))?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| template_error(name, e))?;
        template.render(ctx).map_err(|e| template_error(name, e))
    }

    pub fn system(&self) -> Result<String> {
        self.render("system.j2", context! {})
    }

    pub fn first_round(
        &self,
        description: &str,
        perspectives: &[Perspective],
        guidance: &str,
    ) -> Result<String> {
        if perspectives.is_empty() {
            return Err(ConsError::missing(
                "No perspectives found. Generate them first with 'cons perspectives generate'.",
            ));
        }
        self.render(
            "first_round.j2",
            context! { description, perspectives, guidance },
        )
    }

    pub fn subsequent_round(
        &self,
        description: &str,
        history: &[RoundEntry],
        round: u32,
        user_input: &str,
    ) -> Result<String> {
        self.render(
            "subsequent_round.j2",
            context! { description, history, round, user_input },
        )
    }

    pub fn interview(
        &self,
        description: &str,
        perspective: &Perspective,
        discussion: &[RoundEntry],
        interview: &[RoundEntry],
        round: u32,
        user_input: &str,
    ) -> Result<String> {
        self.render(
            "interview.j2",
            context! { description, perspective, discussion, interview, round, user_input },
        )
    }

    pub fn perspectives(&self, description: &str, count: u8) -> Result<String> {
        self.render("perspectives.j2", context! { description, count })
    }

    pub fn additional_perspective(
        &self,
        description: &str,
        existing: &[Perspective],
        request: &str,
    ) -> Result<String> {
        self.render(
            "additional_perspective.j2",
            context! { description, existing, request },
        )
    }

    pub fn clarify(&self, description: &str) -> Result<String> {
        self.render("clarify.j2", context! { description })
    }

    pub fn analysis(
        &self,
        analysis: Analysis,
        description: &str,
        perspectives: &[Perspective],
        history: &[RoundEntry],
    ) -> Result<String> {
        self.render(
            analysis.template(),
            context! { description, perspectives, history },
        )
    }
}

fn template_error(name: &str, err: minijinja::Error) -> ConsError {
    ConsError::Template {
        name: name.to_string(),
        reason: format!("{:#}", err),
    }
}
