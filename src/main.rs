mod commands;
mod config;
mod console;
mod error;
mod ledger;
mod llm;
mod pipeline;
mod prompts;
mod topic;
mod types;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::{Session, analysis, discuss, init, interview, perspectives};
use crate::config::Config;
use crate::console::{Console, EditorInput, StdinInput};
use crate::error::ConsError;
use crate::llm::ChatClient;
use crate::pipeline::{Executor, InputSource};
use crate::prompts::PromptAssembler;
use crate::topic::TopicContext;

/// Decision support through a panel of simulated expert perspectives
#[derive(Debug, Parser)]
#[command(name = "cons", version)]
struct Args {
    /// Topic directory (defaults to the current directory)
    #[arg(long, global = true)]
    topic: Option<PathBuf>,

    /// Read free-text input from stdin instead of opening an editor
    #[arg(long, global = true, default_value_t = false)]
    stdin: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a topic with a README and cons.toml
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Open the topic README in the editor
    Edit,
    /// Ask clarifying questions about the topic
    Clarify,
    /// Manage the expert perspectives
    #[command(subcommand)]
    Perspectives(PerspectivesCommand),
    /// Run a discussion round
    Discuss {
        /// Round to run (defaults to the next one)
        #[arg(long)]
        round: Option<u32>,
        /// Open an existing round's files instead of running one
        #[arg(long, value_name = "N", conflicts_with = "round")]
        edit: Option<u32>,
    },
    /// Interview a single perspective
    #[command(subcommand)]
    Interview(InterviewCommand),
    /// Stress-test the discussion's conclusions
    Stress,
    /// Look for biases in the discussion
    Bias,
    /// Summarise the discussion
    Summary,
}

#[derive(Debug, Subcommand)]
enum PerspectivesCommand {
    /// Generate a new panel, replacing the current one
    Generate {
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        count: Option<u8>,
    },
    /// Add one perspective
    Add {
        #[arg(long)]
        description: Option<String>,
    },
    /// Edit perspectives.json in the editor
    Edit,
    /// Print the perspectives with their indices
    List,
}

#[derive(Debug, Subcommand)]
enum InterviewCommand {
    /// Interview a perspective (asks which one when not given)
    Start {
        #[arg(long)]
        perspective: Option<u32>,
    },
    /// Continue the most recent interview
    Next {
        #[arg(long)]
        perspective: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // logging
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter_layer)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    match run(args, cancel.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Console::display_error(&e);
            if cancel.is_cancelled() {
                // A stdin read may still be parked on the blocking pool, and
                // dropping the runtime would wait for it.
                std::process::exit(INTERRUPTED);
            }
            ExitCode::FAILURE
        }
    }
}

/// Exit status of a process ended by SIGINT.
const INTERRUPTED: i32 = 130;

async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    if let Command::Init { path } = &args.command {
        let report = init::init(path, chrono::Local::now().date_naive())?;
        for created in &report.created {
            Console::display_info(&format!("Created {}", created.display()));
        }
        for existing in &report.existing {
            Console::display_info(&format!("{} already exists, left unchanged", existing.display()));
        }
        return Ok(());
    }

    let topic = TopicContext::resolve(args.topic.as_deref())?;
    let settings = topic.settings()?;
    let editor = EditorInput::from_key_bindings(settings.key_bindings);
    Console::display_welcome(topic.dir());

    // Commands that never reach the model work without an API key.
    match &args.command {
        Command::Edit => return Ok(commands::edit_description(&topic, &editor).await?),
        Command::Perspectives(PerspectivesCommand::Edit) => {
            perspectives::edit(&topic, &editor).await?;
            return Ok(());
        }
        Command::Perspectives(PerspectivesCommand::List) => {
            perspectives::list(&topic)?;
            return Ok(());
        }
        Command::Discuss {
            edit: Some(round), ..
        } => return Ok(discuss::edit_round(&topic, &editor, *round).await?),
        _ => {}
    }

    let config = Config::load()
        .map_err(ConsError::from)?
        .with_topic_settings(&settings);
    config.validate().map_err(ConsError::from)?;
    let temperature = config.temperature;
    let client = ChatClient::new(config).map_err(ConsError::from)?;
    info!("Using model {}", client.model());

    // First Ctrl-C abandons the pending input or model call; a second one exits.
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(INTERRUPTED);
            }
        }
    });

    let prompts = PromptAssembler::new()?;
    let input: Box<dyn InputSource> = if args.stdin {
        Box::new(StdinInput)
    } else {
        Box::new(editor.clone())
    };
    let executor = Executor::new(Box::new(client), input, prompts.system()?, temperature)
        .with_cancellation(cancel);
    let session = Session {
        topic,
        prompts,
        executor,
        editor,
        interactive: !args.stdin,
    };

    match args.command {
        Command::Clarify => {
            analysis::clarify(&session).await?;
        }
        Command::Perspectives(PerspectivesCommand::Generate { count }) => {
            perspectives::generate(&session, count).await?;
        }
        Command::Perspectives(PerspectivesCommand::Add { description }) => {
            perspectives::add(&session, description).await?;
        }
        Command::Discuss { round, .. } => {
            discuss::discuss(&session, round).await?;
        }
        Command::Interview(InterviewCommand::Start { perspective }) => {
            interview::start(&session, perspective).await?;
        }
        Command::Interview(InterviewCommand::Next { perspective }) => {
            interview::next(&session, perspective).await?;
        }
        Command::Stress => {
            analysis::stress(&session).await?;
        }
        Command::Bias => {
            analysis::bias(&session).await?;
        }
        Command::Summary => {
            analysis::summary(&session).await?;
        }
        Command::Init { .. }
        | Command::Edit
        | Command::Perspectives(PerspectivesCommand::Edit | PerspectivesCommand::List) => {}
    }
    Ok(())
}
