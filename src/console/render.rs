use std::path::Path;

use colored::*;

use crate::error::ConsError;
use crate::llm::LlmError;
use crate::types::Perspective;

pub fn display_welcome(topic: &Path) {
    println!("{}", "🏛️  Consilio".bright_blue().bold());
    println!(
        "{} {}\n",
        "Topic:".blue(),
        topic.display().to_string().bright_white()
    );
}

pub fn display_loading(what: &str) {
    println!("{}", format!("🔄 Asking the model for {}...", what).blue().italic());
}

pub fn display_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).blue());
}

pub fn display_warning(message: &str) {
    println!("{}", format!("⚠️ {}", message).bright_yellow());
}

pub fn display_saved(path: &Path) {
    println!(
        "{} {}",
        "💾 Saved to".bright_white(),
        path.display()
    );
}

/// Terminal rendering for the Markdown produced by the response models.
pub fn display_markdown(markdown: &str) {
    println!();
    for line in markdown.lines() {
        println!("{}", style_line(line));
    }
    println!();
}

fn style_line(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("### ") {
        return format!("{}", rest.bright_cyan().bold());
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return format!("{}", rest.bright_green().bold());
    }
    if let Some(rest) = line.strip_prefix("# ") {
        return format!("{}", rest.bright_blue().bold().underline());
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return format!("  {} {}", "•".yellow(), rest.white());
    }
    if let Some((number, rest)) = line.split_once(". ")
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
    {
        return format!("  {} {}", format!("{}.", number).yellow(), rest.white());
    }
    if let Some(rest) = line.strip_prefix("**")
        && let Some((label, value)) = rest.split_once(":** ")
    {
        return format!("{} {}", format!("{}:", label).green(), value.white());
    }
    line.white().to_string()
}

pub fn display_perspectives(perspectives: &[Perspective]) {
    println!("\n{}", "👥 Perspectives".bright_yellow().bold());
    println!(
        "{}",
        "┌─────────────────────────────────────────────────────────────".yellow()
    );
    for (idx, perspective) in perspectives.iter().enumerate() {
        display_perspective_row(idx, perspective);
    }
    println!(
        "{}",
        "└─────────────────────────────────────────────────────────────\n".yellow()
    );
}

pub fn display_perspective_row(idx: usize, perspective: &Perspective) {
    println!(
        "{} {}",
        format!("│ [{}]", idx).yellow(),
        perspective.title.bright_white().bold()
    );
    println!("{} {}", "│     Expertise:".yellow(), perspective.expertise.white());
    println!("{} {}", "│     Goal:".yellow(), perspective.goal.white());
    println!("{} {}", "│     Role:".yellow(), perspective.role.white());
}

pub fn display_error(error: &anyhow::Error) {
    if let Some(cons_error) = error.downcast_ref::<ConsError>() {
        display_cons_error(cons_error);
    } else {
        println!(
            "{} {}",
            "❌ Error:".bright_red().bold(),
            error.to_string().red()
        );
        println!("{}", "Please check your configuration and try again.\n".red());
    }
}

pub fn display_cons_error(error: &ConsError) {
    if let Some(stage) = error.stage() {
        println!(
            "{}",
            format!("❌ Failed while {}.", stage).bright_red().bold()
        );
    }

    match error.root() {
        ConsError::Transport(llm_error) => display_llm_error(llm_error),
        ConsError::MissingPrerequisite(message) => {
            println!("{}", format!("🚧 {}", message).bright_yellow().bold());
        }
        ConsError::NoInputProvided => {
            println!("{}", "✋ No input provided. Nothing was sent.".bright_yellow().bold());
            println!(
                "{}",
                "💡 Tip: Save some text in the editor (or pipe it with --stdin) to continue."
                    .yellow()
            );
        }
        ConsError::SchemaValidation(e) => {
            println!(
                "{}",
                format!("⚠️ The model's answer did not match the expected shape: {}", e)
                    .bright_magenta()
                    .bold()
            );
            println!(
                "{}",
                "💡 Tip: Run the command again; nothing was saved.".magenta()
            );
        }
        ConsError::FileIo { .. } | ConsError::Template { .. } => {
            println!("{}", format!("❌ {}", error.root()).bright_red().bold());
        }
        ConsError::Config(e) => {
            println!("{}", format!("⚙️ {}", e).bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Check CONS_API_KEY and the other CONS_* variables, or cons.toml.".red()
            );
        }
        ConsError::Stage { .. } => {
            println!("{}", format!("❌ {}", error).bright_red().bold());
        }
    }
    println!();
}

pub fn display_llm_error(error: &LlmError) {
    let user_message = error.user_message();
    match error {
        LlmError::ServerBusy => {
            println!("{}", user_message.bright_yellow().bold());
            println!(
                "{}",
                "💡 Tip: Try again in a few minutes when server load is lower.".yellow()
            );
        }
        LlmError::NetworkError { .. } => {
            println!("{}", user_message.bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Check your internet connection and CONS_BASE_URL.".red()
            );
        }
        LlmError::Timeout { .. } => {
            println!("{}", user_message.bright_yellow().bold());
            println!(
                "{}",
                "💡 Tip: Raise CONS_TIMEOUT_SECS or try again later.".yellow()
            );
        }
        LlmError::Cancelled => {
            println!("{}", user_message.bright_yellow().bold());
        }
        LlmError::ApiError { status, .. } => {
            println!("{}", user_message.bright_red().bold());
            match *status {
                401 => println!("{}", "💡 Tip: Check your CONS_API_KEY environment variable.".red()),
                403 => println!(
                    "{}",
                    "💡 Tip: Your API key may not have sufficient permissions.".red()
                ),
                429 => println!(
                    "{}",
                    "💡 Tip: You've hit the rate limit. Wait before trying again.".red()
                ),
                _ => println!(
                    "{}",
                    "💡 Tip: Check the provider's API documentation for more details.".red()
                ),
            }
        }
        LlmError::ParseError { .. } => {
            println!("{}", user_message.bright_magenta().bold());
            println!(
                "{}",
                "💡 Tip: The server response was unexpected. Run the command again.".magenta()
            );
        }
        LlmError::ConfigError { .. } => {
            println!("{}", user_message.bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Check your environment variables and configuration.".red()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_bullets_lose_their_markers() {
        colored::control::set_override(false);
        assert_eq!(style_line("# Summary"), "Summary");
        assert_eq!(style_line("## Key Points"), "Key Points");
        assert_eq!(style_line("* Keep the flat"), "  • Keep the flat");
        assert_eq!(style_line("2. Call the bank"), "  2. Call the bank");
        assert_eq!(style_line("**Goal:** Save money"), "Goal: Save money");
        assert_eq!(style_line("Plain. text"), "Plain. text");
    }
}
