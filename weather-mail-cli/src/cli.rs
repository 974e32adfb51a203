use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use weather_mail_core::{
    Config,
    config::{DEFAULT_HISTORY_FILE, parse_recipients},
    pipeline,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-mail", version, about = "Daily weather digest by email")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, render and email today's report (default).
    Send,

    /// Render today's report to a file without sending or saving history.
    Preview {
        #[arg(short, long, default_value = "weather_preview.html")]
        output: PathBuf,
    },

    /// Interactively set API keys and recipients.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command.unwrap_or(Command::Send) {
            Command::Send => send(self.config.as_deref()).await,
            Command::Preview { output } => preview(self.config.as_deref(), &output).await,
            Command::Configure => configure(self.config.as_deref()),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    Ok(config)
}

async fn send(config_path: Option<&Path>) -> Result<()> {
    let settings = load_config(config_path)?.resolve()?;
    let today = Local::now().date_naive();

    info!(
        locations = settings.locations.len(),
        recipients = settings.recipients.len(),
        "starting run"
    );
    let summary = pipeline::run(&settings, today).await?;

    if summary.unavailable > 0 {
        warn!(
            unavailable = summary.unavailable,
            total = summary.locations,
            "some locations used placeholder data"
        );
    }
    info!(
        subject = %summary.subject,
        "sent to {} of {} recipients",
        summary.delivery.sent.len(),
        summary.delivery.total()
    );

    Ok(())
}

async fn preview(config_path: Option<&Path>, output: &Path) -> Result<()> {
    let settings = load_config(config_path)?.resolve()?;
    let today = Local::now().date_naive();

    let report = pipeline::preview(&settings, today).await?;

    fs::write(output, &report.message.html)
        .with_context(|| format!("Failed to write preview: {}", output.display()))?;

    println!("Subject: {}", report.message.subject);
    println!("Preview written to {}", output.display());
    Ok(())
}

fn configure(config_path: Option<&Path>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let weather_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !weather_key.trim().is_empty() {
        config.openweather_api_key = Some(weather_key.trim().to_string());
    }

    let mail_key = Password::new("SendGrid API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !mail_key.trim().is_empty() {
        config.sendgrid_api_key = Some(mail_key.trim().to_string());
    }

    let recipients = Text::new("Recipients (comma-separated):")
        .with_initial_value(&config.recipients.join(", "))
        .prompt()?;
    config.recipients = parse_recipients(&recipients);

    let sender = Text::new("Sender address:")
        .with_initial_value(config.sender.as_deref().unwrap_or_default())
        .with_help_message("Leave empty to send from the first recipient")
        .prompt()?;
    config.sender = Some(sender.trim().to_string()).filter(|s| !s.is_empty());

    let history = Text::new("History file:")
        .with_default(DEFAULT_HISTORY_FILE)
        .with_initial_value(
            &config.history_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        )
        .prompt()?;
    config.history_path = Some(PathBuf::from(history.trim())).filter(|p| !p.as_os_str().is_empty());

    let path = match config_path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };

    if let Err(err) = config.resolve() {
        warn!(error = %err, "configuration saved but still incomplete");
    }
    println!("Configuration saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_is_the_default_command() {
        let cli = Cli::try_parse_from(["weather-mail"]).expect("parses");
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn preview_takes_output_and_global_flags() {
        let cli = Cli::try_parse_from([
            "weather-mail",
            "preview",
            "--output",
            "out.html",
            "--config",
            "alt.toml",
            "-v",
        ])
        .expect("parses");

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Some(Command::Preview { output }) => assert_eq!(output, PathBuf::from("out.html")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn preview_has_default_output() {
        let cli = Cli::try_parse_from(["weather-mail", "preview"]).expect("parses");
        match cli.command {
            Some(Command::Preview { output }) => {
                assert_eq!(output, PathBuf::from("weather_preview.html"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
