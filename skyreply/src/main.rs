use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use skyreply::exit_codes;
use skyreply::io::backend::ConfiguredBackend;
use skyreply::io::bluesky::BlueskyClient;
use skyreply::io::config::{DEFAULT_CONFIG_FILE, MAX_TIMELINE_LIMIT, load_config};
use skyreply::io::console::StdioPrompter;
use skyreply::io::prompt::PromptBuilder;
use skyreply::io::transcript::{TranscriptWriter, record_run};
use skyreply::menu::{MenuOptions, run_menu};
use skyreply::post::{PostRequest, run_post};
use skyreply::reply::run_reply;
use skyreply::session::Collaborators;

#[derive(Parser)]
#[command(
    name = "skyreply",
    version,
    about = "Draft, approve and send Bluesky posts and replies"
)]
struct Cli {
    /// Config file (defaults to `skyreply.toml` in the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dotenv file with credentials (defaults to `.env` if present).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose an original post, rewrite it and send it after approval.
    Post {
        /// Message text; asked for interactively when omitted.
        #[arg(long)]
        text: Option<String>,
        /// Image file to attach.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Categorize the timeline, pick a post and reply to it.
    Reply {
        /// Number of timeline posts to fetch (overrides config).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Interactive menu over both workflows.
    Menu,
}

fn main() {
    skyreply::logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    load_env(cli.env_file.as_deref())?;
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;
    let limit = match &cli.command {
        Command::Reply { limit: Some(limit) } => checked_limit(*limit)?,
        _ => config.timeline.limit,
    };

    let backend = ConfiguredBackend::from_config(&config.backend).context("set up backend")?;
    let network = BlueskyClient::from_config(&config.bluesky).context("set up Bluesky client")?;
    let prompts = PromptBuilder::new()?;
    let prompter = StdioPrompter;
    let collab = Collaborators::new(&network, &backend, &prompter, &prompts);
    let transcript = config.transcript.dir.clone().map(TranscriptWriter::new);

    match cli.command {
        Command::Post { text, image } => {
            let request = PostRequest {
                text,
                image,
                image_alt: config.post.image_alt.clone(),
            };
            let run = run_post(&collab, &request);
            println!("{}", run.outcome);
            record_run(transcript.as_ref(), &run);
            Ok(exit_codes::for_outcome(&run.outcome))
        }
        Command::Reply { .. } => {
            let run = run_reply(&collab, limit);
            println!("{}", run.outcome);
            record_run(transcript.as_ref(), &run);
            Ok(exit_codes::for_outcome(&run.outcome))
        }
        Command::Menu => {
            let options = MenuOptions {
                timeline_limit: limit,
                image_alt: &config.post.image_alt,
                transcript: transcript.as_ref(),
            };
            run_menu(&collab, &options);
            Ok(exit_codes::OK)
        }
    }
}

/// Load credentials from a dotenv file without overriding the environment.
///
/// An explicit file must exist; the default `.env` is optional.
fn load_env(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err).context("load .env"),
        },
    }
    Ok(())
}

fn checked_limit(limit: u32) -> Result<u32> {
    if limit == 0 || limit > MAX_TIMELINE_LIMIT {
        bail!("--limit must be between 1 and {MAX_TIMELINE_LIMIT}");
    }
    Ok(limit)
}
