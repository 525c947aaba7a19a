use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod auth;
mod commands;
mod config;
mod error;
mod media;
mod metadata;
mod util;
mod youtube;

use commands::list::OutputFormat;
use metadata::{MetadataPatch, PrivacyStatus, parse_tags};

#[derive(Parser)]
#[command(
    name = "yt-shorts",
    version,
    about = "Upload, list, update and clone YouTube Shorts from the command line"
)]
struct Cli {
    /// Path to config file [default: ~/.config/yt-shorts/config.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate with YouTube (opens browser for OAuth)
    Auth,
    /// Upload one or more videos as Shorts
    Upload {
        /// Video files, uploaded one after another
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Video title
        #[arg(short, long)]
        title: String,
        /// Video description
        #[arg(short, long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Privacy status [default: private]
        #[arg(long, value_enum)]
        privacy: Option<PrivacyStatus>,
        /// Skip video validation
        #[arg(long)]
        skip_validation: bool,
        /// Upload even if validation fails
        #[arg(long)]
        force: bool,
    },
    /// List your channel's videos
    List {
        /// Maximum videos to show (at most 50)
        #[arg(short = 'n', long, default_value_t = 10)]
        max: u32,
        /// Only show videos with this privacy status
        #[arg(long, value_enum)]
        privacy: Option<PrivacyStatus>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Update video metadata
    Update {
        /// Video ID
        id: String,
        /// New video title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Replace tags (comma-separated, "" clears them)
        #[arg(long)]
        tags: Option<String>,
        /// Change privacy status
        #[arg(long, value_enum)]
        privacy: Option<PrivacyStatus>,
    },
    /// Download a video and re-upload it with new metadata
    Clone {
        /// Video ID of the original
        id: String,
        /// Title for the clone
        #[arg(short, long)]
        title: String,
        /// Description [default: the original's]
        #[arg(short, long)]
        description: Option<String>,
        /// Tags [default: the original's]
        #[arg(long)]
        tags: Option<String>,
        /// Privacy status [default: the original's, else private]
        #[arg(long, value_enum)]
        privacy: Option<PrivacyStatus>,
        /// Keep the downloaded video file
        #[arg(long)]
        keep_file: bool,
    },
    /// Check whether a video meets the Shorts requirements
    Validate {
        /// Video file
        file: PathBuf,
    },
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "yt_shorts=info",
        1 => "yt_shorts=debug",
        2 => "yt_shorts=trace",
        _ => "trace",
    };

    // stdout carries tables and JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Auth => {
            println!("Starting YouTube authentication...");
            auth::session_manager(&cfg)?.login().await?;
            println!("You can now upload videos!");
        }
        Command::Upload {
            files,
            title,
            description,
            tags,
            privacy,
            skip_validation,
            force,
        } => {
            let args = commands::upload::UploadArgs {
                files,
                title,
                description,
                tags: tags.as_deref().map(parse_tags),
                privacy,
                skip_validation,
                force,
            };
            return commands::upload::run(&cfg, args).await;
        }
        Command::List {
            max,
            privacy,
            format,
        } => {
            let args = commands::list::ListArgs {
                max,
                privacy,
                format,
            };
            commands::list::run(&cfg, args).await?;
        }
        Command::Update {
            id,
            title,
            description,
            tags,
            privacy,
        } => {
            let args = commands::update::UpdateArgs {
                video_id: id,
                patch: MetadataPatch {
                    title,
                    description,
                    tags: tags.as_deref().map(parse_tags),
                    privacy,
                },
            };
            commands::update::run(&cfg, args).await?;
        }
        Command::Clone {
            id,
            title,
            description,
            tags,
            privacy,
            keep_file,
        } => {
            let args = commands::clone::CloneArgs {
                video_id: id,
                overrides: MetadataPatch {
                    title: Some(title),
                    description,
                    tags: tags.as_deref().map(parse_tags),
                    privacy,
                },
                keep_file,
            };
            commands::clone::run(&cfg, args).await?;
        }
        Command::Validate { file } => {
            let args = commands::validate::ValidateArgs { file };
            return commands::validate::run(&cfg, args).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn empty_tags_differ_from_absent() {
        let cli = Cli::try_parse_from(["yt-shorts", "update", "abc", "--tags", ""]).unwrap();
        let Command::Update { tags, .. } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(tags.as_deref().map(parse_tags), Some(vec![]));

        let cli = Cli::try_parse_from(["yt-shorts", "update", "abc"]).unwrap();
        let Command::Update { tags, .. } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(tags, None);
    }

    #[test]
    fn upload_accepts_several_files() {
        let cli = Cli::try_parse_from([
            "yt-shorts", "upload", "a.mp4", "b.mp4", "-t", "Hi", "--privacy", "unlisted",
        ])
        .unwrap();
        let Command::Upload { files, privacy, .. } = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(privacy, Some(PrivacyStatus::Unlisted));
    }

    #[test]
    fn clone_requires_title() {
        assert!(Cli::try_parse_from(["yt-shorts", "clone", "abc"]).is_err());
    }

    #[test]
    fn list_defaults() {
        let cli = Cli::try_parse_from(["yt-shorts", "list"]).unwrap();
        let Command::List { max, format, privacy } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(max, 10);
        assert_eq!(format, OutputFormat::Table);
        assert_eq!(privacy, None);
    }
}
