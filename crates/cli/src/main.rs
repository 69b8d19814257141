//! `dubflow-cli` -- dub a video through the dubbing service.
//!
//! Configuration comes from the environment (see
//! [`CliConfig::from_env`](dubflow_cli::config::CliConfig::from_env));
//! command-line flags override the voice settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dubflow_cli::config::CliConfig;
use dubflow_cli::pipeline;
use dubflow_client::{DubbingApi, HttpDubbingApi};
use dubflow_core::types::JobId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dubflow-cli")]
#[command(about = "Transcribe, dub and subtitle a video")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a video and run it through to the dubbed result.
    Run {
        video: PathBuf,

        /// Source language hint; detected when omitted.
        #[arg(short, long)]
        language: Option<String>,

        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// Resume an existing job and download its outputs once complete.
    Attach {
        job_id: String,

        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// List target languages and their voices.
    Languages,
    /// Check that the service is reachable.
    Health,
}

#[derive(clap::Args)]
struct VoiceArgs {
    /// Target language code, e.g. `a` or `f`.
    #[arg(long)]
    voice_language: Option<String>,

    #[arg(long)]
    voice: Option<String>,

    /// Speech speed multiplier (0.5 to 2.0).
    #[arg(long)]
    speed: Option<f32>,
}

impl VoiceArgs {
    fn apply(self, config: &mut CliConfig) -> anyhow::Result<()> {
        if let Some(language_code) = self.voice_language {
            config.voice.language_code = language_code;
        }
        if let Some(voice) = self.voice {
            config.voice.voice = voice;
        }
        if let Some(speed) = self.speed {
            config.voice.speed = speed;
        }
        config.voice.validate().context("invalid voice settings")?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dubflow_cli=info,dubflow_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = CliConfig::from_env().context("invalid configuration")?;

    let api: Arc<dyn DubbingApi> = Arc::new(
        HttpDubbingApi::new(config.api_url.clone()).with_request_timeout(config.request_timeout),
    );

    tracing::info!(api_url = %config.api_url, "Starting dubflow-cli");

    match args.command {
        Command::Run {
            video,
            language,
            voice,
        } => {
            voice.apply(&mut config)?;
            if language.is_some() {
                config.source_language = language;
            }
            let outputs = pipeline::run(api, &config, &video).await?;
            println!("{}", outputs.video.display());
            println!("{}", outputs.subtitles.display());
        }
        Command::Attach { job_id, voice } => {
            voice.apply(&mut config)?;
            let outputs = pipeline::attach(api, &config, JobId::new(job_id)).await?;
            println!("{}", outputs.video.display());
            println!("{}", outputs.subtitles.display());
        }
        Command::Languages => {
            let catalog = api.list_languages().await.context("listing languages")?;
            for language in catalog.languages {
                let voices: Vec<_> = language.voices.iter().map(|v| v.id.as_str()).collect();
                println!("{}\t{}\t{}", language.code, language.name, voices.join(", "));
            }
        }
        Command::Health => {
            let health = api.health().await.context("health check failed")?;
            println!("{} {} ({})", health.service, health.version, health.status);
        }
    }

    Ok(())
}
