mod config;
mod config_cmd;
mod logging;
mod markdown;
mod output;
mod transcript;
mod video;
mod youtube;

use clap::{Parser, Subcommand};
use config::{Config, ConfigPaths};
use markdown::Document;
use recap_core::http::RetryPolicy;
use recap_core::{
    BedrockTransport, CancelToken, Credentials, Endpoint, GenerationConfig, GenerationConfigError,
    Pipeline, PipelineConfig, PipelineError, transcript_duration,
};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use transcript::{FileTranscriptSource, TranscriptError, TranscriptSource, fetch_first_available};
use video::{VideoRef, VideoUrlError, parse_video_url};
use youtube::YouTubeTranscriptSource;

/// Slack on top of the HTTP timeout so the transport reports its own timeout first.
const CALL_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "recap",
    version,
    about = "video transcript summarizer",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    Config(config_cmd::ConfigArgs),
}

#[derive(Parser, Debug, Clone, Default)]
struct RunArgs {
    /// Video URL or bare video id
    url: Option<String>,

    /// Directory for the markdown file
    #[arg(short, long, value_name = "dir")]
    output_dir: Option<PathBuf>,

    /// Only look for a transcript in this language
    #[arg(long, value_name = "lang")]
    source_lang: Option<String>,

    /// Model id override
    #[arg(long, value_name = "id")]
    model: Option<String>,

    /// Skip the remote model and use the local summarizer
    #[arg(long)]
    no_ai: bool,

    /// Maximum number of key points
    #[arg(long, value_name = "n")]
    max_key_points: Option<u32>,

    /// Read transcripts from this directory instead of YouTube
    #[arg(long, value_name = "dir")]
    transcript_dir: Option<PathBuf>,
}

/// Where transcripts come from for a run.
#[derive(Debug, Clone, PartialEq)]
enum TranscriptOrigin {
    YouTube,
    Files(PathBuf),
}

impl TranscriptOrigin {
    fn source(&self, timeout: Duration) -> Box<dyn TranscriptSource> {
        match self {
            Self::YouTube => Box::new(YouTubeTranscriptSource::new(timeout)),
            Self::Files(dir) => Box::new(FileTranscriptSource::new(dir)),
        }
    }
}

#[derive(Debug)]
struct ResolvedRun {
    video: VideoRef,
    output_dir: PathBuf,
    transcripts: TranscriptOrigin,
    languages: Vec<String>,
    endpoint: Endpoint,
    region: String,
    credentials: Credentials,
    http_timeout: Duration,
    pipeline: PipelineConfig,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Video(#[from] VideoUrlError),
    #[error(transparent)]
    Generation(#[from] GenerationConfigError),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Output(#[from] output::OutputError),
    #[error("timestamp error: {0}")]
    Time(#[from] time::error::Format),
    #[error("interrupted")]
    Interrupted,
}

impl RunArgs {
    fn resolve(
        self,
        config: &Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedRun, RunError> {
        let url = self.url.unwrap_or_default();
        let video = parse_video_url(&url)?;

        let languages = match self.source_lang {
            Some(lang) if !lang.trim().is_empty() => vec![lang.trim().to_string()],
            _ => config.transcript.languages.clone(),
        };

        let endpoint = match config.model.endpoint.trim() {
            "" => Endpoint::Region(config.model.region.clone()),
            url => Endpoint::Url(url.to_string()),
        };
        let http_timeout = Duration::from_secs(u64::from(config.transport.timeout_secs));
        let credentials = Credentials::resolve(Some(config.model.api_key.as_str()), lookup);

        let transcripts = match self.transcript_dir {
            Some(dir) => TranscriptOrigin::Files(dir),
            None if config.transcript.source == "files" => {
                TranscriptOrigin::Files(PathBuf::from(&config.transcript.dir))
            }
            None => TranscriptOrigin::YouTube,
        };

        let generation = GenerationConfig::new(
            config.generation.temperature,
            config.generation.top_p,
            config.generation.max_tokens,
        )?;

        let max_key_points = self
            .max_key_points
            .unwrap_or(config.summary.max_key_points)
            .max(1) as usize;

        let pipeline = PipelineConfig {
            model_id: self.model.unwrap_or_else(|| config.model.id.clone()),
            generation,
            retry: RetryPolicy {
                max_retries: config.retry.max_retries,
                base_delay: Duration::from_millis(u64::from(config.retry.base_delay_ms)),
                max_delay: Duration::from_millis(u64::from(config.retry.max_delay_ms)),
            },
            call_timeout: http_timeout + CALL_TIMEOUT_SLACK,
            max_key_points,
            remote_enabled: config.summary.use_ai && !self.no_ai,
        };

        Ok(ResolvedRun {
            video,
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(&config.output.dir)),
            transcripts,
            languages,
            endpoint,
            region: config.model.region.clone(),
            credentials,
            http_timeout,
            pipeline,
        })
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), config::ConfigError> {
    if let Some(value) = lookup("RECAP_MODEL_ID") {
        config.model.id = value;
    }
    if let Some(value) = lookup("AWS_REGION") {
        config.model.region = value;
    }
    if let Some(value) = lookup("RECAP_BEDROCK_ENDPOINT") {
        config.model.endpoint = value;
    }
    if let Some(value) = lookup("AWS_BEARER_TOKEN_BEDROCK") {
        config.model.api_key = value;
    }
    if let Some(value) = lookup("RECAP_USE_AI") {
        config.summary.use_ai = config_cmd::parse_bool(&value, "RECAP_USE_AI")?;
    }
    Ok(())
}

fn execute(run: &ResolvedRun, cancel: &CancelToken) -> Result<PathBuf, RunError> {
    let source = run.transcripts.source(run.http_timeout);
    let video_id = &run.video.video_id;
    let (segments, language) = fetch_first_available(&*source, video_id, &run.languages)?;
    if cancel.is_cancelled() {
        return Err(RunError::Interrupted);
    }
    tracing::info!(
        video_id = %run.video.video_id,
        url = %run.video.original_url,
        source = source.name(),
        %language,
        segments = segments.len(),
        duration_secs = transcript_duration(&segments),
        model = %run.pipeline.model_id,
        "summarizing transcript"
    );

    let transport = BedrockTransport::new(&run.endpoint, run.credentials.clone(), run.http_timeout)
        .with_signing_region(&run.region);
    let pipeline = Pipeline::new(run.pipeline.clone(), Arc::new(transport))
        .with_cancel_token(cancel.clone());
    let outcome = pipeline.run(&segments)?;

    let title = run.video.default_title();
    let generated_at = markdown::now_rfc3339()?;
    let doc = Document {
        title: &title,
        provenance: outcome.provenance,
        family: outcome.family,
        generated_at: &generated_at,
    };
    let content = markdown::render(&doc, &outcome.summary, &segments);
    Ok(output::write_markdown(&run.output_dir, &title, &content)?)
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_tracing(cli.json_logs, logging::level_for(cli.verbose));

    let paths = match ConfigPaths::from_home() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("config paths error: {err}");
            std::process::exit(1);
        }
    };

    if let Some(Command::Config(args)) = cli.command {
        if let Err(e) = config_cmd::run(&args, &paths) {
            eprintln!("config failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let mut config = match Config::load_or_create(&paths) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load failed: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = apply_env_overrides(&mut config, env_override) {
        eprintln!("env override error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = config.validate() {
        eprintln!("config invalid: {err}");
        std::process::exit(1);
    }

    let run = match cli.run.resolve(&config, env_override) {
        Ok(run) => run,
        Err(err) => {
            eprintln!("run args error: {err}");
            std::process::exit(1);
        }
    };

    let cancel = CancelToken::new();
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, cancel.flag()) {
            eprintln!("signal setup failed: {e}");
            std::process::exit(1);
        }
    }

    match execute(&run, &cancel) {
        Ok(path) => println!("{}", path.display()),
        Err(RunError::Interrupted) => {
            eprintln!("interrupted before the summary was produced");
            std::process::exit(130);
        }
        Err(err) => {
            eprintln!("recap failed: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RunArgs, RunError, TranscriptOrigin, apply_env_overrides, execute};
    use crate::config::Config;
    use recap_core::{CancelToken, Credentials, Endpoint};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn args(url: &str) -> RunArgs {
        RunArgs {
            url: Some(url.to_string()),
            ..RunArgs::default()
        }
    }

    #[test]
    fn resolve_uses_config_defaults() {
        let run = args("https://youtu.be/dQw4w9WgXcQ")
            .resolve(&Config::default(), no_env)
            .unwrap();
        assert_eq!(run.video.video_id, "dQw4w9WgXcQ");
        assert_eq!(run.languages.len(), 25);
        assert_eq!(run.pipeline.model_id, "amazon.nova-lite-v1:0");
        assert!(run.pipeline.remote_enabled);
        assert_eq!(run.endpoint, Endpoint::Region("us-east-1".into()));
        assert_eq!(run.region, "us-east-1");
        assert_eq!(run.transcripts, TranscriptOrigin::YouTube);
        assert!(matches!(run.credentials, Credentials::Anonymous));
    }

    #[test]
    fn transcript_origin_follows_flag_then_config() {
        let mut config = Config::default();
        config.transcript.source = "files".into();
        config.transcript.dir = "cached".into();
        let run = args("dQw4w9WgXcQ").resolve(&config, no_env).unwrap();
        let cached = TranscriptOrigin::Files(PathBuf::from("cached"));
        assert_eq!(run.transcripts, cached);

        let mut run_args = args("dQw4w9WgXcQ");
        run_args.transcript_dir = Some(PathBuf::from("elsewhere"));
        let run = run_args.resolve(&Config::default(), no_env).unwrap();
        let elsewhere = TranscriptOrigin::Files(PathBuf::from("elsewhere"));
        assert_eq!(run.transcripts, elsewhere);
    }

    #[test]
    fn credentials_prefer_api_key_over_aws_keys() {
        let env = HashMap::from([
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);
        let lookup = |key: &str| env.get(key).map(|value| value.to_string());

        let config = Config::default();
        let run = args("dQw4w9WgXcQ").resolve(&config, lookup).unwrap();
        assert!(matches!(
            run.credentials,
            Credentials::Aws { ref access_key_id, .. } if access_key_id == "AKIDEXAMPLE"
        ));

        let mut config = config;
        config.model.api_key = "bedrock-key".into();
        let run = args("dQw4w9WgXcQ").resolve(&config, lookup).unwrap();
        assert!(matches!(run.credentials, Credentials::ApiKey(ref key) if key == "bedrock-key"));
    }

    #[test]
    fn flags_override_config() {
        let mut run_args = args("dQw4w9WgXcQ");
        run_args.source_lang = Some("ml".into());
        run_args.model = Some("cohere.command-r-v1:0".into());
        run_args.no_ai = true;
        run_args.max_key_points = Some(4);

        let mut config = Config::default();
        config.model.endpoint = "http://localhost:9000".into();
        let run = run_args.resolve(&config, no_env).unwrap();

        assert_eq!(run.languages, vec!["ml"]);
        assert_eq!(run.pipeline.model_id, "cohere.command-r-v1:0");
        assert!(!run.pipeline.remote_enabled);
        assert_eq!(run.pipeline.max_key_points, 4);
        assert_eq!(run.endpoint, Endpoint::Url("http://localhost:9000".into()));
    }

    #[test]
    fn resolve_rejects_bad_url() {
        assert!(matches!(
            args("https://example.com/video").resolve(&Config::default(), no_env),
            Err(RunError::Video(_))
        ));
        assert!(matches!(
            RunArgs::default().resolve(&Config::default(), no_env),
            Err(RunError::Video(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RECAP_MODEL_ID", "meta.llama3-8b-instruct-v1:0"),
            ("AWS_REGION", "eu-west-1"),
            ("AWS_BEARER_TOKEN_BEDROCK", "token"),
            ("RECAP_USE_AI", "false"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.model.id, "meta.llama3-8b-instruct-v1:0");
        assert_eq!(config.model.region, "eu-west-1");
        assert_eq!(config.model.api_key, "token");
        assert!(!config.summary.use_ai);

        let mut config = Config::default();
        assert!(
            apply_env_overrides(&mut config, |key| {
                (key == "RECAP_USE_AI").then(|| "maybe".to_string())
            })
            .is_err()
        );
    }

    #[test]
    fn execute_writes_fallback_markdown() {
        let temp = tempfile::tempdir().unwrap();
        let transcripts = temp.path().join("transcripts");
        fs::create_dir_all(&transcripts).unwrap();
        fs::write(
            transcripts.join("dQw4w9WgXcQ.en.json"),
            r#"[{"text": "Rust is fast.", "start": 0.0, "duration": 2.0},
                {"text": "It is also safe.", "start": 2.0, "duration": 2.0}]"#,
        )
        .unwrap();

        let mut run_args = args("https://youtu.be/dQw4w9WgXcQ");
        run_args.no_ai = true;
        run_args.output_dir = Some(temp.path().join("out"));
        run_args.transcript_dir = Some(transcripts);
        let run = run_args.resolve(&Config::default(), no_env).unwrap();

        let path = execute(&run, &CancelToken::new()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Video_dQw4w9WgXcQ.md");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# Video_dQw4w9WgXcQ\n"));
        assert!(content.contains("_Summary: local fallback"));
        assert!(content.contains("- **00:00** - Rust is fast. It is also safe."));
    }

    #[test]
    fn execute_reports_interrupt_before_summary() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("dQw4w9WgXcQ.en.json"), "[]").unwrap();
        let mut run_args = args("dQw4w9WgXcQ");
        run_args.transcript_dir = Some(temp.path().to_path_buf());
        run_args.output_dir = Some(temp.path().join("out"));
        let run = run_args.resolve(&Config::default(), no_env).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(execute(&run, &cancel), Err(RunError::Interrupted)));
        assert!(!temp.path().join("out").exists());
    }
}
