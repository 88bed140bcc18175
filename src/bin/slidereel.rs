use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slidereel::config::DEFAULT_CODEC_PREFERENCES;
use slidereel::encode::ffmpeg::{ensure_parent_dir, is_ffmpeg_on_path};
use slidereel::{
    AudioPreview, AudioTrack, ClockMode, CodecNegotiator, FfmpegRuntime, MediaRuntime, MimeType,
    RenderRequest, SessionConfig, SessionNotice, SourceRef, Studio,
};

#[derive(Parser, Debug)]
#[command(name = "slidereel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render photos and an optional music track into one video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// List which codec preferences the local ffmpeg can record.
    Formats(FormatsArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Photo URL or path, in play order. Repeat for each photo.
    #[arg(long = "image", required = true)]
    images: Vec<String>,

    /// Music track URL or path. Loops until the last photo ends.
    #[arg(long)]
    audio: Option<String>,

    /// Output file.
    #[arg(long)]
    out: PathBuf,

    /// Session config JSON; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render as fast as possible instead of in real time.
    #[arg(long, default_value_t = false)]
    offline: bool,

    #[arg(long)]
    fps: Option<u32>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// How long each photo stays on screen.
    #[arg(long)]
    per_image_ms: Option<u64>,

    /// Container/codec preference, most preferred first. Repeatable.
    #[arg(long = "codec")]
    codecs: Vec<String>,

    /// Do not play the music while rendering.
    #[arg(long, default_value_t = false)]
    no_preview: bool,
}

#[derive(Parser, Debug)]
struct FormatsArgs {
    /// Preferences to check instead of the built-in list.
    #[arg(long = "codec")]
    codecs: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args).await,
        Command::Formats(args) => cmd_formats(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn session_config(args: &RenderArgs) -> anyhow::Result<SessionConfig> {
    let mut cfg = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if args.offline {
        cfg.clock = ClockMode::Offline;
    }
    if let Some(fps) = args.fps {
        cfg.fps = slidereel::Fps::new(fps, 1)?;
    }
    if let Some(w) = args.width {
        cfg.canvas.width = w;
    }
    if let Some(h) = args.height {
        cfg.canvas.height = h;
    }
    if let Some(ms) = args.per_image_ms {
        cfg.per_image_duration_ms = ms;
    }
    if !args.codecs.is_empty() {
        cfg.codec_preferences = args.codecs.clone();
    }
    if args.no_preview || cfg.clock == ClockMode::Offline {
        cfg.audio_preview = AudioPreview::Disabled;
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    if !is_ffmpeg_on_path() {
        anyhow::bail!("ffmpeg is required for rendering, but was not found on PATH");
    }
    let cfg = session_config(&args)?;

    let images = args
        .images
        .iter()
        .map(|s| SourceRef::parse(s))
        .collect::<Result<Vec<_>, _>>()?;
    let audio = args
        .audio
        .as_deref()
        .map(|s| -> anyhow::Result<AudioTrack> {
            let source = SourceRef::parse(s)?;
            Ok(AudioTrack::new("music", s, source))
        })
        .transpose()?;

    let runtime = Arc::new(FfmpegRuntime::probe()?);
    let mut studio = Studio::new(cfg, runtime)?;
    let ticket = studio.start(RenderRequest { images, audio }).await?;
    let handle = ticket.handle.clone();

    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let pct = *progress.borrow_and_update();
            eprint!("\rrendering {pct:>3}%");
        }
    });

    let cancel_on_interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling session");
                handle.cancel();
            }
        })
    };

    let result = ticket.wait().await;
    cancel_on_interrupt.abort();
    reporter.abort();
    eprintln!();

    for notice in handle.notices() {
        match notice {
            SessionNotice::AssetDropped { index, reason } => {
                eprintln!("skipped image {index}: {reason}");
            }
            SessionNotice::AudioUnavailable { reason } => {
                eprintln!("rendered without audio: {reason}");
            }
        }
    }

    let output = result?;
    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, &output.bytes)
        .with_context(|| format!("write video '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({}, {} frames, {:.2}s)",
        args.out.display(),
        output.mime_type,
        output.frame_count,
        output.nominal_duration.as_secs_f64()
    );
    Ok(())
}

fn cmd_formats(args: FormatsArgs) -> anyhow::Result<()> {
    let runtime = FfmpegRuntime::probe()?;
    let prefs: Vec<String> = if args.codecs.is_empty() {
        DEFAULT_CODEC_PREFERENCES
            .iter()
            .map(|s| (*s).to_owned())
            .collect()
    } else {
        args.codecs
    };

    for pref in &prefs {
        let verdict = match MimeType::parse(pref) {
            Ok(mime) if runtime.is_type_supported(&mime) => "supported",
            Ok(_) => "unsupported",
            Err(_) => "malformed",
        };
        println!("{verdict:<12} {pref}");
    }

    match runtime.default_format() {
        Some(mime) => println!("default      {mime}"),
        None => println!("default      (none)"),
    }
    match CodecNegotiator::new(&runtime).negotiate(&prefs) {
        Ok(chosen) => println!("chosen       {chosen}"),
        Err(e) => println!("chosen       (none: {e})"),
    }
    Ok(())
}
