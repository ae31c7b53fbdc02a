use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicewire::audio::{CaptureSource, MicCapture, PlaybackSink, SpeakerOutput, convert};
use voicewire::batch::BatchClient;
use voicewire::session::RecognitionUpdate;
use voicewire::{Config, Sessions, StatusClient};

/// Voicewire - real-time voice streaming client for speech services
#[derive(Parser)]
#[command(name = "voicewire", version, about)]
struct Cli {
    /// WebSocket base URL of the speech service
    #[arg(long, env = "VOICEWIRE_SERVER")]
    server: Option<String>,

    /// HTTP base URL of the speech service
    #[arg(long, env = "VOICEWIRE_API")]
    api: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream the microphone to the recognition endpoint and render the
    /// live transcript
    Listen {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Synthesize text and play it through the speakers
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Check the service's system status
    Status {
        /// Keep polling on the configured interval
        #[arg(short, long)]
        watch: bool,
    },
    /// Trigger batch processing of a recorded task directory
    Process {
        /// Task directory name (e.g. 2024_01_02_03_04_05)
        task_dir: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voicewire=info",
        1 => "info,voicewire=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.server.as_deref(), cli.api.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Listen { duration } => listen(&config, duration).await,
        Command::Say { text } => say(&config, &text).await,
        Command::Status { watch } => status(&config, watch).await,
        Command::Process { task_dir } => process(&config, task_dir.as_deref()).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
    }
}

/// Run a recognition session, rendering partials inline and finalized
/// segments as log lines
async fn listen(config: &Config, duration: Option<u64>) -> anyhow::Result<()> {
    let sessions = Sessions::new(config);
    let mut session = sessions.recognition();
    let mut updates = session
        .updates()
        .context("update stream already taken")?;

    session.start().await?;
    println!("Listening at 16 kHz (Ctrl-C to stop)…");

    let limit = duration.map_or(Duration::MAX, Duration::from_secs);
    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            update = updates.recv() => match update {
                Some(RecognitionUpdate::Partial(text)) => {
                    print!("\r… {text}");
                    std::io::stdout().flush()?;
                }
                Some(RecognitionUpdate::Finalized(segment)) => {
                    println!("\r[{}] {} (t={:.1}s)", segment.idx, segment.text, segment.start_time);
                }
                Some(RecognitionUpdate::Closed) | None => {
                    println!("\nSession closed by the service.");
                    return Ok(());
                }
            },
        }
    }

    session.stop().await;

    // A partial finalized by the stop policy lands on the update stream
    // after stop() resolves.
    while let Ok(update) = updates.try_recv() {
        if let RecognitionUpdate::Finalized(segment) = update {
            println!("\r[{}] {} (t={:.1}s)", segment.idx, segment.text, segment.start_time);
        }
    }

    println!("{} segment(s) captured.", session.segments().len());
    Ok(())
}

/// Run a synthesis session to completion, letting playback drain before
/// closing
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let sessions = Sessions::new(config);
    let mut session = sessions.synthesis();

    session.start(text).await?;
    println!("Synthesizing…");

    match session.finished().await {
        Some(elapsed) => println!("Synthesis complete in {elapsed:.2}s"),
        None => println!("Synthesis ended without completing"),
    }

    // close() discards queued audio, so drain the tail first.
    while session.queued_samples() > 0 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    session.close().await;
    Ok(())
}

/// Print the service's system status, once or on the polling interval
async fn status(config: &Config, watch: bool) -> anyhow::Result<()> {
    let client = StatusClient::new(&config.api_url);

    if watch {
        println!(
            "Polling {} every {}s (Ctrl-C to stop)…",
            config.api_url,
            config.status_interval.as_secs()
        );
        let mut snapshots = client.spawn_poller(config.status_interval);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                snapshot = snapshots.recv() => match snapshot {
                    Some(s) => println!(
                        "{} ({})",
                        s.api_connection,
                        if s.api_connection_status { "active" } else { "inactive" }
                    ),
                    None => break,
                },
            }
        }
    } else {
        let s = client.snapshot().await;
        println!(
            "{} ({})",
            s.api_connection,
            if s.api_connection_status { "active" } else { "inactive" }
        );
    }

    Ok(())
}

/// Trigger batch processing on the service
async fn process(config: &Config, task_dir: Option<&str>) -> anyhow::Result<()> {
    let client = BatchClient::new(&config.api_url);
    let result = client.process(task_dir).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = MicCapture::default();
    let mut frames = capture.start()?;

    println!("Sample rate: {} Hz", voicewire::audio::SAMPLE_RATE);
    println!("---");

    'seconds: for i in 1..=duration {
        let mut second = Vec::new();
        while second.len() < voicewire::audio::SAMPLE_RATE as usize {
            match frames.recv().await {
                Some(frame) => second.extend(convert::pcm16_to_float(&frame)),
                None => break 'seconds,
            }
        }

        let energy = calculate_rms(&second);
        let peak = second.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{i:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]");
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = SpeakerOutput::new();
    playback.start()?;

    let sample_rate = voicewire::audio::SAMPLE_RATE;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let pcm = convert::float_to_pcm16(&samples);
    println!("Playing {} samples at {} Hz...", pcm.len(), sample_rate);

    for chunk in pcm.chunks(voicewire::audio::FRAME_SAMPLES) {
        playback.feed(chunk)?;
    }

    while playback.queued_samples() > 0 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    playback.stop();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
