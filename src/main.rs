use std::path::{Path, PathBuf};
use std::pin::pin;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use edge_tts_gateway::{
    ClientConfig, EdgeTts, ProtocolMessage, SynthesisOptions, SynthesisOutput, VoiceFilter,
    VoicesManager,
};

/// Edge TTS Gateway - Microsoft Edge neural speech synthesis client
#[derive(Parser, Debug)]
#[command(name = "edge-tts-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize text to an MP3 file
    Synthesize {
        /// Text to speak
        #[arg(short = 't', long = "text", conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: Option<PathBuf>,

        /// Voice short name or full descriptor
        #[arg(short = 'v', long = "voice")]
        voice: Option<String>,

        /// Speaking rate, e.g. +10%
        #[arg(long = "rate", allow_hyphen_values = true)]
        rate: Option<String>,

        /// Volume, e.g. -5%
        #[arg(long = "volume", allow_hyphen_values = true)]
        volume: Option<String>,

        /// Pitch, e.g. +0Hz
        #[arg(long = "pitch", allow_hyphen_values = true)]
        pitch: Option<String>,

        /// Output MP3 path
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,

        /// Also write SRT subtitles to this path
        #[arg(long = "srt", value_name = "FILE")]
        srt: Option<PathBuf>,

        /// Minimum words per subtitle cue
        #[arg(long = "words", requires = "srt")]
        words: Option<usize>,
    },

    /// List available voices
    Voices {
        /// Only voices of this locale, e.g. en-US
        #[arg(long = "locale")]
        locale: Option<String>,

        /// Only voices of this language, e.g. en
        #[arg(long = "language")]
        language: Option<String>,

        /// Only voices of this gender
        #[arg(long = "gender")]
        gender: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {}", config_path.display());
            ClientConfig::from_file(config_path)?
        }
        None => ClientConfig::from_env()?,
    };
    let tts = EdgeTts::new(config);

    match cli.command {
        Commands::Synthesize {
            text,
            file,
            voice,
            rate,
            volume,
            pitch,
            output,
            srt,
            words,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Either --text or --file is required"),
            };
            let options = SynthesisOptions {
                voice,
                rate,
                volume,
                pitch,
            };

            let result = synthesize(&tts, &text, &options, &output).await?;
            println!(
                "Wrote {} bytes of audio to {}",
                result.audio.len(),
                output.display()
            );

            if let Some(srt_path) = srt {
                let subtitles = result.to_srt(words)?;
                tokio::fs::write(&srt_path, subtitles)
                    .await
                    .with_context(|| format!("Failed to write {}", srt_path.display()))?;
                println!("Wrote subtitles to {}", srt_path.display());
            }
        }
        Commands::Voices {
            locale,
            language,
            gender,
        } => {
            let manager = VoicesManager::new(tts.list_voices().await?);
            let filter = VoiceFilter {
                locale,
                language,
                gender,
                short_name: None,
            };
            for voice in manager.find(&filter) {
                println!(
                    "{:<40} {:<8} {:<8} {}",
                    voice.short_name,
                    voice.gender,
                    voice.locale,
                    voice.voice_tag.voice_personalities.join(", ")
                );
            }
        }
    }

    Ok(())
}

/// Streams audio to `output` as it arrives and keeps the word boundaries.
async fn synthesize(
    tts: &EdgeTts,
    text: &str,
    options: &SynthesisOptions,
    output: &Path,
) -> anyhow::Result<SynthesisOutput> {
    let mut stream = pin!(tts.synthesize(text, options)?);
    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut result = SynthesisOutput::default();
    let mut audio = Vec::new();
    while let Some(message) = stream.next().await {
        match message? {
            ProtocolMessage::Audio(chunk) => {
                file.write_all(&chunk).await?;
                audio.extend_from_slice(&chunk);
            }
            ProtocolMessage::WordBoundary(boundary) => result.word_boundaries.push(boundary),
            ProtocolMessage::SessionEnd => {}
        }
    }
    file.flush().await?;

    result.audio = audio.into();
    Ok(result)
}
