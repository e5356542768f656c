mod wav;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tokio::sync::mpsc;
use whispernet_core::{
    decode_text, BfskConfig, BfskDemodulator, BfskModulator, ModemError, DEFAULT_AMPLITUDE,
    DEFAULT_F0, DEFAULT_F1, DEFAULT_SAMPLE_RATE, DEFAULT_SYMBOL_RATE, FRAME_OVERHEAD,
};

/// Default capture chunk, in symbols
const CHUNK_SYMBOLS: usize = 32;
/// Chunks buffered between the WAV reader and the demodulator
const CHANNEL_CAPACITY: usize = 16;
/// Sent when the message is empty or whitespace
const FALLBACK_MESSAGE: &str = "SOS";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio reader task failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

#[derive(Parser)]
#[command(name = "whispernet")]
#[command(about = "Send and receive short text messages as two-tone audio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
struct ToneArgs {
    /// Symbol rate in bits per second
    #[arg(long = "rate", default_value_t = DEFAULT_SYMBOL_RATE)]
    symbol_rate: u32,

    /// Tone for bit 0, in Hz
    #[arg(long, default_value_t = DEFAULT_F0)]
    f0: f32,

    /// Tone for bit 1, in Hz
    #[arg(long, default_value_t = DEFAULT_F1)]
    f1: f32,
}

impl ToneArgs {
    fn config(self, sample_rate: u32, amplitude: f32) -> BfskConfig {
        BfskConfig {
            sample_rate,
            f0: self.f0,
            f1: self.f1,
            symbol_rate: self.symbol_rate,
            amplitude,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a text message to a WAV audio file
    Encode {
        /// Message text
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        #[command(flatten)]
        tones: ToneArgs,

        /// Output sample rate in Hz
        #[arg(long = "sr", default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// Peak amplitude, 0.0 to 1.0
        #[arg(long, default_value_t = DEFAULT_AMPLITUDE)]
        volume: f32,
    },

    /// Decode every message found in a WAV audio file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        #[command(flatten)]
        tones: ToneArgs,

        /// Sample rate override (defaults to the WAV header)
        #[arg(long = "sr")]
        sample_rate: Option<u32>,

        /// Samples per capture chunk (defaults to 32 symbols)
        #[arg(long)]
        chunk: Option<usize>,

        /// Print one JSON object per message
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct ReceivedMessage {
    index: usize,
    text: Option<String>,
    payload_base64: String,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            message,
            output,
            tones,
            sample_rate,
            volume,
        } => encode_command(&message, &output, tones.config(sample_rate, volume)),
        Commands::Decode {
            input,
            tones,
            sample_rate,
            chunk,
            json,
        } => decode_command(&input, tones, sample_rate, chunk, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn encode_command(message: &str, output: &Path, config: BfskConfig) -> Result<(), CliError> {
    let modulator = BfskModulator::new(config)?;

    let message = match message.trim() {
        "" => FALLBACK_MESSAGE,
        trimmed => trimmed,
    };
    let payload = message.as_bytes();

    let samples = modulator.transmit(payload)?;
    let duration = modulator.duration_secs(payload.len() + FRAME_OVERHEAD);
    info!(
        "Transmitting {} bytes at {} Bd, f0={} Hz, f1={} Hz",
        payload.len(),
        config.symbol_rate,
        config.f0,
        config.f1
    );

    wav::write_samples(output, config.sample_rate, &samples)?;

    println!(
        "Encoded {} bytes to {} samples ({:.2}s)",
        payload.len(),
        samples.len(),
        duration
    );
    println!("Wrote {}", output.display());
    Ok(())
}

async fn decode_command(
    input: &Path,
    tones: ToneArgs,
    sample_rate: Option<u32>,
    chunk: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    let reader = wav::open(input)?;
    let spec = reader.spec();
    info!(
        "Read {}: {} Hz, {} channel(s), {} bits",
        input.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let sample_rate = match sample_rate {
        Some(rate) if rate != spec.sample_rate => {
            warn!(
                "Decoding at {} Hz but the WAV header says {} Hz",
                rate, spec.sample_rate
            );
            rate
        }
        Some(rate) => rate,
        None => spec.sample_rate,
    };

    let config = tones.config(sample_rate, DEFAULT_AMPLITUDE);
    let mut demodulator = BfskDemodulator::new(config)?;
    let chunk_len = chunk
        .unwrap_or(config.samples_per_symbol() * CHUNK_SYMBOLS)
        .max(1);

    info!(
        "Listening at {} Hz, {} Bd, f0={} Hz, f1={} Hz",
        config.sample_rate, config.symbol_rate, config.f0, config.f1
    );

    // The blocking reader plays the part of a capture callback
    let (tx, mut rx) = mpsc::channel::<Vec<f32>>(CHANNEL_CAPACITY);
    let reader_task = tokio::task::spawn_blocking(move || {
        wav::stream_chunks(reader, chunk_len, |samples| tx.blocking_send(samples).is_ok())
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut received = 0usize;
    loop {
        tokio::select! {
            samples = rx.recv() => {
                let Some(samples) = samples else { break };
                for payload in demodulator.feed(&samples) {
                    report(received, &payload, json)?;
                    received += 1;
                }
            }
            _ = &mut ctrl_c => {
                warn!("Interrupted, discarding any partial frame");
                demodulator.reset();
                break;
            }
        }
    }

    // Closing the channel stops the reader if it is still running
    drop(rx);
    reader_task.await??;

    info!("Decoded {} message(s)", received);
    Ok(())
}

fn report(index: usize, payload: &[u8], json: bool) -> Result<(), CliError> {
    let decoded = decode_text(payload);

    if json {
        let (text, error) = match decoded {
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let record = ReceivedMessage {
            index,
            text,
            payload_base64: STANDARD.encode(payload),
            error,
        };
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    match decoded {
        Ok(text) => println!("[RX] {}", text),
        Err(e) => warn!("Message {} ({} bytes): {}", index, payload.len(), e),
    }
    Ok(())
}
