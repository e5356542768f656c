//! Acoustic data-link for short text messages
//!
//! Binary FSK over a speaker/microphone path: payloads are wrapped in a
//! length + CRC-16 frame, rendered as one of two tones per bit behind an
//! alternating preamble, and recovered incrementally with Goertzel tone
//! detection on the receive side.

pub mod config;
pub mod demodulator;
pub mod error;
pub mod framing;
pub mod goertzel;
pub mod modulator;

pub use config::BfskConfig;
pub use demodulator::{BfskDemodulator, SyncState};
pub use error::{ModemError, Result};
pub use framing::{crc16, frame_message, scan, FrameScanner, Scan};
pub use modulator::BfskModulator;

// Configuration defaults (shared by transmitter and receiver)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_F0: f32 = 3200.0; // Hz, bit 0
pub const DEFAULT_F1: f32 = 4200.0; // Hz, bit 1
pub const DEFAULT_SYMBOL_RATE: u32 = 400; // bits per second
pub const DEFAULT_AMPLITUDE: f32 = 0.6;

// Frame configuration
pub const FRAME_MARKER: u8 = 0x7E;
pub const FRAME_HEADER_SIZE: usize = 3; // marker (1) + payload length (2)
pub const FRAME_CRC_SIZE: usize = 2;
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAME_CRC_SIZE; // 5
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

// Synchronization
pub const PREAMBLE_BITS: usize = 64;
pub const DEFAULT_SYNC_BITS: usize = PREAMBLE_BITS / 2;
pub const DEFAULT_UNLOCK_IDLE_BYTES: usize = 4;

/// Decode a recovered payload as UTF-8 text.
///
/// Failure leaves codec and demodulator state untouched; the payload was
/// already consumed from the stream.
pub fn decode_text(payload: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(payload)?.to_owned())
}
