use crate::config::BfskConfig;
use crate::error::Result;
use crate::framing::frame_message;
use crate::PREAMBLE_BITS;
use log::debug;
use std::f32::consts::PI;

/// Expand bytes to bits, most significant bit first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

/// The alternating 0,1,0,1,... synchronization preamble
pub fn preamble_bits() -> Vec<u8> {
    (0..PREAMBLE_BITS).map(|i| (i % 2) as u8).collect()
}

/// BFSK modulator - renders bits as one of two tones per symbol
///
/// Every transmission is prefixed with the alternating preamble. The phase
/// restarts at zero on each symbol (non phase-continuous FSK), trading a
/// little spectral splatter at the boundaries for a trivially simple
/// synthesizer.
pub struct BfskModulator {
    config: BfskConfig,
}

impl BfskModulator {
    pub fn new(config: BfskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BfskConfig {
        &self.config
    }

    /// Encode raw bytes into audio samples: preamble + one symbol per bit
    pub fn encode(&self, bytes: &[u8]) -> Vec<f32> {
        let mut bits = preamble_bits();
        bits.extend(bytes_to_bits(bytes));

        let samples = self.modulate_bits(&bits);
        debug!(
            "encoded {} bytes ({} symbols) into {} samples",
            bytes.len(),
            bits.len(),
            samples.len()
        );
        samples
    }

    /// Frame a payload and encode it for transmission
    pub fn transmit(&self, payload: &[u8]) -> Result<Vec<f32>> {
        let framed = frame_message(payload)?;
        Ok(self.encode(&framed))
    }

    /// Playback time of `encode` output for `byte_count` bytes, in seconds
    pub fn duration_secs(&self, byte_count: usize) -> f64 {
        let symbols = PREAMBLE_BITS + byte_count * 8;
        symbols as f64 * self.config.symbol_duration_secs()
    }

    /// Synthesize one tone burst per bit, without a preamble
    pub fn modulate_bits(&self, bits: &[u8]) -> Vec<f32> {
        let sps = self.config.samples_per_symbol();
        let sample_rate = self.config.sample_rate as f32;
        let amplitude = self.config.amplitude;

        let omega0 = 2.0 * PI * self.config.f0 / sample_rate;
        let omega1 = 2.0 * PI * self.config.f1 / sample_rate;

        let mut samples = Vec::with_capacity(bits.len() * sps);
        for &bit in bits {
            let omega = if bit != 0 { omega1 } else { omega0 };
            samples.extend((0..sps).map(|n| amplitude * (omega * n as f32).sin()));
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModemError;
    use crate::goertzel::goertzel_power;
    use crate::MAX_PAYLOAD_SIZE;

    #[test]
    fn test_bytes_to_bits_msb_first() {
        assert_eq!(bytes_to_bits(&[0x7E]), vec![0, 1, 1, 1, 1, 1, 1, 0]);
        assert_eq!(
            bytes_to_bits(&[0x80, 0x01]),
            vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert!(bytes_to_bits(&[]).is_empty());
    }

    #[test]
    fn test_preamble_alternates() {
        let preamble = preamble_bits();
        assert_eq!(preamble.len(), PREAMBLE_BITS);
        assert_eq!(preamble[0], 0);
        assert_eq!(*preamble.last().unwrap(), 1);
        assert!(preamble.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_encode_length() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        let sps = modulator.config().samples_per_symbol();

        let samples = modulator.encode(b"Hi");
        assert_eq!(samples.len(), (PREAMBLE_BITS + 16) * sps);

        let samples = modulator.encode(b"");
        assert_eq!(samples.len(), PREAMBLE_BITS * sps);
    }

    #[test]
    fn test_encode_amplitude_bounds() {
        let config = BfskConfig {
            amplitude: 0.6,
            ..BfskConfig::default()
        };
        let modulator = BfskModulator::new(config).unwrap();
        let samples = modulator.encode(b"amplitude");

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.6 + 1e-6, "peak {} exceeds amplitude", peak);
        assert!(peak > 0.5, "peak {} too low", peak);
    }

    #[test]
    fn test_symbols_restart_phase() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        let sps = modulator.config().samples_per_symbol();
        let samples = modulator.modulate_bits(&[1, 0, 1]);

        for symbol in 0..3 {
            assert_eq!(samples[symbol * sps], 0.0, "symbol {} starts at phase 0", symbol);
        }
    }

    #[test]
    fn test_symbol_tones() {
        let config = BfskConfig::default();
        let modulator = BfskModulator::new(config).unwrap();
        let sps = config.samples_per_symbol();
        let sample_rate = config.sample_rate as f32;

        let samples = modulator.modulate_bits(&[0, 1]);
        let zero = &samples[..sps];
        let one = &samples[sps..];

        assert!(goertzel_power(zero, config.f0, sample_rate) > goertzel_power(zero, config.f1, sample_rate));
        assert!(goertzel_power(one, config.f1, sample_rate) > goertzel_power(one, config.f0, sample_rate));
    }

    #[test]
    fn test_encode_deterministic() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        assert_eq!(modulator.encode(b"same"), modulator.encode(b"same"));
    }

    #[test]
    fn test_transmit_frames_payload() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        let framed = frame_message(b"SOS").unwrap();
        assert_eq!(modulator.transmit(b"SOS").unwrap(), modulator.encode(&framed));
    }

    #[test]
    fn test_transmit_payload_too_large() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            modulator.transmit(&payload),
            Err(ModemError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BfskConfig {
            f1: BfskConfig::default().f0,
            ..BfskConfig::default()
        };
        assert!(matches!(
            BfskModulator::new(config),
            Err(ModemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duration() {
        let modulator = BfskModulator::new(BfskConfig::default()).unwrap();
        // 64 preamble + 80 data bits at 400 Bd
        let duration = modulator.duration_secs(10);
        assert!((duration - 144.0 / 400.0).abs() < 1e-9);
    }
}
