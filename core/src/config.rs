use crate::error::{ModemError, Result};
use crate::{DEFAULT_AMPLITUDE, DEFAULT_F0, DEFAULT_F1, DEFAULT_SAMPLE_RATE, DEFAULT_SYMBOL_RATE};

/// Tone and timing parameters shared by both ends of the link
///
/// Transmitter and receiver must agree on `sample_rate`, `f0`, `f1` and
/// `symbol_rate`. Nothing on the wire carries them, so a mismatch shows up
/// only as nothing being decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BfskConfig {
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// Tone for bit 0 in Hz
    pub f0: f32,
    /// Tone for bit 1 in Hz
    pub f1: f32,
    /// Bits per second
    pub symbol_rate: u32,
    /// Output amplitude, 0.0 to 1.0 (transmit side only)
    pub amplitude: f32,
}

impl Default for BfskConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            f0: DEFAULT_F0,
            f1: DEFAULT_F1,
            symbol_rate: DEFAULT_SYMBOL_RATE,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }
}

impl BfskConfig {
    /// Number of samples in one symbol, never less than one
    pub fn samples_per_symbol(&self) -> usize {
        let sps = (self.sample_rate as f64 / self.symbol_rate as f64).round() as usize;
        sps.max(1)
    }

    /// Duration of a single symbol in seconds
    pub fn symbol_duration_secs(&self) -> f64 {
        self.samples_per_symbol() as f64 / self.sample_rate as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ModemError::InvalidConfig(
                "sample rate must be positive".into(),
            ));
        }
        if self.symbol_rate == 0 {
            return Err(ModemError::InvalidConfig(
                "symbol rate must be positive".into(),
            ));
        }
        if self.f0 == self.f1 {
            return Err(ModemError::InvalidConfig(format!(
                "f0 and f1 must differ (both {} Hz)",
                self.f0
            )));
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        for (name, freq) in [("f0", self.f0), ("f1", self.f1)] {
            if !freq.is_finite() || freq <= 0.0 || freq >= nyquist {
                return Err(ModemError::InvalidConfig(format!(
                    "{} = {} Hz must lie between 0 and {} Hz",
                    name, freq, nyquist
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(ModemError::InvalidConfig(format!(
                "amplitude {} outside 0.0..=1.0",
                self.amplitude
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BfskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.samples_per_symbol(), 120);
    }

    #[test]
    fn test_samples_per_symbol_rounds() {
        let config = BfskConfig {
            sample_rate: 44100,
            symbol_rate: 400,
            ..BfskConfig::default()
        };
        // 110.25 rounds down
        assert_eq!(config.samples_per_symbol(), 110);

        let config = BfskConfig {
            sample_rate: 44100,
            symbol_rate: 300,
            ..BfskConfig::default()
        };
        assert_eq!(config.samples_per_symbol(), 147);
    }

    #[test]
    fn test_samples_per_symbol_never_zero() {
        let config = BfskConfig {
            sample_rate: 100,
            symbol_rate: 1000,
            f0: 10.0,
            f1: 20.0,
            ..BfskConfig::default()
        };
        assert_eq!(config.samples_per_symbol(), 1);
    }

    #[test]
    fn test_rejects_zero_rates() {
        let config = BfskConfig {
            sample_rate: 0,
            ..BfskConfig::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));

        let config = BfskConfig {
            symbol_rate: 0,
            ..BfskConfig::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_equal_tones() {
        let config = BfskConfig {
            f0: 3000.0,
            f1: 3000.0,
            ..BfskConfig::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_tone_above_nyquist() {
        let config = BfskConfig {
            sample_rate: 8000,
            f1: 4200.0,
            ..BfskConfig::default()
        };
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_amplitude() {
        for amplitude in [-0.1, 1.5, f32::NAN] {
            let config = BfskConfig {
                amplitude,
                ..BfskConfig::default()
            };
            assert!(
                config.validate().is_err(),
                "amplitude {} should be rejected",
                amplitude
            );
        }
    }
}
