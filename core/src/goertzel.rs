use std::f32::consts::PI;

/// Power of a single frequency over a window using the Goertzel algorithm
///
/// Evaluates the tone at exactly `freq` (not rounded to a DFT bin), so the
/// two BFSK tones need not be integer multiples of `sample_rate / len`.
pub fn goertzel_power(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let coeff = 2.0 * (2.0 * PI * freq / sample_rate).cos();

    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;

    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }

    q1 * q1 + q2 * q2 - coeff * q1 * q2
}

/// Root-mean-square level of a block of samples (0.0 for an empty block)
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    (energy / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|n| amplitude * (2.0 * PI * freq * n as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_goertzel_silence_has_no_power() {
        let silence = vec![0.0f32; 120];
        assert_eq!(goertzel_power(&silence, 3200.0, 48000.0), 0.0);
    }

    #[test]
    fn test_goertzel_selects_present_tone() {
        let samples = tone(3200.0, 48000.0, 120, 0.6);
        let p_match = goertzel_power(&samples, 3200.0, 48000.0);
        let p_other = goertzel_power(&samples, 4200.0, 48000.0);
        assert!(
            p_match > 10.0 * p_other,
            "match {} should dominate other {}",
            p_match,
            p_other
        );
    }

    #[test]
    fn test_goertzel_matches_expected_magnitude() {
        // Integer number of cycles: |X(k)|^2 = (N * A / 2)^2
        let samples = tone(3200.0, 48000.0, 120, 0.6);
        let power = goertzel_power(&samples, 3200.0, 48000.0);
        let expected = (120.0f32 * 0.6 / 2.0).powi(2);
        assert!(
            (power - expected).abs() / expected < 0.01,
            "power {} expected {}",
            power,
            expected
        );
    }

    #[test]
    fn test_goertzel_off_bin_frequency() {
        // 4200 Hz is 10.5 cycles per 120-sample window
        let samples = tone(4200.0, 48000.0, 120, 0.6);
        let p1 = goertzel_power(&samples, 4200.0, 48000.0);
        let p0 = goertzel_power(&samples, 3200.0, 48000.0);
        assert!(p1 > p0);
    }

    #[test]
    fn test_rms_level() {
        assert_eq!(rms_level(&[]), 0.0);
        assert!((rms_level(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);

        let samples = tone(1000.0, 48000.0, 4800, 1.0);
        let rms = rms_level(&samples);
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }
}
