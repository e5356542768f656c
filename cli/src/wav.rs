use crate::CliError;
use hound::{SampleFormat, WavReader, WavSpec};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Write mono 16-bit PCM
pub fn write_samples(path: &Path, sample_rate: u32, samples: &[f32]) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        // Clamp to [-1.0, 1.0] range to avoid overflow, then scale to i16
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()
}

pub fn open(path: &Path) -> Result<WavReader<BufReader<File>>, hound::Error> {
    WavReader::open(path)
}

/// Read the first channel as normalized f32 samples, handing them to `sink`
/// in chunks of `chunk_len`. Stops early when `sink` returns false.
pub fn stream_chunks<R: Read>(
    mut reader: WavReader<R>,
    chunk_len: usize,
    sink: impl FnMut(Vec<f32>) -> bool,
) -> Result<(), CliError> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => forward(reader.samples::<f32>(), channels, chunk_len, sink),
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            let samples = reader
                .samples::<i32>()
                .map(move |s| s.map(|v| v as f32 * scale));
            forward(samples, channels, chunk_len, sink)
        }
        (format, bits) => Err(CliError::UnsupportedFormat(format!(
            "{:?} samples with {} bits",
            format, bits
        ))),
    }
}

fn forward(
    samples: impl Iterator<Item = Result<f32, hound::Error>>,
    channels: usize,
    chunk_len: usize,
    mut sink: impl FnMut(Vec<f32>) -> bool,
) -> Result<(), CliError> {
    let chunk_len = chunk_len.max(1);
    let mut chunk = Vec::with_capacity(chunk_len);

    // Interleaved frames: keep the first channel
    for sample in samples.step_by(channels) {
        chunk.push(sample?);
        if chunk.len() == chunk_len {
            let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_len));
            if !sink(full) {
                return Ok(());
            }
        }
    }

    if !chunk.is_empty() {
        sink(chunk);
    }
    Ok(())
}
