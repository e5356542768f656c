use crate::config::BfskConfig;
use crate::error::Result;
use crate::framing::FrameScanner;
use crate::goertzel::{goertzel_power, rms_level};
use crate::{DEFAULT_SYNC_BITS, DEFAULT_UNLOCK_IDLE_BYTES, FRAME_MARKER, PREAMBLE_BITS};
use log::{debug, trace};

/// Leading marker bits that continue the preamble's alternation
const MARKER_SYNC_PREFIX: usize = marker_sync_prefix();

/// Marker bits already received when the alternating run breaks
const MARKER_SYNC_BITS: usize = MARKER_SYNC_PREFIX + 1;

/// Expected value of those bits, MSB first
const MARKER_SYNC_PATTERN: u8 = FRAME_MARKER >> (8 - MARKER_SYNC_BITS);

const _: () = assert!(MARKER_SYNC_BITS < 8, "frame marker must break the preamble alternation");

const fn marker_sync_prefix() -> usize {
    // Preamble bit i is i % 2, so the bit after it would be PREAMBLE_BITS % 2
    let mut expected = (PREAMBLE_BITS % 2) as u8;
    let mut n = 0;
    while n < 8 {
        if (FRAME_MARKER >> (7 - n)) & 1 != expected {
            break;
        }
        expected ^= 1;
        n += 1;
    }
    n
}

/// Receiver synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Correlating incoming bits against the alternating preamble
    SeekingSync,
    /// Byte boundary known; packing bits into bytes for the frame scanner
    Locked,
}

/// An alternating run broken by a repeated bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EndedRun {
    len: usize,
    first: u8,
}

/// Tracks the current run of alternating bits
#[derive(Debug, Default)]
struct PreambleDetector {
    last: Option<u8>,
    run: usize,
    first: u8,
    history: u8,
}

impl PreambleDetector {
    /// Returns the run that `bit` just broke, if any
    fn push(&mut self, bit: u8) -> Option<EndedRun> {
        self.history = (self.history << 1) | bit;

        let ended = match self.last {
            Some(prev) if prev != bit => {
                self.run += 1;
                None
            }
            Some(_) => {
                let ended = EndedRun {
                    len: self.run,
                    first: self.first,
                };
                self.run = 1;
                self.first = bit;
                Some(ended)
            }
            None => {
                self.run = 1;
                self.first = bit;
                None
            }
        };

        self.last = Some(bit);
        ended
    }

    /// The most recent `count` bits, oldest in the highest position
    fn recent(&self, count: usize) -> u8 {
        self.history & ((1u16 << count) - 1) as u8
    }
}

/// Where a preamble ended, relative to the byte grid of the data behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockPoint {
    /// Data bits already received, including the one that broke the run
    seed_bits: usize,
    /// Second reading of the same run when the two disagree
    alt_seed_bits: Option<usize>,
    /// The run covered an entire preamble
    full: bool,
}

/// Bits packed into bytes on one byte boundary
#[derive(Debug, Default)]
struct ByteLane {
    acc: u8,
    bit_count: usize,
    scanner: FrameScanner,
    idle_bytes: usize,
}

impl ByteLane {
    fn seeded(bits: u8, count: usize) -> Self {
        Self {
            acc: bits,
            bit_count: count,
            ..Self::default()
        }
    }

    fn is_idle(&self) -> bool {
        self.scanner.is_idle()
    }

    /// Pack one bit, returning the frames completed by it
    fn push_bit(&mut self, bit: u8) -> Vec<Vec<u8>> {
        self.acc = (self.acc << 1) | bit;
        self.bit_count += 1;
        if self.bit_count < 8 {
            return Vec::new();
        }

        let byte = self.acc;
        self.acc = 0;
        self.bit_count = 0;

        let completed = self.scanner.push(byte);
        if completed.is_empty() && self.scanner.is_idle() {
            self.idle_bytes += 1;
        } else {
            self.idle_bytes = 0;
        }
        completed
    }
}

/// Per-chunk signal level callback
pub type LevelMeter = Box<dyn FnMut(f32) + Send>;

/// Streaming BFSK demodulator
///
/// Consumes capture chunks of any size, decides one bit per symbol window by
/// comparing Goertzel power at the two tones, and hands completed bytes to a
/// [`FrameScanner`]. Bytes are only packed once the alternating preamble has
/// been seen, which fixes the byte boundary regardless of where the capture
/// started.
///
/// A preamble ends either at a complete 64-bit run, after which the next bit
/// is the first data bit, or, for captures that start late, at the repeated
/// bit inside the leading frame marker. When the two readings place the byte
/// boundary differently both are packed, and the first to complete a valid
/// frame is kept.
///
/// Symbol windows are cut from the first captured sample. A capture that
/// starts between symbol boundaries still decodes as long as each window is
/// dominated by a single symbol.
pub struct BfskDemodulator {
    config: BfskConfig,
    samples_per_symbol: usize,
    /// Start of a symbol split across chunks, always shorter than one symbol
    carry: Vec<f32>,
    state: SyncState,
    detector: PreambleDetector,
    lane: ByteLane,
    /// Alternative byte boundary, kept until one of the two completes a frame
    candidate: Option<ByteLane>,
    sync_bits: usize,
    unlock_idle_bytes: usize,
    level_meter: Option<LevelMeter>,
}

impl BfskDemodulator {
    pub fn new(config: BfskConfig) -> Result<Self> {
        config.validate()?;
        let samples_per_symbol = config.samples_per_symbol();
        Ok(Self {
            config,
            samples_per_symbol,
            carry: Vec::with_capacity(samples_per_symbol),
            state: SyncState::SeekingSync,
            detector: PreambleDetector::default(),
            lane: ByteLane::default(),
            candidate: None,
            sync_bits: DEFAULT_SYNC_BITS,
            unlock_idle_bytes: DEFAULT_UNLOCK_IDLE_BYTES,
            level_meter: None,
        })
    }

    /// Create a demodulator that reports the RMS level of every fed chunk
    pub fn with_level_meter<F>(config: BfskConfig, meter: F) -> Result<Self>
    where
        F: FnMut(f32) + Send + 'static,
    {
        let mut demodulator = Self::new(config)?;
        demodulator.level_meter = Some(Box::new(meter));
        Ok(demodulator)
    }

    pub fn config(&self) -> &BfskConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Bytes of a partially received frame
    pub fn pending_bytes(&self) -> &[u8] {
        self.lane.scanner.pending()
    }

    /// Get the minimum alternating run accepted as a preamble
    pub fn sync_bits(&self) -> usize {
        self.sync_bits
    }

    /// Set the minimum alternating run accepted as a preamble (default: 32)
    ///
    /// Clamped to what a complete preamble can produce. Lower values tolerate
    /// captures that start late into the preamble; higher values reject more
    /// accidental alternation in noise.
    pub fn set_sync_bits(&mut self, bits: usize) {
        self.sync_bits = bits.clamp(2, PREAMBLE_BITS + MARKER_SYNC_PREFIX);
    }

    /// Set how many consecutive idle bytes drop the lock (default: 4)
    pub fn set_unlock_idle_bytes(&mut self, bytes: usize) {
        self.unlock_idle_bytes = bytes.max(1);
    }

    /// Feed a chunk of captured samples.
    ///
    /// Returns the payloads of every frame completed by this chunk, in order.
    pub fn feed(&mut self, chunk: &[f32]) -> Vec<Vec<u8>> {
        if let Some(meter) = self.level_meter.as_mut() {
            meter(rms_level(chunk));
        }

        let sps = self.samples_per_symbol;
        let mut messages = Vec::new();
        let mut rest = chunk;

        // Finish the symbol left over from the previous chunk
        if !self.carry.is_empty() {
            let take = (sps - self.carry.len()).min(rest.len());
            self.carry.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.carry.len() < sps {
                return messages;
            }

            let bit = self.detect_bit(&self.carry);
            self.carry.clear();
            self.process_bit(bit, &mut messages);
        }

        let mut windows = rest.chunks_exact(sps);
        for window in &mut windows {
            let bit = self.detect_bit(window);
            self.process_bit(bit, &mut messages);
        }
        self.carry.extend_from_slice(windows.remainder());

        messages
    }

    /// Discard all buffered samples, bits and partial frames.
    ///
    /// Returns to `SeekingSync`. The level meter is kept.
    pub fn reset(&mut self) {
        self.carry.clear();
        self.state = SyncState::SeekingSync;
        self.detector = PreambleDetector::default();
        self.lane = ByteLane::default();
        self.candidate = None;
    }

    fn detect_bit(&self, window: &[f32]) -> u8 {
        let sample_rate = self.config.sample_rate as f32;
        let p0 = goertzel_power(window, self.config.f0, sample_rate);
        let p1 = goertzel_power(window, self.config.f1, sample_rate);
        u8::from(p1 > p0)
    }

    /// Decide whether the run that just ended was a preamble
    fn lock_point(&self, run: EndedRun) -> Option<LockPoint> {
        if run.len < self.sync_bits {
            return None;
        }

        // Preamble bits start at 0, so a run starting at 1 began one bit early
        let lead = run.first as usize;
        let full = run.len >= PREAMBLE_BITS + lead;

        // Data bits that kept alternating, plus the one that broke the run.
        // Whole alternating bytes hold no marker and can be skipped.
        let full_seed = full.then(|| (run.len - PREAMBLE_BITS - lead + 1) % 8);
        let marker_seed =
            (self.detector.recent(MARKER_SYNC_BITS) == MARKER_SYNC_PATTERN).then_some(MARKER_SYNC_BITS);

        match (marker_seed, full_seed) {
            (Some(seed_bits), alt) => Some(LockPoint {
                seed_bits,
                alt_seed_bits: alt.filter(|&bits| bits != seed_bits),
                full,
            }),
            (None, Some(seed_bits)) => Some(LockPoint {
                seed_bits,
                alt_seed_bits: None,
                full,
            }),
            (None, None) => None,
        }
    }

    fn seeded_lane(&self, seed_bits: usize) -> ByteLane {
        ByteLane::seeded(self.detector.recent(seed_bits), seed_bits)
    }

    fn process_bit(&mut self, bit: u8, messages: &mut Vec<Vec<u8>>) {
        let lock = self
            .detector
            .push(bit)
            .and_then(|run| self.lock_point(run));

        if self.state == SyncState::SeekingSync {
            if let Some(point) = lock {
                debug!("preamble lock, {} data bits in", point.seed_bits);
                self.lock(point);
            }
            return;
        }

        let mut fresh_candidate = false;
        if let Some(point) = lock {
            if self.lane.is_idle() {
                debug!("preamble while locked, realigning byte boundary");
                self.lock(point);
                return;
            }
            // A partial preamble inside a frame is more likely payload
            if point.full {
                debug!("complete preamble inside a pending frame, tracking both boundaries");
                self.candidate = Some(self.seeded_lane(point.seed_bits));
                fresh_candidate = true;
            }
        }

        let completed = self.lane.push_bit(bit);
        if !completed.is_empty() {
            trace!("received {} frame(s)", completed.len());
            messages.extend(completed);
            self.candidate = None;
            return;
        }

        if let Some(mut candidate) = self.candidate.take() {
            let completed = if fresh_candidate {
                Vec::new()
            } else {
                candidate.push_bit(bit)
            };

            if !completed.is_empty() {
                debug!("frame on the alternative byte boundary, switching to it");
                messages.extend(completed);
                self.lane = candidate;
            } else if candidate.idle_bytes < self.unlock_idle_bytes {
                self.candidate = Some(candidate);
            } else {
                debug!("alternative byte boundary produced no frame, dropping it");
            }
            return;
        }

        if self.lane.idle_bytes >= self.unlock_idle_bytes {
            debug!("no frame for {} bytes, dropping lock", self.lane.idle_bytes);
            self.state = SyncState::SeekingSync;
            self.lane = ByteLane::default();
        }
    }

    /// Start packing at the data bits that ended the preamble
    fn lock(&mut self, point: LockPoint) {
        self.state = SyncState::Locked;
        self.lane = self.seeded_lane(point.seed_bits);
        self.candidate = point.alt_seed_bits.map(|bits| self.seeded_lane(bits));
    }
}
