use crate::error::{ModemError, Result};
use crate::{FRAME_HEADER_SIZE, FRAME_MARKER, FRAME_OVERHEAD, MAX_PAYLOAD_SIZE};
use log::{debug, trace};

/// Consumed prefix length at which the scanner compacts its buffer
const SCANNER_COMPACT_THRESHOLD: usize = 1024;

/// CRC-16 (poly 0xA001 reflected, init 0xFFFF, no final XOR) for payload integrity
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            let lsb = crc & 1;
            crc >>= 1;
            if lsb != 0 {
                crc ^= 0xA001;
            }
        }
    }
    crc
}

/// Wrap a payload into a self-delimiting frame:
/// `0x7E | len (u16 BE) | payload | crc16(payload) (u16 BE)`
pub fn frame_message(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ModemError::PayloadTooLarge { len: payload.len() });
    }

    let mut framed = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    framed.push(FRAME_MARKER);
    framed.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    framed.extend_from_slice(payload);
    framed.extend_from_slice(&crc16(payload).to_be_bytes());

    Ok(framed)
}

/// Result of scanning a byte stream for frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Valid payloads in stream order
    pub messages: Vec<Vec<u8>>,
    /// Unconsumed tail: a partial frame starting at a marker, or empty
    pub remainder: Vec<u8>,
}

/// Scan a raw byte stream for valid frames.
///
/// Bytes before a marker are dropped. A frame whose checksum does not match
/// is treated as a false marker and scanning resumes one byte after it. A
/// frame that does not fit in the available bytes stops the scan and is
/// returned as the remainder.
pub fn scan(buffer: &[u8]) -> Scan {
    let mut messages = Vec::new();
    let consumed = scan_into(buffer, &mut messages);
    Scan {
        messages,
        remainder: buffer[consumed..].to_vec(),
    }
}

/// Scan `buffer`, pushing payloads into `messages`.
/// Returns the number of leading bytes consumed.
fn scan_into(buffer: &[u8], messages: &mut Vec<Vec<u8>>) -> usize {
    let mut pos = 0;

    loop {
        let Some(offset) = buffer[pos..].iter().position(|&b| b == FRAME_MARKER) else {
            if pos < buffer.len() {
                trace!("dropped {} bytes with no frame marker", buffer.len() - pos);
            }
            return buffer.len();
        };
        if offset > 0 {
            trace!("dropped {} bytes before frame marker", offset);
        }
        pos += offset;

        let available = buffer.len() - pos;
        if available < FRAME_HEADER_SIZE {
            return pos;
        }

        let payload_len = u16::from_be_bytes([buffer[pos + 1], buffer[pos + 2]]) as usize;
        let frame_len = FRAME_OVERHEAD + payload_len;
        if frame_len > available {
            return pos;
        }

        let payload_start = pos + FRAME_HEADER_SIZE;
        let payload_end = payload_start + payload_len;
        let payload = &buffer[payload_start..payload_end];
        let received_crc = u16::from_be_bytes([buffer[payload_end], buffer[payload_end + 1]]);

        if crc16(payload) == received_crc {
            trace!("frame with {} byte payload", payload_len);
            messages.push(payload.to_vec());
            pos += frame_len;
        } else {
            debug!(
                "CRC mismatch on {} byte candidate frame, skipping marker",
                payload_len
            );
            pos += 1;
        }
    }
}

/// Streaming frame scanner over a growing receive buffer
///
/// Consumed bytes are tracked with a cursor and only compacted once the dead
/// prefix dominates the buffer, so appending and consuming stay amortized O(1).
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: Vec<u8>,
    start: usize,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte and return every frame it completed
    pub fn push(&mut self, byte: u8) -> Vec<Vec<u8>> {
        self.buffer.push(byte);
        self.rescan()
    }

    /// Append a run of bytes and return every frame they completed
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        self.rescan()
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.start..]
    }

    /// True when no partial frame is buffered
    pub fn is_idle(&self) -> bool {
        self.start == self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start = 0;
    }

    fn rescan(&mut self) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        self.start += scan_into(&self.buffer[self.start..], &mut messages);
        self.compact();
        messages
    }

    fn compact(&mut self) {
        if self.start == self.buffer.len() {
            self.clear();
        } else if self.start >= SCANNER_COMPACT_THRESHOLD && self.start * 2 >= self.buffer.len() {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }
}
