//! Wire frame decoding
//!
//! Turns the raw byte stream of a chat response into complete event records,
//! tolerating arbitrary network chunk boundaries.

use log::trace;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of one `data:` record, marker stripped.
    Record(String),
    /// The literal stream terminator record.
    Done,
}

/// Incremental line decoder with a carry-over buffer.
///
/// Network chunking may split a record across two reads or deliver several
/// records in one read; `feed` yields only complete records and retains the
/// trailing incomplete fragment for the next read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    residual: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one network chunk and drain all complete records from it.
    ///
    /// A `Frame::Done` short-circuits the stream: anything buffered after the
    /// terminator is dropped and no further frame is yielded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.residual.extend_from_slice(chunk);

        let mut frames = Vec::new();
        // Splitting on b'\n' is safe mid-UTF-8: no continuation byte is 0x0A.
        while let Some(pos) = self.residual.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.residual.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match decode_line(&line) {
                Some(Frame::Done) => {
                    frames.push(Frame::Done);
                    self.residual.clear();
                    return frames;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        frames
    }

    /// Flush a trailing record the transport closed without terminating.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.residual.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.residual).into_owned();
        self.residual.clear();
        decode_line(&line)
    }
}

fn decode_line(line: &str) -> Option<Frame> {
    let line = line.trim_end_matches(['\n', '\r']);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        if !line.is_empty() {
            trace!("Discarding non-record line: {:?}", line);
        }
        return None;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    Some(Frame::Record(payload.to_string()))
}
