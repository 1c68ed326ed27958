//! Bounded stdout capture for one worker

use tokio::sync::mpsc;

/// Accumulates a worker's stdout up to a byte cap, in arrival order.
///
/// Bytes past the cap are counted and discarded; the channel keeps being
/// drained so the worker never blocks on a full pipe.
#[derive(Debug)]
pub struct OutputCollector {
    cap: usize,
    buf: Vec<u8>,
    dropped: usize,
}

/// Text handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedOutput {
    pub text: String,
    pub truncated: bool,
    pub dropped_bytes: usize,
}

impl OutputCollector {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            buf: Vec::with_capacity(cap.min(8 * 1024)),
            dropped: 0,
        }
    }

    /// Append a chunk, keeping at most `cap` bytes in total
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.buf.len());
        let kept = room.min(chunk.len());
        self.buf.extend_from_slice(&chunk[..kept]);
        self.dropped += chunk.len() - kept;
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Drain the worker's stdout channel until the sender side closes
    pub async fn drain(&mut self, rx: &mut mpsc::Receiver<Vec<u8>>) {
        while let Some(chunk) = rx.recv().await {
            self.push(&chunk);
        }
    }

    pub fn finish(self) -> CollectedOutput {
        let truncated = self.is_truncated();
        let mut bytes = self.buf;

        // A cut can land inside a multi-byte character; drop the partial tail.
        if let Err(err) = std::str::from_utf8(&bytes) {
            if err.error_len().is_none() {
                bytes.truncate(err.valid_up_to());
            }
        }

        let mut text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };

        // Replacement characters can grow the text past the cap.
        if text.len() > self.cap {
            let mut end = self.cap;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }

        CollectedOutput {
            text,
            truncated,
            dropped_bytes: self.dropped,
        }
    }
}
