//! # Status Line Parser
//!
//! Turns the raw bytes of the status channel into [`StatusEvent`]s.
//!
//! A line is `[GNUPG:] KEYWORD[ args]`. Bytes are buffered until a newline
//! arrives, so reads that split a line are harmless. Lines without a
//! recognizable keyword become [`StatusCode::ProtocolError`] events carrying
//! the raw line; they are never dropped.

use shared_types::{EngineError, StatusCode, StatusEvent, STATUS_PREFIX};

/// Longest status line accepted before the rest of it is discarded.
pub const MAX_STATUS_LINE: usize = 64 * 1024;

/// Parse one complete line (without its terminator).
#[must_use]
pub fn parse_line(raw: &str) -> StatusEvent {
    let line = raw.strip_suffix('\r').unwrap_or(raw);
    let Some(rest) = line.strip_prefix(STATUS_PREFIX) else {
        return StatusEvent::protocol_error(line);
    };
    let Some(rest) = rest.strip_prefix(' ') else {
        return StatusEvent::protocol_error(line);
    };
    let (keyword, args) = match rest.split_once(' ') {
        Some((keyword, args)) => (keyword, args),
        None => (rest, ""),
    };
    match StatusCode::from_keyword(keyword) {
        Some(code) => StatusEvent::new(code, args),
        None => StatusEvent::protocol_error(line),
    }
}

/// Line-buffering parser for one status channel.
#[derive(Debug, Default)]
pub struct StatusLineParser {
    pending: Vec<u8>,
    /// Set while skipping the remainder of an overlong line.
    discarding: bool,
}

impl StatusLineParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for a terminator.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Consume a chunk and return every event it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StatusEvent>, EngineError> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];
            if self.discarding {
                self.discarding = false;
                self.pending.clear();
                continue;
            }
            self.stage(head)?;
            events.push(self.take_line());
        }

        if !rest.is_empty() && !self.discarding {
            self.stage(rest)?;
            if self.pending.len() > MAX_STATUS_LINE {
                let mut head = std::mem::take(&mut self.pending);
                head.truncate(64);
                events.push(StatusEvent::protocol_error(format!(
                    "overlong status line: {}",
                    String::from_utf8_lossy(&head)
                )));
                self.discarding = true;
            }
        }

        Ok(events)
    }

    /// End of stream: an unterminated trailing fragment is parsed as a line.
    pub fn finish(&mut self) -> Option<StatusEvent> {
        if self.discarding || self.pending.is_empty() {
            self.discarding = false;
            self.pending.clear();
            return None;
        }
        Some(self.take_line())
    }

    fn stage(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        self.pending
            .try_reserve(bytes.len())
            .map_err(|_| EngineError::ResourceExhausted {
                stage: "status line buffer".to_string(),
            })?;
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    fn take_line(&mut self) -> StatusEvent {
        let line = std::mem::take(&mut self.pending);
        parse_line(&String::from_utf8_lossy(&line))
    }
}
