//! Simulated interactive input
//!
//! The stdin buffer is delivered to the executed content as a base64 payload
//! and answered line by line from `prompt`. Once the lines run out, prompts
//! fall back to their default.

use crate::abi::{RuntimeError, RuntimeResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sandpit_types::StdinBuffer;
use std::collections::VecDeque;

/// Encode a stdin buffer as the payload embedded in documents
pub fn encode_payload(stdin: &StdinBuffer) -> String {
    STANDARD.encode(stdin.raw().as_bytes())
}

/// Decode a payload produced by [`encode_payload`]
pub fn decode_payload(payload: &str) -> RuntimeResult<StdinBuffer> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| RuntimeError::StdinDecode(e.to_string()))?;
    let raw = String::from_utf8(bytes).map_err(|e| RuntimeError::StdinDecode(e.to_string()))?;
    Ok(StdinBuffer::new(raw))
}

/// FIFO of pre-recorded answers
#[derive(Debug, Clone, Default)]
pub struct StdinSimulator {
    lines: VecDeque<String>,
}

impl StdinSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_buffer(stdin: &StdinBuffer) -> Self {
        Self {
            lines: stdin.lines().into(),
        }
    }

    /// Build from an embedded payload; a malformed payload yields no lines
    pub fn from_payload(payload: &str) -> Self {
        match decode_payload(payload) {
            Ok(stdin) => Self::from_buffer(&stdin),
            Err(e) => {
                tracing::warn!("Discarding stdin payload: {}", e);
                Self::new()
            }
        }
    }

    /// Answer a prompt with the next line, or the default when exhausted
    pub fn prompt(&mut self, default: Option<&str>) -> String {
        match self.lines.pop_front() {
            Some(line) => line,
            None => default.unwrap_or("").to_string(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_consume_in_order() {
        let mut stdin = StdinSimulator::from_buffer(&StdinBuffer::new("Chandan\n26"));
        assert_eq!(stdin.prompt(None), "Chandan");
        assert_eq!(stdin.prompt(Some("x")), "26");
        assert_eq!(stdin.prompt(Some("fallback")), "fallback");
        assert_eq!(stdin.prompt(None), "");
    }

    #[test]
    fn test_payload_preserves_unicode() {
        let stdin = StdinBuffer::new("héllo\n世界");
        let mut sim = StdinSimulator::from_payload(&encode_payload(&stdin));
        assert_eq!(sim.prompt(None), "héllo");
        assert_eq!(sim.prompt(None), "世界");
    }

    #[test]
    fn test_bad_payload_is_empty() {
        let sim = StdinSimulator::from_payload("%%% not base64");
        assert!(sim.is_exhausted());
        assert!(decode_payload("%%%").is_err());
    }
}
