// src/io/serial/framer.rs
//
// Modem line framing.
// Turns the character stream coming off the radio modem into packet frames.
// Pure state machine with no I/O, so the listener thread only feeds it bytes.
//
// Wire rules:
//   '\r'  always ends the current frame (an empty frame is still a frame)
//   '('   ends the current frame when something is buffered, and is dropped;
//         on an empty buffer it is ordinary payload
//   '\n'  ignored
//   other characters are payload

use std::fmt;

// =============================================================================
// Constants
// =============================================================================

const FRAME_END: char = '\r';
const FRAME_SPLIT: char = '(';
const LINE_FEED: char = '\n';

// =============================================================================
// Types
// =============================================================================

/// One complete packet as delimited on the serial line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    text: String,
}

impl Frame {
    pub fn new(text: impl Into<String>) -> Self {
        Frame { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<Frame> for String {
    fn from(frame: Frame) -> Self {
        frame.text
    }
}

impl PartialEq<&str> for Frame {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

// =============================================================================
// Frame Assembler
// =============================================================================

/// Stateful assembler for the modem's character stream.
/// Reused for the whole lifetime of a transport; it never fails.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        FrameAssembler {
            buffer: String::with_capacity(64),
        }
    }

    /// Feed a single character. Returns the frame it completes, if any.
    pub fn push(&mut self, ch: char) -> Option<Frame> {
        match ch {
            FRAME_END => Some(self.take()),
            FRAME_SPLIT if !self.buffer.is_empty() => Some(self.take()),
            LINE_FEED => None,
            _ => {
                self.buffer.push(ch);
                None
            }
        }
    }

    /// Feed raw bytes off the link. Each byte is one character.
    /// Returns every frame completed by this chunk, in order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        data.iter().filter_map(|&b| self.push(b as char)).collect()
    }

    /// Text buffered since the last frame boundary
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn take(&mut self) -> Frame {
        Frame {
            text: std::mem::take(&mut self.buffer),
        }
    }
}
