//! UTF-8 chunk codec for interpreter output streams.
//!
//! Unlike a line codec this yields whatever decoded text is available as
//! soon as the pipe delivers it, so prompts without a trailing newline
//! (`input> `) reach the UI immediately. The only bytes ever held back are
//! the leading bytes of a multi-byte character split across two reads.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use lumen_runner::supervisor::codec::ChunkCodec;
//!
//! let chunks = FramedRead::new(child_stdout, ChunkCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::{AppError, Result};

/// Decoder turning raw pipe bytes into newline-preserving text fragments.
///
/// Invalid byte sequences are replaced with `U+FFFD` rather than failing the
/// stream; an incomplete trailing sequence waits for the next read, and is
/// flushed lossily at EOF.
#[derive(Debug, Default)]
pub struct ChunkCodec;

impl ChunkCodec {
    /// Create a new `ChunkCodec`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ChunkCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let take = match std::str::from_utf8(src) {
            Ok(_) => src.len(),
            Err(err) => match err.error_len() {
                // Incomplete sequence at the end of the buffer.
                None if err.valid_up_to() == 0 => return Ok(None),
                None => err.valid_up_to(),
                // Genuinely invalid bytes: emit them replaced.
                Some(bad) => err.valid_up_to() + bad,
            },
        };

        let bytes = src.split_to(take);
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(chunk) => Ok(Some(chunk)),
            None if src.is_empty() => Ok(None),
            None => {
                let rest = src.split();
                Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
            }
        }
    }
}
