//! Message framing over byte streams.
//!
//! `LengthPrefixed` frames carry a 4-byte little-endian length before the
//! payload. `Document` frames are delimited by the end of each JSON document,
//! found with a streaming deserializer so coalesced documents split cleanly
//! and truncated ones wait for more bytes.

use std::io::{self, Write};

use scenebridge_config::Framing;
use serde::de::IgnoredAny;

use crate::errors::FrameError;

const PREFIX_LEN: usize = 4;

/// Incremental frame splitter for one connection.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    max_frame_bytes: usize,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates a decoder for the given framing and size limit.
    #[must_use]
    pub fn new(framing: Framing, max_frame_bytes: usize) -> Self {
        Self {
            framing,
            max_frame_bytes,
            buffer: Vec::new(),
        }
    }

    /// Appends bytes read from the stream.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether only whitespace (or nothing) is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    /// Removes and returns the next complete frame payload, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] when a frame exceeds the limit and
    /// [`FrameError::InvalidDocument`] when document-mode bytes can never
    /// form JSON. The buffer is discarded in both cases.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let outcome = match self.framing {
            Framing::LengthPrefixed => self.next_prefixed(),
            Framing::Document => self.next_document(),
        };
        if outcome.is_err() {
            self.buffer.clear();
        }
        outcome
    }

    fn next_prefixed(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let Some(prefix) = self.buffer.first_chunk::<PREFIX_LEN>() else {
            return Ok(None);
        };
        let size = usize::try_from(u32::from_le_bytes(*prefix)).unwrap_or(usize::MAX);
        if size > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                size,
                max_size: self.max_frame_bytes,
            });
        }
        let end = PREFIX_LEN + size;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let payload = self.buffer.get(PREFIX_LEN..end).map(<[u8]>::to_vec);
        self.buffer.drain(..end);
        Ok(payload)
    }

    fn next_document(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let start = self
            .buffer
            .iter()
            .position(|byte| !byte.is_ascii_whitespace());
        let Some(start) = start else {
            self.buffer.clear();
            return Ok(None);
        };
        self.buffer.drain(..start);

        let mut documents =
            serde_json::Deserializer::from_slice(&self.buffer).into_iter::<IgnoredAny>();
        match documents.next() {
            Some(Ok(_)) => {
                let end = documents.byte_offset();
                if end > self.max_frame_bytes {
                    return Err(FrameError::TooLarge {
                        size: end,
                        max_size: self.max_frame_bytes,
                    });
                }
                let frame: Vec<u8> = self.buffer.drain(..end).collect();
                Ok(Some(frame))
            }
            Some(Err(error)) if error.is_eof() => {
                if self.buffer.len() > self.max_frame_bytes {
                    return Err(FrameError::TooLarge {
                        size: self.buffer.len(),
                        max_size: self.max_frame_bytes,
                    });
                }
                Ok(None)
            }
            Some(Err(error)) => Err(FrameError::InvalidDocument {
                message: error.to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// Encodes one payload for the given framing.
///
/// Document frames are terminated with a newline so line-oriented readers
/// can consume them.
#[must_use]
pub fn encode_frame(framing: Framing, payload: &[u8]) -> Vec<u8> {
    match framing {
        Framing::LengthPrefixed => {
            let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
            let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
            frame.extend_from_slice(&length.to_le_bytes());
            frame.extend_from_slice(payload);
            frame
        }
        Framing::Document => {
            let mut frame = Vec::with_capacity(payload.len() + 1);
            frame.extend_from_slice(payload);
            frame.push(b'\n');
            frame
        }
    }
}

/// Writes one framed payload and flushes the writer.
///
/// # Errors
///
/// Propagates write failures from the underlying stream.
pub fn write_frame<W: Write + ?Sized>(
    writer: &mut W,
    framing: Framing,
    payload: &[u8],
) -> io::Result<()> {
    writer.write_all(&encode_frame(framing, payload))?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const LIMIT: usize = 1024;

    #[test]
    fn prefixed_frames_wait_for_the_full_payload() {
        let frame = encode_frame(Framing::LengthPrefixed, br#"{"type":"ping"}"#);
        let (head, tail) = frame.split_at(6);
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, LIMIT);

        decoder.push(head);
        assert_eq!(decoder.next_frame().expect("partial"), None);
        decoder.push(tail);
        assert_eq!(
            decoder.next_frame().expect("complete"),
            Some(br#"{"type":"ping"}"#.to_vec())
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn prefix_is_little_endian() {
        let frame = encode_frame(Framing::LengthPrefixed, &[b'x'; 258]);
        assert_eq!(frame.get(..4), Some([2_u8, 1, 0, 0].as_slice()));
    }

    #[test]
    fn prefixed_frames_reject_oversized_lengths() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, LIMIT);
        decoder.push(&u32::try_from(LIMIT + 1).expect("fits").to_le_bytes());
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::TooLarge {
                size: LIMIT + 1,
                max_size: LIMIT
            })
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn coalesced_documents_split_in_order() {
        let mut decoder = FrameDecoder::new(Framing::Document, LIMIT);
        decoder.push(br#"{"type":"a"} {"type":"b"}"#);
        assert_eq!(
            decoder.next_frame().expect("first"),
            Some(br#"{"type":"a"}"#.to_vec())
        );
        assert_eq!(
            decoder.next_frame().expect("second"),
            Some(br#"{"type":"b"}"#.to_vec())
        );
        assert_eq!(decoder.next_frame().expect("drained"), None);
        assert!(decoder.is_idle());
    }

    #[rstest]
    #[case::open_object(br#"{"type":"scene.Cre"#.as_slice())]
    #[case::open_string(br#"{"type":"scene.Create"#.as_slice())]
    #[case::whitespace(b"  \n ".as_slice())]
    fn truncated_documents_wait_for_more_bytes(#[case] input: &[u8]) {
        let mut decoder = FrameDecoder::new(Framing::Document, LIMIT);
        decoder.push(input);
        assert_eq!(decoder.next_frame().expect("no error"), None);
    }

    #[test]
    fn garbage_documents_are_rejected() {
        let mut decoder = FrameDecoder::new(Framing::Document, LIMIT);
        decoder.push(b"}{");
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn completed_documents_over_the_limit_are_rejected() {
        let document = format!(
            r#"{{"type":"ping","parameters":{{"pad":"{}"}}}}"#,
            "x".repeat(80)
        );
        let (head, tail) = document.as_bytes().split_at(50);
        let mut decoder = FrameDecoder::new(Framing::Document, 64);

        decoder.push(head);
        assert_eq!(decoder.next_frame().expect("partial"), None);
        decoder.push(tail);
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::TooLarge {
                size: document.len(),
                max_size: 64
            })
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn document_frames_end_with_newline() {
        assert_eq!(encode_frame(Framing::Document, b"{}"), b"{}\n".to_vec());
    }
}
