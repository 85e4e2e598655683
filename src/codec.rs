//! Newline-delimited line codec
//!
//! Decodes input into text lines of at most `max_length` bytes. An oversized
//! line is truncated: its first `max_length` bytes are yielded and the rest
//! up to the next newline is discarded. Invalid UTF-8 is replaced, not
//! rejected. Encodes `ServerMessage` as one `\n`-terminated line.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::AppError;
use crate::message::ServerMessage;

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Dropping the tail of an oversized line
    discarding: bool,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            discarding: false,
        }
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, AppError> {
        loop {
            let newline = buf.iter().position(|b| *b == b'\n');

            if self.discarding {
                match newline {
                    Some(pos) => {
                        buf.advance(pos + 1);
                        self.discarding = false;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
                continue;
            }

            return match newline {
                Some(pos) if pos <= self.max_length => {
                    let line = buf.split_to(pos + 1);
                    Ok(Some(to_line(&line[..pos])))
                }
                // Full line longer than the limit: keep the head, drop the rest
                Some(pos) => {
                    let line = to_line(&buf[..self.max_length]);
                    buf.advance(pos + 1);
                    Ok(Some(line))
                }
                None if buf.len() > self.max_length => {
                    let head = buf.split_to(self.max_length);
                    self.discarding = true;
                    Ok(Some(to_line(&head)))
                }
                None => Ok(None),
            };
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, AppError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split();
        Ok(Some(to_line(&rest)))
    }
}

impl Encoder<ServerMessage> for LineCodec {
    type Error = AppError;

    fn encode(&mut self, msg: ServerMessage, dst: &mut BytesMut) -> Result<(), AppError> {
        let line = msg.to_string();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
