//! CBOR framing over async byte streams
//!
//! CBOR items are self-delimiting, so no length prefix is written. The
//! reader walks item heads to find where one message ends.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Default upper bound for a single message
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

const BREAK: u8 = 0xff;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Malformed CBOR: {0}")]
    Malformed(String),

    #[error("Message of at least {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge { size: u64, limit: usize },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::ConnectionClosed
        } else {
            CodecError::Io(e)
        }
    }
}

/// Encode one message
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(message, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode one complete frame
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, CodecError> {
    ciborium::de::from_reader(frame).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encode, write and flush one message
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(message)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Open container while walking a frame
enum Nesting {
    /// Definite length container with this many items left
    Items(u64),
    /// Indefinite length container, ended by a break
    UntilBreak,
}

/// Reads whole CBOR items from a byte stream
pub struct FrameReader<R> {
    reader: BufReader<R>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, DEFAULT_MAX_MESSAGE_BYTES)
    }

    pub fn with_limit(reader: R, limit: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Read and decode the next message
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let frame = self.read_frame().await?;
        decode(&frame)
    }

    /// Read the raw bytes of exactly one CBOR item
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, CodecError> {
        let mut frame = Vec::new();
        let mut stack: Vec<Nesting> = Vec::new();

        loop {
            let initial = self.take_byte(&mut frame).await?;

            if initial == BREAK {
                match stack.pop() {
                    Some(Nesting::UntilBreak) => {
                        if item_done(&mut stack) {
                            return Ok(frame);
                        }
                        continue;
                    }
                    _ => return Err(CodecError::Malformed("unexpected break".to_string())),
                }
            }

            let major = initial >> 5;
            let info = initial & 0x1f;
            let argument = self.take_argument(&mut frame, info).await?;

            let done = match (major, argument) {
                // unsigned and negative integers
                (0 | 1, Some(_)) => item_done(&mut stack),
                // byte and text strings
                (2 | 3, Some(len)) => {
                    self.take_bytes(&mut frame, len).await?;
                    item_done(&mut stack)
                }
                (2 | 3, None) => {
                    stack.push(Nesting::UntilBreak);
                    false
                }
                // arrays and maps
                (4 | 5, Some(len)) => {
                    let items = if major == 5 { len.saturating_mul(2) } else { len };
                    if items == 0 {
                        item_done(&mut stack)
                    } else {
                        stack.push(Nesting::Items(items));
                        false
                    }
                }
                (4 | 5, None) => {
                    stack.push(Nesting::UntilBreak);
                    false
                }
                // a tag applies to the item that follows
                (6, Some(_)) => false,
                // simple values and floats
                (7, Some(_)) => item_done(&mut stack),
                _ => {
                    return Err(CodecError::Malformed(format!(
                        "invalid initial byte {initial:#04x}"
                    )))
                }
            };

            if done {
                return Ok(frame);
            }
        }
    }

    /// Argument of a head; `None` for indefinite length
    async fn take_argument(&mut self, frame: &mut Vec<u8>, info: u8) -> Result<Option<u64>, CodecError> {
        let width = match info {
            0..=23 => return Ok(Some(u64::from(info))),
            24 => 1,
            25 => 2,
            26 => 4,
            27 => 8,
            31 => return Ok(None),
            _ => {
                return Err(CodecError::Malformed(format!(
                    "reserved additional information {info}"
                )))
            }
        };

        let start = frame.len();
        self.take_bytes(frame, width).await?;
        Ok(Some(
            frame[start..]
                .iter()
                .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)),
        ))
    }

    async fn take_byte(&mut self, frame: &mut Vec<u8>) -> Result<u8, CodecError> {
        self.check_limit(frame.len() as u64 + 1)?;
        let byte = self.reader.read_u8().await?;
        frame.push(byte);
        Ok(byte)
    }

    async fn take_bytes(&mut self, frame: &mut Vec<u8>, len: u64) -> Result<(), CodecError> {
        let size = (frame.len() as u64).saturating_add(len);
        self.check_limit(size)?;

        let start = frame.len();
        // check_limit bounds size by a usize
        frame.resize(size as usize, 0);
        self.reader.read_exact(&mut frame[start..]).await?;
        Ok(())
    }

    fn check_limit(&self, size: u64) -> Result<(), CodecError> {
        if size > self.limit as u64 {
            return Err(CodecError::MessageTooLarge {
                size,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Record a completed item; true once the outermost item is complete
fn item_done(stack: &mut Vec<Nesting>) -> bool {
    loop {
        match stack.last_mut() {
            None => return true,
            Some(Nesting::UntilBreak) => return false,
            Some(Nesting::Items(left)) => {
                *left -= 1;
                if *left > 0 {
                    return false;
                }
                stack.pop();
            }
        }
    }
}
