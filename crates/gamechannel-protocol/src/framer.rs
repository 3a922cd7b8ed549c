//! Cuts self-delimited JSON objects out of a raw byte stream.
//!
//! There is no length prefix on the wire: a message ends where its
//! top-level object closes. The framer scans for that point while
//! tracking brace depth, whether it is inside a string literal, and
//! whether the previous string byte was a backslash. Braces inside
//! strings never count.
//!
//! Each call to [`Framer::next_frame`] consumes exactly one event from
//! the reader and leaves the rest buffered, so calls can be repeated on
//! the same reader indefinitely without losing bytes.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::FrameError;

/// Byte a client may send between messages as a liveness probe.
pub const KEEPALIVE_MARKER: u8 = b'0';

/// Default upper bound for one message.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024;

/// Number of bytes shown in the hex preview of skipped input.
const PREVIEW_LEN: usize = 16;

/// What to do with a leading byte that does not open an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Fail the connection.
    Strict,
    /// Report [`KEEPALIVE_MARKER`] as [`Frame::Keepalive`] and anything
    /// else as [`Frame::Skipped`].
    #[default]
    Tolerant,
}

impl FromStr for FramePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "tolerant" => Ok(Self::Tolerant),
            other => Err(format!(
                "unknown frame policy {other:?} (expected \"strict\" or \"tolerant\")"
            )),
        }
    }
}

impl fmt::Display for FramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Tolerant => f.write_str("tolerant"),
        }
    }
}

/// One event read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete object, from its opening brace to its closing brace.
    Message(Vec<u8>),
    /// The keepalive marker. The caller should echo it.
    Keepalive,
    /// A stray byte that was dropped, with a hex preview of what follows.
    Skipped { byte: u8, preview: String },
}

/// Stateless framing configuration. All scan state lives in one call.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    policy: FramePolicy,
    max_size: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramePolicy::default(), DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Framer {
    pub fn new(policy: FramePolicy, max_size: usize) -> Self {
        Self { policy, max_size }
    }

    pub fn policy(&self) -> FramePolicy {
        self.policy
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Reads the next event from `reader`.
    ///
    /// Waits for input as needed. Returns `Ok(None)` when the stream ends
    /// cleanly between messages.
    ///
    /// # Errors
    /// - [`FrameError::UnexpectedByte`] for a non-opening byte under
    ///   [`FramePolicy::Strict`]
    /// - [`FrameError::TooLarge`] once the message passes `max_size`
    /// - [`FrameError::UnexpectedEof`] if the stream ends mid-message
    /// - [`FrameError::Io`] if the reader fails
    pub async fn next_frame<R>(&self, reader: &mut R) -> Result<Option<Frame>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        // Skip whitespace and control bytes.
        loop {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(None);
            }
            let start = buf.iter().position(|b| *b > b' ');
            match start {
                Some(idx) => {
                    reader.consume(idx);
                    break;
                }
                None => {
                    let len = buf.len();
                    reader.consume(len);
                }
            }
        }

        let buf = reader.fill_buf().await?;
        let first = buf[0];
        if first != b'{' {
            return match self.policy {
                FramePolicy::Strict => Err(FrameError::UnexpectedByte { byte: first }),
                FramePolicy::Tolerant if first == KEEPALIVE_MARKER => {
                    reader.consume(1);
                    Ok(Some(Frame::Keepalive))
                }
                FramePolicy::Tolerant => {
                    let preview = hex_preview(&buf[1..]);
                    reader.consume(1);
                    Ok(Some(Frame::Skipped { byte: first, preview }))
                }
            };
        }

        let mut scan = Scan::default();
        let mut frame = Vec::new();
        loop {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(FrameError::UnexpectedEof {
                    buffered: frame.len(),
                });
            }

            let (used, complete) = scan.feed(buf);
            if frame.len() + used > self.max_size {
                return Err(FrameError::TooLarge {
                    limit: self.max_size,
                });
            }
            frame.extend_from_slice(&buf[..used]);
            reader.consume(used);

            if complete {
                return Ok(Some(Frame::Message(frame)));
            }
        }
    }
}

/// Brace-matching state carried across buffer refills.
#[derive(Debug, Default)]
struct Scan {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Consumes bytes until the top-level object closes.
    ///
    /// Returns how many bytes of `chunk` belong to the message and whether
    /// the message is now complete.
    fn feed(&mut self, chunk: &[u8]) -> (usize, bool) {
        for (idx, &b) in chunk.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return (idx + 1, true);
                    }
                }
                _ => {}
            }
        }
        (chunk.len(), false)
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(PREVIEW_LEN)
        .map(|b| format!("{b:02X}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_scan_stops_at_closing_brace() {
        let mut scan = Scan::default();
        assert_eq!(scan.feed(br#"{"a":{"b":1}}tail"#), (13, true));
    }

    #[test]
    fn test_scan_carries_state_across_chunks() {
        let mut scan = Scan::default();
        assert_eq!(scan.feed(br#"{"t":"a\"#), (8, false));
        assert!(scan.in_string && scan.escaped);
        assert_eq!(scan.feed(br#""}"}"#), (4, true));
    }

    #[test]
    fn test_hex_preview_is_uppercase_and_bounded() {
        assert_eq!(hex_preview(&[0xab, 0x01]), "AB01");
        assert_eq!(hex_preview(&[0xff; 40]).len(), PREVIEW_LEN * 2);
    }

    #[test]
    fn test_policy_parses() {
        assert_eq!("strict".parse::<FramePolicy>(), Ok(FramePolicy::Strict));
        assert_eq!("Tolerant".parse::<FramePolicy>(), Ok(FramePolicy::Tolerant));
        assert!("lenient".parse::<FramePolicy>().is_err());
    }

    #[tokio::test]
    async fn test_keepalive_leaves_rest_buffered() {
        let framer = Framer::default();
        let mut reader = BufReader::new(&b"0{\"op\":\"x\"}"[..]);

        assert_eq!(
            framer.next_frame(&mut reader).await.unwrap(),
            Some(Frame::Keepalive)
        );
        assert_eq!(
            framer.next_frame(&mut reader).await.unwrap(),
            Some(Frame::Message(br#"{"op":"x"}"#.to_vec()))
        );
        assert_eq!(framer.next_frame(&mut reader).await.unwrap(), None);
    }
}
