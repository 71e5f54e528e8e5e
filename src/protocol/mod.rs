//! Control protocol: newline-delimited handshake tokens and the line codec
//! used for status record frames.
//!
//! A worker opens a connection and sends `ready`; the supervisor answers
//! `start`. Any other opening token is a protocol violation and the
//! connection is dropped without registration. After the handshake the
//! channel carries one status record per line, worker to supervisor only,
//! until either side closes or the supervisor sends `quit`.

use std::io::{self, Read, Write};

use memchr::memchr;

/// Worker to supervisor: connection is live, ready to report.
pub const READY: &str = "ready";
/// Supervisor to worker: handshake accepted, begin reporting.
pub const START: &str = "start";
/// Supervisor to worker: stop reporting and exit.
pub const QUIT: &str = "quit";

/// Read buffer growth increment for [`LineReader::fill`].
const READ_CHUNK: usize = 4096;

/// Upper bound on buffered bytes with no delimiter in sight.
///
/// Records are a few hundred bytes; a peer that buffers this much without a
/// newline is not speaking the protocol and its channel is dropped.
const MAX_FRAME: usize = 64 * 1024;

/// Typed view of the three handshake tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// `ready`
    Ready,
    /// `start`
    Start,
    /// `quit`
    Quit,
}

impl ControlMessage {
    /// Wire token for this message, without the trailing newline.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Ready => READY,
            Self::Start => START,
            Self::Quit => QUIT,
        }
    }

    /// Parse a received line as a handshake token.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            READY => Some(Self::Ready),
            START => Some(Self::Start),
            QUIT => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Write one newline-terminated control message.
pub fn send(writer: &mut impl Write, message: ControlMessage) -> io::Result<()> {
    writer.write_all(message.as_token().as_bytes())?;
    writer.write_all(b"\n")
}

/// Accumulates raw socket reads and yields complete newline-terminated lines.
///
/// Messages are bounded (a few hundred bytes), but a single `read` may still
/// return a partial frame; callers loop `fill` until `next_line` produces a
/// full record or `fill` reports EOF.
#[derive(Debug, Default)]
pub struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    /// Create an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull one read's worth of bytes from `source` into the buffer.
    ///
    /// Returns the number of bytes read; zero means orderly EOF (peer
    /// closed). Errors, including read timeouts surfaced as `WouldBlock`,
    /// are propagated untouched. Exceeding [`MAX_FRAME`] buffered bytes
    /// without a delimiter is an `InvalidData` error; callers treat it as
    /// peer death.
    pub fn fill(&mut self, source: &mut impl Read) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = source.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        if self.buf.len() > MAX_FRAME && memchr(b'\n', &self.buf).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "frame exceeds maximum length without a delimiter",
            ));
        }
        Ok(n)
    }

    /// Pop the next complete line, if one is buffered.
    ///
    /// The trailing newline is stripped; non-UTF-8 bytes are replaced
    /// lossily rather than killing the channel.
    pub fn next_line(&mut self) -> Option<String> {
        let end = memchr(b'\n', &self.buf)?;
        let line: Vec<u8> = self.buf.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Whether any bytes are buffered but not yet a complete line.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

/// Block until one complete line arrives on `source`, or EOF.
///
/// Used for the synchronous handshake on both ends. Callers that cannot
/// tolerate a silent peer set a read timeout on the underlying stream
/// beforehand; the timeout surfaces here as an error.
pub fn read_line_blocking(
    reader: &mut LineReader,
    source: &mut impl Read,
) -> io::Result<Option<String>> {
    loop {
        if let Some(line) = reader.next_line() {
            return Ok(Some(line));
        }
        if reader.fill(source)? == 0 {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn handshake_tokens_round_trip() {
        for message in [ControlMessage::Ready, ControlMessage::Start, ControlMessage::Quit] {
            assert_eq!(ControlMessage::from_line(message.as_token()), Some(message));
        }
        assert_eq!(ControlMessage::from_line("bogus"), None);
        assert_eq!(ControlMessage::from_line(""), None);
        // Tokens are matched whole, not by prefix.
        assert_eq!(ControlMessage::from_line("readyy"), None);
    }

    #[test]
    fn send_appends_newline() {
        let mut out = Vec::new();
        send(&mut out, ControlMessage::Start).unwrap();
        assert_eq!(out, b"start\n");
    }

    #[test]
    fn line_reader_reassembles_split_frames() {
        let mut reader = LineReader::new();
        let mut first = Cursor::new(b"hel".to_vec());
        let mut second = Cursor::new(b"lo\nwor".to_vec());
        let mut third = Cursor::new(b"ld\n".to_vec());

        reader.fill(&mut first).unwrap();
        assert_eq!(reader.next_line(), None);
        assert!(reader.has_partial());

        reader.fill(&mut second).unwrap();
        assert_eq!(reader.next_line().as_deref(), Some("hello"));
        assert_eq!(reader.next_line(), None);

        reader.fill(&mut third).unwrap();
        assert_eq!(reader.next_line().as_deref(), Some("world"));
        assert!(!reader.has_partial());
    }

    #[test]
    fn line_reader_yields_multiple_buffered_lines_in_order() {
        let mut reader = LineReader::new();
        let mut source = Cursor::new(b"one\ntwo\nthree\n".to_vec());
        reader.fill(&mut source).unwrap();
        assert_eq!(reader.next_line().as_deref(), Some("one"));
        assert_eq!(reader.next_line().as_deref(), Some("two"));
        assert_eq!(reader.next_line().as_deref(), Some("three"));
        assert_eq!(reader.next_line(), None);
    }

    #[test]
    fn read_line_blocking_loops_until_delimiter_then_reports_eof() {
        let mut reader = LineReader::new();
        let mut source = Cursor::new(b"ready\n".to_vec());
        let line = read_line_blocking(&mut reader, &mut source).unwrap();
        assert_eq!(line.as_deref(), Some("ready"));
        // Nothing further buffered: next call sees EOF.
        let eof = read_line_blocking(&mut reader, &mut source).unwrap();
        assert_eq!(eof, None);
    }

    #[test]
    fn delimiterless_stream_is_cut_off_at_the_frame_bound() {
        let mut reader = LineReader::new();
        let mut source = Cursor::new(vec![b'x'; MAX_FRAME + READ_CHUNK]);
        let err = loop {
            match reader.fill(&mut source) {
                Ok(0) => panic!("EOF before the bound"),
                Ok(_) => {}
                Err(e) => break e,
            }
        };
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn frames_under_the_bound_are_unaffected() {
        let mut reader = LineReader::new();
        let mut payload = vec![b'y'; READ_CHUNK * 2];
        payload.push(b'\n');
        let mut source = Cursor::new(payload);
        while reader.next_line().is_none() {
            assert!(reader.fill(&mut source).unwrap() > 0);
        }
    }

    #[test]
    fn empty_line_is_a_valid_frame() {
        let mut reader = LineReader::new();
        let mut source = Cursor::new(b"\n".to_vec());
        reader.fill(&mut source).unwrap();
        assert_eq!(reader.next_line().as_deref(), Some(""));
    }
}
