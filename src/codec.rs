//! Lenient line decoding
//!
//! Splits the inbound byte stream on `\n` with a length cap and decodes each
//! line as UTF-8, replacing invalid sequences instead of failing. A stray
//! Latin-1 byte from a terminal must not end a session.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

/// Newline-delimited decoder producing lossily decoded `String`s
#[derive(Debug, Clone)]
pub struct LossyLinesCodec {
    inner: AnyDelimiterCodec,
}

impl LossyLinesCodec {
    /// Lines longer than `max_length` bytes are an error
    pub fn new_with_max_length(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
        }
    }
}

impl Decoder for LossyLinesCodec {
    type Item = String;
    type Error = AnyDelimiterCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.decode(buf)?.map(to_line))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.decode_eof(buf)?.map(to_line))
    }
}

/// Strip a trailing `\r` and decode, replacing invalid UTF-8
fn to_line(chunk: Bytes) -> String {
    let line: &[u8] = chunk.as_ref();
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<String> {
        let mut codec = LossyLinesCodec::new_with_max_length(64);
        let mut buf = BytesMut::from(input);
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            lines.push(line);
        }
        if let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_decode_lines() {
        assert_eq!(decode_all(b"hello\r\nworld\n"), vec!["hello", "world"]);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        assert_eq!(decode_all(b"caf\xe9\nok\n"), vec!["caf\u{fffd}", "ok"]);
    }

    #[test]
    fn test_trailing_line_without_newline() {
        assert_eq!(decode_all(b"one\ntwo"), vec!["one", "two"]);
    }

    #[test]
    fn test_partial_line_waits_for_delimiter() {
        let mut codec = LossyLinesCodec::new_with_max_length(64);
        let mut buf = BytesMut::from(&b"partial"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" line\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("partial line"));
    }

    #[test]
    fn test_overlong_line_is_an_error() {
        let mut codec = LossyLinesCodec::new_with_max_length(4);
        let mut buf = BytesMut::from(&b"way too long\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)
        ));
    }
}
