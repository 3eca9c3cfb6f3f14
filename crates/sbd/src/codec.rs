//! Line framing for the AT command channel.
//!
//! The modem terminates its responses with a carriage return, usually
//! followed by a line feed. The codec yields each line with the terminators
//! trimmed and drops empty lines, so `OK` arrives as exactly `"OK"` whatever
//! the modem's line-ending mood.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Default)]
pub struct AtCodec {
    _private: (),
}

impl AtCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn trim_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c| c == '\r' || c == '\n')
        .to_string()
}

impl Decoder for AtCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        while let Some(i) = src.iter().position(|&b| b == b'\r') {
            let raw = src.split_to(i + 1);
            let line = trim_line(&raw);
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Final unterminated line.
        let raw = src.split_to(src.len());
        let line = trim_line(&raw);
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<String> {
        let mut codec = AtCodec::new();
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            out.push(line);
        }
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn splits_on_carriage_return() {
        assert_eq!(decode_all(b"OK\rREADY\r"), vec!["OK", "READY"]);
    }

    #[test]
    fn trims_crlf_pairs_and_drops_blanks() {
        assert_eq!(
            decode_all(b"\r\nOK\r\n\r\n+CSQ:4\r\n"),
            vec!["OK", "+CSQ:4"]
        );
    }

    #[test]
    fn partial_line_waits_for_terminator() {
        let mut codec = AtCodec::new();
        let mut buf = BytesMut::from(&b"REA"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"DY\r");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("READY".to_string()));
    }

    #[test]
    fn eof_flushes_unterminated_tail() {
        assert_eq!(decode_all(b"OK\r0"), vec!["OK", "0"]);
    }
}
