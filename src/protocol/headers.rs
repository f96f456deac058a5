//! Response-head parsing for the hub's HTTP/1.1 replies.
//!
//! The reader works line by line on CRLF-trimmed text; these helpers interpret
//! the few lines it cares about.
//!
//! | Line | Helper | Example |
//! |------|--------|---------|
//! | Status line | [`parse_status_line`] | `HTTP/1.1 200 OK` |
//! | Transfer-Encoding | [`is_chunked_header`] | `Transfer-Encoding: chunked` |
//! | Content-Length | [`parse_content_length`] | `Content-Length: 38` |
//! | Chunk size | [`parse_chunk_size`] | `1a` or `1a;ext=1` |
//!
//! # Examples
//!
//! ```
//! use constellation_http::protocol::{parse_status_line, parse_chunk_size, is_chunked_header};
//!
//! assert_eq!(parse_status_line("HTTP/1.1 204 No Content").unwrap(), 204);
//! assert_eq!(parse_chunk_size("1A").unwrap(), 26);
//! assert!(is_chunked_header("Transfer-Encoding: chunked"));
//! ```

use crate::error::{ConstellationError, Result};

/// Parse the status code out of a status line.
///
/// The code is the second whitespace-separated token and must be exactly three
/// digits.
///
/// # Errors
///
/// Returns [`ConstellationError::Protocol`] if the line has no such token.
///
/// # Examples
///
/// ```
/// use constellation_http::protocol::parse_status_line;
///
/// assert_eq!(parse_status_line("HTTP/1.1 500 Internal Server Error").unwrap(), 500);
/// assert!(parse_status_line("garbage").is_err());
/// ```
pub fn parse_status_line(line: &str) -> Result<u16> {
    let code = line
        .split_whitespace()
        .nth(1)
        .filter(|code| code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ConstellationError::Protocol(format!("Invalid status line: {}", line)))?;

    code.parse()
        .map_err(|_| ConstellationError::Protocol(format!("Invalid status line: {}", line)))
}

/// Whether a header line switches the body to chunked transfer-encoding.
///
/// The header name is compared case-insensitively, the value must be exactly
/// `chunked`.
pub fn is_chunked_header(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, value)) => {
            name.trim().eq_ignore_ascii_case("transfer-encoding") && value.trim() == "chunked"
        }
        None => false,
    }
}

/// Extract the length from a `Content-Length` header line.
///
/// Returns `None` for any other header.
///
/// # Errors
///
/// Returns [`ConstellationError::Protocol`] if the value is not a number.
pub fn parse_content_length(line: &str) -> Result<Option<usize>> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| {
            ConstellationError::Protocol(format!("Invalid content-length: {}", value.trim()))
        })
}

/// Parse a chunk-size line (hexadecimal, optional `;extension` ignored).
///
/// # Errors
///
/// Returns [`ConstellationError::Protocol`] if the line holds no hex number.
///
/// # Examples
///
/// ```
/// use constellation_http::protocol::parse_chunk_size;
///
/// assert_eq!(parse_chunk_size("5").unwrap(), 5);
/// assert_eq!(parse_chunk_size("ff;name=value").unwrap(), 255);
/// assert_eq!(parse_chunk_size("0").unwrap(), 0);
/// assert!(parse_chunk_size("zz").is_err());
/// ```
pub fn parse_chunk_size(line: &str) -> Result<usize> {
    let size = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(size, 16)
        .map_err(|_| ConstellationError::Protocol(format!("Invalid chunk size: {:?}", line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK").unwrap(), 200);
        assert_eq!(parse_status_line("HTTP/1.0 404").unwrap(), 404);
    }

    #[test]
    fn test_parse_status_line_invalid() {
        assert!(parse_status_line("").is_err());
        assert!(parse_status_line("HTTP/1.1 20 OK").is_err());
        assert!(parse_status_line("HTTP/1.1 abc OK").is_err());
    }

    #[test]
    fn test_is_chunked_header() {
        assert!(is_chunked_header("Transfer-Encoding: chunked"));
        assert!(is_chunked_header("transfer-encoding:chunked"));
        assert!(!is_chunked_header("Transfer-Encoding: gzip"));
        assert!(!is_chunked_header("Content-Type: chunked/text"));
    }

    #[test]
    fn test_parse_content_length() {
        assert_eq!(parse_content_length("Content-Length: 38").unwrap(), Some(38));
        assert_eq!(parse_content_length("content-length:0").unwrap(), Some(0));
        assert_eq!(parse_content_length("Content-Type: application/json").unwrap(), None);
        assert!(parse_content_length("Content-Length: many").is_err());
    }

    #[test]
    fn test_parse_chunk_size() {
        assert_eq!(parse_chunk_size("6").unwrap(), 6);
        assert_eq!(parse_chunk_size(" a ").unwrap(), 10);
        assert!(parse_chunk_size("").is_err());
    }
}
