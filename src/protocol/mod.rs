//! Protocol constants, request construction, and response-head parsing.
//!
//! # Module Organization
//!
//! ```text
//! protocol/
//! ├── constants - Endpoint names, identity headers, wildcard, id length
//! ├── headers   - Status line, header line and chunk-size parsing
//! └── request   - GET/POST request builder with percent-encoded arguments
//! ```

pub mod constants;
mod headers;
mod request;

pub use headers::{is_chunked_header, parse_chunk_size, parse_content_length, parse_status_line};
pub use request::{percent_encode, RequestBuilder};
