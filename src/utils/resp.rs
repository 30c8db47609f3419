//! RESP2 wire codec
//!
//! Commands go out as arrays of bulk strings. Replies are read from a
//! buffered stream one value at a time; nested arrays are decoded
//! recursively.

use std::io::{self, BufRead};

/// Largest bulk string the server may send (proto-max-bulk-len default)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// One decoded reply
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK`
    SimpleString(String),
    /// `-ERR message`, including MOVED/ASK redirects
    Error(String),
    /// `:1000`
    Integer(i64),
    /// `$6\r\nfoobar`
    BulkString(Vec<u8>),
    /// `$-1` or `*-1`
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Error text, if this is an error reply
    pub fn error_message(&self) -> Option<&str> {
        match self {
            RespValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Short form for error messages; bulk payloads are not echoed
    pub fn describe(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}", s),
            RespValue::Error(e) => format!("-{}", e),
            RespValue::Integer(i) => format!(":{}", i),
            RespValue::BulkString(b) => format!("${} bytes", b.len()),
            RespValue::Null => "null".to_string(),
            RespValue::Array(items) => format!("array of {}", items.len()),
        }
    }
}

/// Command encoder
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    /// Encoder holding `args` already encoded
    pub fn for_command(args: &[&[u8]]) -> Self {
        // "$<len>\r\n<arg>\r\n" per argument, 16 bytes covers the framing
        let capacity = 16 + args.iter().map(|a| a.len() + 16).sum::<usize>();
        let mut encoder = Self {
            buf: Vec::with_capacity(capacity),
        };
        encoder.encode_command(args);
        encoder
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append `args` as one RESP array of bulk strings
    pub fn encode_command(&mut self, args: &[&[u8]]) {
        self.write_header(b'*', args.len());
        for arg in args {
            self.write_header(b'$', arg.len());
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    #[inline]
    fn write_header(&mut self, prefix: u8, len: usize) {
        let mut digits = itoa::Buffer::new();
        self.buf.push(prefix);
        self.buf.extend_from_slice(digits.format(len).as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }
}

/// Reply decoder over a buffered reader
pub struct RespDecoder<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::with_capacity(128),
        }
    }

    /// Read the next complete reply
    pub fn decode(&mut self) -> io::Result<RespValue> {
        let (kind, body) = self.read_line()?;
        match kind {
            b'+' => Ok(RespValue::SimpleString(body)),
            b'-' => Ok(RespValue::Error(body)),
            b':' => Ok(RespValue::Integer(parse_int(&body, "integer")?)),
            b'$' => self.read_bulk(parse_int(&body, "bulk length")?),
            b'*' => self.read_array(parse_int(&body, "array length")?),
            other => Err(invalid(format!(
                "Invalid RESP type byte: {:?}",
                other as char
            ))),
        }
    }

    /// One CRLF-terminated line, split into its type byte and the rest
    fn read_line(&mut self) -> io::Result<(u8, String)> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed by server",
            ));
        }

        let line = self.line.trim_end_matches(&['\r', '\n'][..]);
        let mut chars = line.chars();
        match chars.next() {
            Some(kind) if kind.is_ascii() => Ok((kind as u8, chars.as_str().to_string())),
            Some(_) => Err(invalid("Non-ASCII RESP type byte".to_string())),
            None => Err(invalid("Empty RESP line".to_string())),
        }
    }

    fn read_bulk(&mut self, len: i64) -> io::Result<RespValue> {
        if len < 0 {
            return Ok(RespValue::Null);
        }
        if len > MAX_BULK_LEN {
            return Err(invalid(format!("Bulk string of {} bytes exceeds limit", len)));
        }

        let mut data = vec![0u8; len as usize + 2];
        self.reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("Bulk string not terminated by CRLF".to_string()));
        }
        data.truncate(len as usize);
        Ok(RespValue::BulkString(data))
    }

    fn read_array(&mut self, count: i64) -> io::Result<RespValue> {
        if count < 0 {
            return Ok(RespValue::Null);
        }
        (0..count)
            .map(|_| self.decode())
            .collect::<io::Result<Vec<_>>>()
            .map(RespValue::Array)
    }
}

fn parse_int(body: &str, what: &str) -> io::Result<i64> {
    body.parse()
        .map_err(|_| invalid(format!("Invalid {}: {:?}", what, body)))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
