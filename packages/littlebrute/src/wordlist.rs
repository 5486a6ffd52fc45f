//! Line scanner for wordlists.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader},
};

/// Streams the non-empty lines of a wordlist.
///
/// Lines end in `\n` or `\r\n`, and the last line needs no terminator. Lines are yielded as raw
/// bytes without their terminator. A line longer than the maximum is an error rather than being
/// split, and at most the maximum (plus terminator) is ever buffered.
pub struct Wordlist<R> {
    reader: R,
    buf: Vec<u8>,
    // 1-based number of the last line read
    line: u64,
    max_line_bytes: usize,
}

impl Wordlist<BufReader<File>> {
    /// Open the wordlist file at `path`.
    pub async fn open(path: &Path, max_line_bytes: usize) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file), max_line_bytes))
    }
}

impl<R: AsyncBufRead + Unpin> Wordlist<R> {
    /// Scan lines from `reader`.
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Wordlist {
            reader,
            buf: Vec::new(),
            line: 0,
            max_line_bytes,
        }
    }

    /// Number of lines read so far, empty ones included.
    pub fn lines_read(&self) -> u64 {
        self.line
    }

    /// Read the next non-empty line, or `None` at the end of the wordlist.
    pub async fn next_line(&mut self) -> Result<Option<Bytes>> {
        // room for the longest line plus "\r\n"
        let limit = self.max_line_bytes as u64 + 2;
        loop {
            self.buf.clear();
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Ok(None);
            }
            self.line += 1;

            let line = match self.buf.strip_suffix(b"\n") {
                Some(line) => line,
                None if n as u64 == limit => return Err(self.too_long()),
                None => &self.buf[..],
            };
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.len() > self.max_line_bytes {
                return Err(self.too_long());
            }
            if !line.is_empty() {
                return Ok(Some(Bytes::copy_from_slice(line)));
            }
        }
    }

    fn too_long(&self) -> Error {
        Error::LineTooLong { line: self.line, max: self.max_line_bytes }
    }
}


// ==== tests ====
