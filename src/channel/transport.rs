//! Backend transport abstraction.
//!
//! The control layer only needs line-oriented request/reply framing over a
//! single stream; the concrete line syntax is owned by
//! [`crate::channel::command`]. Splitting the transport into a sink and a
//! source lets the channel write from the enqueueing thread while a dedicated
//! reader thread blocks on backend output.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout};

/// Outbound half: one request line per call.
pub trait TransportSink: Send + 'static {
    fn send_request(&mut self, line: &str) -> io::Result<()>;
}

/// Inbound half: blocking line reads. `Ok(None)` is end of stream.
pub trait TransportSource: Send + 'static {
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Writer-backed sink (typically the backend's stdin).
pub struct PipeSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> PipeSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> TransportSink for PipeSink<W> {
    fn send_request(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

/// Reader-backed source (typically the backend's stdout).
pub struct PipeSource<R: Read + Send + 'static> {
    reader: BufReader<R>,
}

impl<R: Read + Send + 'static> PipeSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

impl<R: Read + Send + 'static> TransportSource for PipeSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read_n = self.reader.read_line(&mut line)?;
        if read_n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Wire a spawned backend's stdio into transport halves. The child must have
/// been spawned with piped stdin/stdout.
pub fn child_transport(
    child: &mut Child,
) -> io::Result<(PipeSink<ChildStdin>, PipeSource<ChildStdout>)> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "backend stdin is not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "backend stdout is not piped"))?;
    Ok((PipeSink::new(stdin), PipeSource::new(stdout)))
}
