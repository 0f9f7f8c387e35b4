// Threaded I/O adapters.
//
// The diff and apply loops are single-threaded; these adapters move the
// blocking reads and writes onto helper threads connected by bounded
// channels, so disk or pipe latency overlaps with matching. A full channel
// blocks the producer, which bounds memory to `depth` chunks per adapter.
//
//   reader thread ──chunks──▶ ReadAhead (Read)
//   WriteBehind (Write) ──chunks──▶ writer thread ──▶ sink

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

/// Default chunk size moved per channel message (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default number of chunks buffered in each channel.
pub const DEFAULT_DEPTH: usize = 4;

// ---------------------------------------------------------------------------
// Read-ahead
// ---------------------------------------------------------------------------

enum ReadMessage {
    Data(Vec<u8>),
    Error(io::Error),
    Eof,
}

/// `Read` adapter fed by a background reader thread.
pub struct ReadAhead {
    receiver: Receiver<ReadMessage>,
    current: Vec<u8>,
    pos: usize,
    finished: bool,
    // Detached on drop: a reader blocked on a pipe must not hold up the
    // caller.
    _handle: JoinHandle<()>,
}

impl ReadAhead {
    /// Spawn a thread reading `reader` in `chunk_size` pieces, keeping up to
    /// `depth` chunks queued.
    pub fn spawn<R>(reader: R, chunk_size: usize, depth: usize) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(depth.max(1));
        let chunk_size = chunk_size.max(1);
        let handle = thread::Builder::new()
            .name("jdelta-read-ahead".into())
            .spawn(move || reader_thread_main(reader, sender, chunk_size))?;
        Ok(Self {
            receiver,
            current: Vec::new(),
            pos: 0,
            finished: false,
            _handle: handle,
        })
    }
}

fn reader_thread_main<R: Read>(mut reader: R, sender: SyncSender<ReadMessage>, chunk_size: usize) {
    loop {
        let mut buf = vec![0u8; chunk_size];
        let msg = match reader.read(&mut buf) {
            Ok(0) => ReadMessage::Eof,
            Ok(n) => {
                buf.truncate(n);
                ReadMessage::Data(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => ReadMessage::Error(e),
        };
        let last = !matches!(msg, ReadMessage::Data(_));
        // A closed channel means the consumer went away.
        if sender.send(msg).is_err() || last {
            return;
        }
    }
}

impl Read for ReadAhead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.current.len() {
            if self.finished {
                return Ok(0);
            }
            match self.receiver.recv() {
                Ok(ReadMessage::Data(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(ReadMessage::Eof) => self.finished = true,
                Ok(ReadMessage::Error(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                Err(_) => {
                    self.finished = true;
                    return Err(io::Error::other("read-ahead thread exited unexpectedly"));
                }
            }
        }
        let n = buf.len().min(self.current.len() - self.pos);
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Write-behind
// ---------------------------------------------------------------------------

/// `Write` adapter draining into a sink on a background thread.
///
/// Call [`finish`](Self::finish) to flush and get the sink back; dropping
/// without `finish` waits for queued writes and discards the sink.
pub struct WriteBehind<W: Write + Send + 'static> {
    sender: Option<SyncSender<Vec<u8>>>,
    handle: Option<JoinHandle<io::Result<W>>>,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl<W: Write + Send + 'static> WriteBehind<W> {
    pub fn spawn(sink: W, chunk_size: usize, depth: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(depth.max(1));
        let chunk_size = chunk_size.max(1);
        let handle = thread::Builder::new()
            .name("jdelta-write-behind".into())
            .spawn(move || writer_thread_main(sink, receiver))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
        })
    }

    /// Send the remaining data, wait for the writer, and return the sink.
    /// The first write error from the writer thread is returned here.
    pub fn finish(mut self) -> io::Result<W> {
        self.send_buffered()?;
        self.sender = None;
        self.join()
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size));
        let sent = match &self.sender {
            Some(sender) => sender.send(chunk).is_ok(),
            None => false,
        };
        if sent {
            Ok(())
        } else {
            // The writer stopped early; its result says why.
            self.sender = None;
            match self.join() {
                Ok(_) => Err(io::Error::other("write-behind thread stopped")),
                Err(e) => Err(e),
            }
        }
    }

    fn join(&mut self) -> io::Result<W> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("write-behind thread panicked"))),
            None => Err(io::Error::other("write-behind thread already joined")),
        }
    }
}

fn writer_thread_main<W: Write>(mut sink: W, receiver: Receiver<Vec<u8>>) -> io::Result<W> {
    for chunk in receiver {
        sink.write_all(&chunk)?;
    }
    sink.flush()?;
    Ok(sink)
}

impl<W: Write + Send + 'static> Write for WriteBehind<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(n)
    }

    /// Hands buffered data to the writer thread. Durability is only
    /// guaranteed by [`finish`](WriteBehind::finish).
    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

impl<W: Write + Send + 'static> Drop for WriteBehind<W> {
    fn drop(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
