// Patch encoder: serializes spans as they are produced.
//
// Output is written record by record, so the encoder never holds more than
// one literal payload. Degenerate spans are normalized on the way out:
// empty Inserts are dropped and the offset of an empty Copy is folded into
// the next Copy, keeping the offset chain intact.

use std::io::{self, Write};

use super::opcode::{self, Kind, OP_END};
use super::span::Span;
use super::trailer::Trailer;
use super::varint::{self, MAX_VARINT_LEN};

// ---------------------------------------------------------------------------
// Stream encoder
// ---------------------------------------------------------------------------

/// Writes a patch to a `Write` sink.
///
/// Call [`write_span`](Self::write_span) for each span in order, then
/// [`finish`](Self::finish) with the trailer of the new sequence.
pub struct PatchEncoder<W: Write> {
    writer: W,
    /// Offset of dropped zero-length Copies, owed to the next Copy.
    carry: i64,
    instructions: u64,
    bytes_written: u64,
}

impl<W: Write> PatchEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            carry: 0,
            instructions: 0,
            bytes_written: 0,
        }
    }

    /// Serialize one span.
    pub fn write_span(&mut self, span: &Span) -> io::Result<()> {
        match span {
            Span::Copy { len: 0, offset } => {
                self.carry = self.carry.wrapping_add(*offset);
                Ok(())
            }
            Span::Copy { offset, len } => {
                let offset = offset.wrapping_add(std::mem::take(&mut self.carry));
                let mut head = [0u8; 1 + 2 * MAX_VARINT_LEN];
                let mut n = self.put_opcode(&mut head, Kind::Copy, *len);
                n += encode_into(&mut head[n..], varint::zigzag_encode(offset));
                if head[0] >> 1 == opcode::LEN_FOLLOWS {
                    n += encode_into(&mut head[n..], *len);
                }
                self.emit(&head[..n])
            }
            Span::Insert { bytes } if bytes.is_empty() => Ok(()),
            Span::Insert { bytes } => {
                let mut head = [0u8; 1 + MAX_VARINT_LEN];
                let len = bytes.len() as u64;
                let mut n = self.put_opcode(&mut head, Kind::Insert, len);
                if head[0] >> 1 == opcode::LEN_FOLLOWS {
                    n += encode_into(&mut head[n..], len);
                }
                self.emit(&head[..n])?;
                self.emit(bytes)
            }
        }
    }

    /// Write the end marker and trailer, flush, and return the sink.
    pub fn finish(mut self, trailer: Trailer) -> io::Result<W> {
        self.emit(&[OP_END])?;
        self.emit(&trailer.to_bytes())?;
        self.writer.flush()?;
        log::trace!(
            "encoded {} instructions, {} bytes",
            self.instructions,
            self.bytes_written
        );
        Ok(self.writer)
    }

    /// Number of records written so far.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Number of patch bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn put_opcode(&mut self, head: &mut [u8], kind: Kind, len: u64) -> usize {
        head[0] = opcode::encode(kind, len).0;
        self.instructions += 1;
        1
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

fn encode_into(out: &mut [u8], value: u64) -> usize {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = varint::encode_u64(value, &mut buf);
    out[..len].copy_from_slice(&buf[..len]);
    len
}

// ---------------------------------------------------------------------------
// In-memory convenience
// ---------------------------------------------------------------------------

/// Encode a complete span list into `writer`, returning it after the
/// trailer has been written.
pub fn write_spans<'a, I, W>(spans: I, trailer: Trailer, writer: W) -> io::Result<W>
where
    I: IntoIterator<Item = &'a Span>,
    W: Write,
{
    let mut enc = PatchEncoder::new(writer);
    for span in spans {
        enc.write_span(span)?;
    }
    enc.finish(trailer)
}

/// Encode a complete span list into a patch buffer.
pub fn encode_spans<'a, I>(spans: I, trailer: Trailer) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Span>,
{
    write_spans(spans, trailer, Vec::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
