// Patch format: instruction records, varints and the trailer.
//
// Layout (all integers little-endian):
//
//   record*  0x00  length:u64  crc32:u32
//
// Each record starts with an opcode byte: bit 0 is the kind (0 = Copy,
// 1 = Insert), bits 1..7 an inline length 1..=126 or 127 for "length
// follows as a varint". Copy records carry a zig-zag varint offset
// relative to the end of the previous Copy's source range.
//
// # Modules
//
// - `span`     Copy/Insert spans and copy-offset resolution
// - `varint`   Base-128 (LEB128) and zig-zag integers
// - `opcode`   Opcode byte packing
// - `trailer`  Length + CRC-32 footer
// - `encoder`  Span serialization
// - `decoder`  Streaming record parser

pub mod decoder;
pub mod encoder;
pub mod opcode;
pub mod span;
pub mod trailer;
pub mod varint;

pub use decoder::{DecodeError, DecodedPatch, MAX_LITERAL_LEN, Malformed, PatchDecoder, decode_all};
pub use encoder::{PatchEncoder, encode_spans, write_spans};
pub use span::{CopyTracker, Instruction, Span};
pub use trailer::{TRAILER_LEN, Trailer};
