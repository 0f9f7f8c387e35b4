#![no_main]
use jdelta::format::{Span, Trailer, decode_all, encode_spans};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Build an arbitrary span list from the input: each control byte picks
    // Copy or Insert and a length. Copy offsets may go backwards but never
    // before the start of old.
    let mut spans = Vec::new();
    let mut copy_end = 0i64;
    let mut rest = data;
    while let [ctl, tail @ ..] = rest {
        let len = (*ctl >> 1) as usize + 1;
        if ctl & 1 == 0 {
            let offset = (*ctl as i64 - 128).max(-copy_end);
            copy_end += offset + len as i64;
            spans.push(Span::Copy {
                offset,
                len: len as u64,
            });
            rest = tail;
        } else {
            let take = len.min(tail.len());
            spans.push(Span::Insert {
                bytes: tail[..take].to_vec(),
            });
            rest = &tail[take..];
        }
    }

    let trailer = Trailer::of(data);
    let patch = encode_spans(&spans, trailer).unwrap();
    let decoded = decode_all(&patch).unwrap();
    let expected: Vec<Span> = spans.into_iter().filter(|s| !s.is_empty()).collect();
    assert_eq!(decoded.instructions, expected);
    assert_eq!(decoded.trailer, trailer);
});
