#![no_main]
use jdelta::cursor::SliceCursor;
use jdelta::engine;
use jdelta::format::decode_all;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    let _ = decode_all(data);

    // Also apply against a non-empty old.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, patch) = data.split_at(split);
        let _ = engine::apply_to(SliceCursor::new(old), patch, Vec::new());
    }
});
