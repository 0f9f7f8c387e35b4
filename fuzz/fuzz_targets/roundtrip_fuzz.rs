#![no_main]
use jdelta::config::{Config, config_for_level};
use jdelta::{apply, diff};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let level = (data[0] % 10) as u32;
    let split = 2 + (data[1] as usize % (data.len() - 2));
    let old = &data[2..split];
    let new = &data[split..];

    let patch = diff(old, new, &config_for_level(level)).unwrap();
    assert_eq!(apply(old, &patch).unwrap(), new);

    // Tiny windows and literal caps exercise the search boundaries.
    let config = Config {
        anchor_length: 1 + (data[0] as usize % 12),
        search_window: 1 + (data[1] as usize % 64),
        max_insert_len: 1 + (data[0] as usize % 7),
        ..Config::default()
    };
    let patch = diff(old, new, &config).unwrap();
    assert_eq!(apply(old, &patch).unwrap(), new);
});
