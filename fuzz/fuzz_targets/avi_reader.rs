#![no_main]

//! Fuzz target for AVI parsing.
//!
//! Feeds arbitrary bytes to the reader and decodes every indexed frame.

use libfuzzer_sys::fuzz_target;

/// Skip frames whose decoded size would dominate the run
const MAX_PIXELS: u64 = 1 << 20;

fuzz_target!(|data: &[u8]| {
    // Limit input size
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(reader) = easyavi::AviReader::new(data) else {
        return;
    };

    let _ = reader.header().frame_rate();
    let _ = reader.stream().compression();

    let format = &reader.stream().video_format;
    let pixels = format.width.unsigned_abs() as u64 * format.abs_height() as u64;
    if pixels > MAX_PIXELS {
        return;
    }

    // Limit iterations to prevent DoS
    for n in 0..reader.frame_count().min(64) {
        if reader.frame_data(n).is_ok() {
            let _ = reader.decode_frame(n);
        }
    }
});
