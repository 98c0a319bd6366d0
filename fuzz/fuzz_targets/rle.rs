#![no_main]

//! Fuzz target for the 24-bit run-length codec.
//!
//! Decodes arbitrary command streams and checks that encoding arbitrary
//! frames is lossless.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RleInput {
    width: u8,
    height: u8,
    data: Vec<u8>,
    test_mode: RleTestMode,
}

#[derive(Arbitrary, Debug)]
enum RleTestMode {
    /// Decode untrusted bytes
    Decode,
    /// Treat the bytes as pixels and round-trip them
    Roundtrip,
}

fuzz_target!(|input: RleInput| {
    let width = input.width.max(1) as usize;
    let height = input.height.max(1) as usize;

    match input.test_mode {
        RleTestMode::Decode => {
            if let Ok(bgr) = easyavi::rle::decode(&input.data, width, height) {
                assert_eq!(bgr.len(), width * height * 3);
            }
        }
        RleTestMode::Roundtrip => {
            let needed = width * height * 3;
            if input.data.len() < needed {
                return;
            }
            let bgr = &input.data[..needed];
            let encoded = easyavi::rle::encode(bgr, width, height);
            assert_eq!(encoded.len() % 2, 0);
            let decoded = easyavi::rle::decode(&encoded, width, height).unwrap();
            assert_eq!(decoded, bgr);
        }
    }
});
