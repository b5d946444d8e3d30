//! Fuzz target for getline reassembly and long-line sequencing.
//!
//! The invariant under test: for any payload, buffer size, and delimiter,
//! concatenating the bytes of every data-bearing outcome in call order
//! reproduces the payload exactly, long-line markers bracket correctly, and
//! the stream terminates in end-of-file.
//!
//! # Input Format
//!
//! The first byte selects the buffer size (1..=64), the second selects the
//! delimiter, and the rest is the payload.
//!
//! # Running
//!
//! ```bash
//! cargo install cargo-fuzz
//! cargo +nightly fuzz run fuzz_getline_reassembly
//! cargo +nightly fuzz run fuzz_getline_reassembly -- -max_len=4096
//! ```

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use linescan::{ScanOutcome, Scanner};

fuzz_target!(|data: &[u8]| {
    let [bufsz_sel, delimiter, payload @ ..] = data else {
        return;
    };
    let bufsz = 1 + (*bufsz_sel as usize) % 64;

    let mut scanner = match Scanner::new(Cursor::new(payload.to_vec()), bufsz, *delimiter) {
        Ok(sc) => sc,
        Err(_) => return,
    };

    let mut reassembled = Vec::with_capacity(payload.len());
    let mut long_line_open = false;
    let call_cap = 8 * (payload.len() + 2) + 4 * bufsz + 64;

    for _ in 0..call_cap {
        match scanner.getline() {
            ScanOutcome::FullLine(span) => {
                assert!(!long_line_open);
                let bytes = scanner.bytes(span);
                assert_eq!(*bytes.last().unwrap(), *delimiter);
                reassembled.extend_from_slice(bytes);
            }
            ScanOutcome::FullLineWithoutDelimiter(span) => {
                assert!(!long_line_open);
                let bytes = scanner.bytes(span);
                assert!(!bytes.contains(delimiter));
                reassembled.extend_from_slice(bytes);
            }
            ScanOutcome::LongLineStart(span) => {
                assert!(!long_line_open);
                long_line_open = true;
                reassembled.extend_from_slice(scanner.bytes(span));
            }
            ScanOutcome::LongLineChunk(span) => {
                assert!(long_line_open);
                reassembled.extend_from_slice(scanner.bytes(span));
            }
            ScanOutcome::LongLineEnd => {
                assert!(long_line_open);
                long_line_open = false;
            }
            ScanOutcome::Paused => unreachable!("pause disabled"),
            ScanOutcome::Error(err) => panic!("cursor read failed: {err}"),
            ScanOutcome::EndOfFile => {
                assert!(!long_line_open);
                assert_eq!(reassembled, payload);
                return;
            }
        }
    }
    panic!("scanner did not terminate within {call_cap} calls");
});
