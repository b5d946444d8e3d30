//! Randomized structural invariants: delimiter fidelity, exact stream
//! reassembly, long-line sequencing, the first-chunk guarantee, and
//! termination.

use proptest::prelude::*;

use crate::support::{build_input, data_concat, run_bytes, RunLog, Tag, Termination, DELIM};

/// Record payloads over arbitrary bytes with the delimiter mapped away.
fn records() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(
            any::<u8>().prop_map(|b| if b == DELIM { b'x' } else { b }),
            0..48,
        ),
        0..10,
    )
}

fn buffer_sizes() -> impl Strategy<Value = usize> {
    prop_oneof![
        4 => 1usize..=16,
        1 => Just(64usize),
        1 => Just(256usize),
    ]
}

/// Structural oracle over a completed run.
fn check_invariants(log: &RunLog, input: &[u8], min_first_chunk: usize) {
    // Exact reassembly, in call order.
    assert_eq!(data_concat(log), input, "stream reassembly mismatch");

    // Termination is a single terminal condition (the driver stops there).
    assert_eq!(log.termination, Termination::Eof);

    let mut long_line_open = false;
    let mut tails_seen = 0usize;
    for (i, step) in log.steps.iter().enumerate() {
        let is_last = i + 1 == log.steps.len();
        match step.tag {
            Tag::Full => {
                assert!(!long_line_open, "full line inside a long line");
                assert_eq!(*step.bytes.last().unwrap(), DELIM, "full line must end on the delimiter");
                assert!(
                    !step.bytes[..step.bytes.len() - 1].contains(&DELIM),
                    "delimiter inside a full line"
                );
            }
            Tag::FullNoDelim => {
                assert!(!long_line_open, "tail inside a long line");
                assert!(!step.bytes.contains(&DELIM), "delimiter inside a no-delimiter tail");
                assert!(is_last, "no-delimiter tail must be the final data result");
                tails_seen += 1;
            }
            Tag::Start => {
                assert!(!long_line_open, "nested long line start");
                assert!(!step.bytes.contains(&DELIM), "delimiter inside a start chunk");
                assert!(
                    step.bytes.len() >= min_first_chunk,
                    "start chunk shorter than the first-chunk guarantee: {} < {}",
                    step.bytes.len(),
                    min_first_chunk
                );
                long_line_open = true;
            }
            Tag::Chunk => {
                assert!(long_line_open, "chunk outside a long line");
                assert!(!step.bytes.is_empty(), "empty chunk");
                // The delimiter may appear only as the chunk's final byte
                // (the chunk that closes the record).
                assert!(
                    !step.bytes[..step.bytes.len() - 1].contains(&DELIM),
                    "delimiter inside a chunk"
                );
            }
            Tag::End => {
                assert!(long_line_open, "end marker without a long line");
                assert!(step.bytes.is_empty(), "end marker carrying data");
                long_line_open = false;
            }
        }
    }
    assert!(!long_line_open, "long line left unterminated");
    assert!(tails_seen <= 1, "more than one no-delimiter tail");
}

proptest! {
    #[test]
    fn invariants_hold_for_random_streams(
        records in records(),
        trailing in any::<bool>(),
        bufsz in buffer_sizes(),
    ) {
        let input = build_input(&records, trailing);
        let log = run_bytes(&input, bufsz, None, false);
        check_invariants(&log, &input, bufsz);
    }

    #[test]
    fn invariants_hold_with_lowered_min_first_chunk(
        records in records(),
        trailing in any::<bool>(),
        bufsz in buffer_sizes(),
        min_seed in 1usize..=16,
    ) {
        let input = build_input(&records, trailing);
        let min_first_chunk = min_seed.min(bufsz);
        let log = run_bytes(&input, bufsz, Some(min_first_chunk), false);
        check_invariants(&log, &input, min_first_chunk);
    }

    #[test]
    fn invariants_hold_under_the_pause_protocol(
        records in records(),
        trailing in any::<bool>(),
        bufsz in buffer_sizes(),
    ) {
        let input = build_input(&records, trailing);
        // The driver asserts pause safety inline and resumes each time.
        let log = run_bytes(&input, bufsz, None, true);
        check_invariants(&log, &input, bufsz);
        // Each pause precedes one invalidating action; they cannot outnumber
        // the produced results by more than the final recycle.
        prop_assert!(log.pauses <= log.steps.len() + 2);
    }
}
