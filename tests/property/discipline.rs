//! Read-call discipline: refills are proportional to fills plus records,
//! and a finished stream is never read again.

use std::cell::Cell;
use std::io::{Cursor, Read};
use std::rc::Rc;

use proptest::prelude::*;

use linescan::{ScanOutcome, Scanner};

use crate::support::{build_input, DELIM};

/// Counts reads passed through to an inner reader via a shared counter.
struct CountingReader<R> {
    inner: R,
    reads: Rc<Cell<usize>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(buf)
    }
}

fn records() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(
            any::<u8>().prop_map(|b| if b == DELIM { b'a' } else { b }),
            0..40,
        ),
        0..8,
    )
}

proptest! {
    #[test]
    fn read_count_is_bounded_and_stops_at_end(
        records in records(),
        trailing in any::<bool>(),
        bufsz in 1usize..=24,
    ) {
        let input = build_input(&records, trailing);
        let reads = Rc::new(Cell::new(0usize));
        let reader = CountingReader {
            inner: Cursor::new(input.clone()),
            reads: Rc::clone(&reads),
        };
        let mut sc = Scanner::new(reader, bufsz, DELIM).unwrap();

        let mut results = 0usize;
        let cap = 8 * (input.len() + 2) + 64;
        for _ in 0..cap {
            match sc.getline() {
                ScanOutcome::EndOfFile => break,
                ScanOutcome::Error(err) => panic!("unexpected read error: {err}"),
                ScanOutcome::Paused => panic!("paused while pause mode off"),
                _ => results += 1,
            }
        }

        // A cursor-backed source satisfies every refill in one call, so the
        // scanner needs at most a couple of reads per produced result plus
        // the final empty read, and never more than one read per input byte.
        let reads_at_end = reads.get();
        prop_assert!(
            reads_at_end <= 2 * (results + 2),
            "reads {} vs results {}",
            reads_at_end,
            results
        );
        prop_assert!(reads_at_end <= input.len() + 2);

        // A finished stream is never read again.
        for _ in 0..3 {
            prop_assert!(matches!(sc.getline(), ScanOutcome::EndOfFile));
        }
        prop_assert_eq!(reads.get(), reads_at_end);
    }
}

/// Reader that returns a few bytes per call, then an injected failure.
struct FlakyReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    fail_after: usize,
}

impl Read for FlakyReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let avail_end = self.fail_after.min(self.data.len());
        if self.pos >= avail_end {
            if self.fail_after < self.data.len() {
                return Err(std::io::Error::other("injected"));
            }
            return Ok(0);
        }
        let n = (avail_end - self.pos).min(self.chunk).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

proptest! {
    #[test]
    fn errors_surface_once_after_buffered_data_drains(
        records in records(),
        bufsz in 1usize..=16,
        chunk in 1usize..=8,
        fail_after in 0usize..=64,
    ) {
        let input = build_input(&records, true);
        let reader = FlakyReader {
            data: input.clone(),
            pos: 0,
            chunk,
            fail_after,
        };
        let mut sc = Scanner::new(reader, bufsz, DELIM).unwrap();

        let mut delivered = Vec::new();
        let mut errors = 0usize;
        let cap = 8 * (input.len() + 2) + 64;
        for _ in 0..cap {
            match sc.getline() {
                ScanOutcome::EndOfFile => break,
                ScanOutcome::Error(_) => errors += 1,
                ScanOutcome::Paused => panic!("paused while pause mode off"),
                outcome => {
                    if let Some(span) = outcome.span() {
                        delivered.extend_from_slice(sc.bytes(span));
                    }
                }
            }
        }

        if fail_after >= input.len() {
            // The failure sits past the end of the data; the stream ends
            // cleanly first.
            prop_assert_eq!(errors, 0);
            prop_assert_eq!(delivered, input);
        } else {
            // Everything the scanner read before the failure is delivered,
            // and the failure is reported exactly once.
            prop_assert_eq!(errors, 1);
            prop_assert_eq!(&input[..fail_after], &delivered[..]);
            // After the error, the stream reads as empty.
            for _ in 0..3 {
                prop_assert!(matches!(sc.getline(), ScanOutcome::EndOfFile));
            }
        }
    }
}
