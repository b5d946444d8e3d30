//! Line-oriented input scanner with a fixed-capacity buffer and
//! sentinel-bounded delimiter search.
//!
//! The scanner reads bytes from an already-open handle and yields records
//! delimited by a single configurable byte, optimized for:
//! - Predictable memory: one page-aligned arena per stream, allocated at
//!   open, never grown or moved.
//! - Cheap records: a vectorized byte search bounded only by a read-only
//!   sentinel page stamped with the delimiter, so no per-scan length math.
//! - Pathological inputs: records longer than the buffer are delivered as
//!   bounded chunks instead of growing anything.
//!
//! High-level flow per [`Scanner::getline`] call:
//! 1) Fast path: a cached delimiter position turns runs of short records in
//!    one buffer fill into a compare and a span.
//! 2) Otherwise classify the buffered state, refilling from the handle,
//!    shifting a stranded partial record downward, or entering chunked
//!    long-line delivery as needed.
//! 3) Return exactly one tagged outcome; errors and end-of-input are
//!    outcomes too, never panics.
//!
//! Callers that need returned bytes to outlive further scanning enable the
//! pause protocol: the scanner then refuses to overwrite unconsumed bytes
//! (returning [`ScanOutcome::Paused`]) until resumed.
//!
//! The [`gen`] module and the `linegen`/`linecat` binaries form the stress
//! harness: a deterministic record generator and a copy-through driver.

pub mod gen;
pub mod rng;

mod arena;
mod outcome;
mod scanner;

pub use outcome::{ConfigError, OpenError, ScanOutcome, Span};
pub use scanner::{allow_force_bufsz_env, Scanner, FORCE_BUFSZ_ENV};
