//! The scanner: fixed-capacity buffered reading with sentinel-bounded
//! delimiter search.
//!
//! One [`Scanner`] wraps one readable handle. [`Scanner::getline`] stages
//! input in the arena's working buffer and surrenders it as spans, one
//! record per call in the common case. The design is "infrequent copy": a
//! record is returned in place when it fits; a partial record stranded at
//! the top of the buffer is shifted down and completed by further reads; a
//! record that cannot fit within capacity is delivered as chunks.
//!
//! # Cursors
//! `p` and `q` are offsets into the working buffer with `0 <= p <= q <=
//! bufsz`. `[p, q)` holds buffered bytes not yet surrendered; `[q, bufsz)`
//! is free space; offset `bufsz` is the sentinel byte on the read-only page,
//! always equal to the delimiter. The delimiter search runs over
//! `[start, bufsz]` with no other bound; a hit at or above `q` is stale (or
//! the sentinel) and is discarded.
//!
//! # Hot path
//! After each full line the scanner caches the position of the next
//! delimiter (`peek`). While the cache holds a delimiter strictly inside
//! `[p, q)`, consecutive calls cost one cached compare and one search for
//! the line after next, with no state-machine entry.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use memchr::memchr;

use crate::arena::Arena;
use crate::outcome::{ConfigError, OpenError, ScanOutcome, Span};

/// Environment variable consulted at open when the process has opted in via
/// [`allow_force_bufsz_env`]. A positive integer value no larger than 2^31
/// replaces the `bufsz` argument.
pub const FORCE_BUFSZ_ENV: &str = "LINESCAN_FORCE_BUFSZ";

static ALLOW_FORCE_BUFSZ_ENV: AtomicBool = AtomicBool::new(false);

/// Opts the process in (or out) of the [`FORCE_BUFSZ_ENV`] buffer-size
/// override.
///
/// Off by default. This exists to drive boundary cases (very small buffers)
/// through existing programs under test; leave it off in production.
pub fn allow_force_bufsz_env(allow: bool) {
    ALLOW_FORCE_BUFSZ_ENV.store(allow, Ordering::Relaxed);
}

fn effective_bufsz(requested: usize) -> usize {
    if !ALLOW_FORCE_BUFSZ_ENV.load(Ordering::Relaxed) {
        return requested;
    }
    let Ok(val) = std::env::var(FORCE_BUFSZ_ENV) else {
        return requested;
    };
    match val.trim().parse::<u64>() {
        Ok(n) if n >= 1 && n <= 1 << 31 => n as usize,
        _ => requested,
    }
}

/// Line-oriented scanner over one readable handle.
///
/// Created by [`Scanner::new`], which allocates a page-aligned buffer arena
/// of the requested capacity plus a read-only sentinel page. The scanner
/// borrows the handle conceptually: it never opens, closes, or seeks it.
/// Callers that want to keep ownership pass `&mut R`; dropping the scanner
/// releases the arena and nothing else, and [`Scanner::into_inner`] hands
/// the handle back.
///
/// Returned [`Span`]s alias the working buffer. A span's bytes remain the
/// bytes that were returned until the next `getline` call that does not
/// return [`ScanOutcome::Paused`] (or until drop). With pause enabled, the
/// hold extends across calls until [`Scanner::resume_from_pause`]. The
/// caller may mutate bytes inside a returned span (for example, overwrite
/// the trailing delimiter with a NUL) but must not touch bytes outside it.
///
/// A scanner must not be shared between threads without external
/// serialization; all operations take `&mut self`, so the borrow checker
/// enforces that here.
pub struct Scanner<R> {
    input: R,
    arena: Arena,
    delimiter: u8,
    bufsz: usize,
    min_first_chunk: usize,

    /// First byte not yet surrendered to the caller.
    p: usize,
    /// First byte not yet filled by a read.
    q: usize,
    /// Cached position of the next delimiter; `bufsz` when disarmed.
    peek: usize,

    in_longline: bool,
    longline_ended: bool,
    eof_seen: bool,
    err_seen: bool,
    pending_err: Option<io::Error>,
    pause_on_inval: bool,
    terminate_current_pause: bool,
}

impl<R: Read> Scanner<R> {
    /// Opens a scanner over `input` with a working buffer of `bufsz` bytes
    /// and the given record delimiter.
    ///
    /// Records up to `bufsz` bytes (including the delimiter) are returned
    /// whole; longer records arrive as chunks. The arena is allocated once
    /// and never moves or grows.
    ///
    /// # Errors
    /// [`OpenError::Alloc`] if the arena cannot be allocated,
    /// [`OpenError::Protect`] if the sentinel page cannot be made
    /// read-only.
    ///
    /// # Panics
    /// Panics if the effective buffer capacity is zero.
    pub fn new(input: R, bufsz: usize, delimiter: u8) -> Result<Self, OpenError> {
        let bufsz = effective_bufsz(bufsz);
        assert!(bufsz > 0, "buffer capacity must be at least 1 byte");
        let arena = Arena::new(bufsz, delimiter)?;
        Ok(Self {
            input,
            arena,
            delimiter,
            bufsz,
            min_first_chunk: bufsz,
            p: 0,
            q: 0,
            peek: bufsz,
            in_longline: false,
            longline_ended: false,
            eof_seen: false,
            err_seen: false,
            pending_err: None,
            pause_on_inval: false,
            terminate_current_pause: false,
        })
    }

    /// Consumes the scanner and returns the input handle.
    ///
    /// The arena is released; every previously returned span is dead.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Returns the next record, chunk, or stream condition.
    ///
    /// Exactly one [`ScanOutcome`] per call. Data-bearing outcomes carry a
    /// span into the working buffer; concatenating the bytes behind
    /// data-bearing spans in call order reproduces the input exactly.
    ///
    /// Reads are issued one blocking call per refill and never retried: an
    /// interrupted read surfaces as [`ScanOutcome::Error`] like any other
    /// failure, after buffered records (and the trailing no-delimiter
    /// record, if any) have been drained. Once `EndOfFile` or `Error` has
    /// been returned, every later call returns `EndOfFile` without touching
    /// the input again.
    pub fn getline(&mut self) -> ScanOutcome {
        if self.p <= self.peek && self.peek < self.q {
            debug_assert!(!self.in_longline);
            debug_assert_eq!(self.arena.working()[self.peek], self.delimiter);
            let span = Span::new(self.p, self.peek);
            self.p = self.peek + 1;
            self.peek = self.search(self.p);
            return ScanOutcome::FullLine(span);
        }
        self.getline_slow()
    }

    fn getline_slow(&mut self) -> ScanOutcome {
        // Second step of the two-step long-line termination: the final data
        // chunk went out on the previous call; now the bare end marker.
        if self.longline_ended {
            debug_assert!(self.in_longline);
            self.in_longline = false;
            self.longline_ended = false;
            return ScanOutcome::LongLineEnd;
        }

        // Only a successful full-line return below re-arms the peek cache.
        self.peek = self.bufsz;

        // Inside a long line the pending region is already known to be
        // delimiter-free; start at the sentinel and let a refill set a real
        // scan start.
        let mut scan_from = if self.in_longline { self.bufsz } else { self.p };

        loop {
            let delim = self.search(scan_from);
            let len = self.q - self.p;

            if delim < self.q {
                debug_assert!(delim >= self.p);
                let span = Span::new(self.p, delim);
                self.p = delim + 1;
                if self.in_longline {
                    self.longline_ended = true;
                    return ScanOutcome::LongLineChunk(span);
                }
                self.peek = self.search(self.p);
                return ScanOutcome::FullLine(span);
            }

            if self.eof_seen || self.err_seen {
                if len > 0 {
                    if self.q == self.bufsz {
                        // The tail sits flush against the sentinel.
                        // Returning it as-is would leave the caller no
                        // writable byte after the record, so make headroom:
                        // shift down when that gains space, otherwise hold
                        // back the final byte as a long-line split and
                        // deliver it after a later shift.
                        if self.p > 0 && self.p + self.min_first_chunk > self.bufsz {
                            if self.pause_on_inval && !self.terminate_current_pause {
                                return ScanOutcome::Paused;
                            }
                            self.shift_down();
                            self.terminate_current_pause = false;
                            scan_from = self.bufsz;
                            continue;
                        }
                        if len > 1 {
                            let span = Span::new(self.p, self.q - 2);
                            let started = !self.in_longline;
                            self.in_longline = true;
                            self.p = self.q - 1;
                            return if started {
                                ScanOutcome::LongLineStart(span)
                            } else {
                                ScanOutcome::LongLineChunk(span)
                            };
                        }
                        // One-byte tail with no way to gain headroom; fall
                        // through and return it as-is.
                    }
                    let span = Span::new(self.p, self.q - 1);
                    self.p = self.q;
                    if self.in_longline {
                        self.longline_ended = true;
                        return ScanOutcome::LongLineChunk(span);
                    }
                    return ScanOutcome::FullLineWithoutDelimiter(span);
                }
                if self.in_longline {
                    self.in_longline = false;
                    self.longline_ended = false;
                    return ScanOutcome::LongLineEnd;
                }
                if self.err_seen {
                    // Surface the failure once; the stream then reads as
                    // empty.
                    self.err_seen = false;
                    self.eof_seen = true;
                    let cause = self
                        .pending_err
                        .take()
                        .unwrap_or_else(|| io::Error::other("input read failed"));
                    return ScanOutcome::Error(cause);
                }
                return ScanOutcome::EndOfFile;
            }

            if self.q < self.bufsz {
                scan_from = match self.fill() {
                    Some(pre_q) => pre_q,
                    None => self.bufsz,
                };
                continue;
            }

            if len >= self.min_first_chunk && !self.in_longline {
                // No delimiter reachable within capacity and the pending
                // bytes already satisfy the first-chunk guarantee; begin
                // chunked delivery rather than copying them around.
                let span = Span::new(self.p, self.q - 1);
                self.p = self.q;
                self.in_longline = true;
                return ScanOutcome::LongLineStart(span);
            }

            if len > 0 {
                if self.p > 0 {
                    if self.pause_on_inval && !self.terminate_current_pause {
                        return ScanOutcome::Paused;
                    }
                    self.shift_down();
                    self.terminate_current_pause = false;
                    scan_from = self.bufsz;
                    continue;
                }
                // Buffer saturated with one chunk of an overlong record.
                let span = Span::new(self.p, self.q - 1);
                self.p = self.q;
                if self.in_longline {
                    return ScanOutcome::LongLineChunk(span);
                }
                self.in_longline = true;
                return ScanOutcome::LongLineStart(span);
            }

            // Everything buffered has been surrendered and nothing is free
            // above q; recycle the buffer from the bottom.
            debug_assert_eq!(self.p, self.bufsz);
            if self.pause_on_inval && !self.terminate_current_pause {
                return ScanOutcome::Paused;
            }
            self.p = 0;
            self.q = 0;
            self.terminate_current_pause = false;
            scan_from = self.bufsz;
        }
    }

    /// Position of the first delimiter at or after `from`, up to and
    /// including the sentinel at `bufsz`. Meaningful only when the result is
    /// strictly below `q`; anything at or above is stale free-space content
    /// or the sentinel itself.
    #[inline]
    fn search(&self, from: usize) -> usize {
        match memchr(self.delimiter, self.arena.scan_region(from)) {
            Some(i) => from + i,
            // Unreachable while the sentinel invariant holds; keep the
            // search total regardless.
            None => self.bufsz,
        }
    }

    /// One blocking read into `[q, bufsz)`. Returns the pre-read `q` (the
    /// point the next scan may start from) on success, `None` after
    /// latching end-of-input or a read failure.
    fn fill(&mut self) -> Option<usize> {
        debug_assert!(self.q < self.bufsz);
        let pre_q = self.q;
        let bufsz = self.bufsz;
        match self.input.read(&mut self.arena.working_mut()[pre_q..bufsz]) {
            Ok(0) => {
                self.eof_seen = true;
                None
            }
            Ok(n) => {
                self.q += n;
                debug_assert!(self.q <= bufsz);
                if self.q < bufsz {
                    // Stamp a delimiter just past the data to cut the next
                    // scan short; [q, bufsz) holds nothing the caller can
                    // see.
                    self.arena.working_mut()[self.q] = self.delimiter;
                }
                Some(pre_q)
            }
            Err(err) => {
                self.pending_err = Some(err);
                self.err_seen = true;
                None
            }
        }
    }

    /// Moves `[p, q)` down so that `min_first_chunk` bytes of headroom open
    /// up above the new `p`.
    fn shift_down(&mut self) {
        debug_assert!(self.q > self.p);
        debug_assert_eq!(self.q, self.bufsz);
        debug_assert!(self.p + self.min_first_chunk > self.bufsz);
        let dist = self.p + self.min_first_chunk - self.bufsz;
        self.arena
            .working_mut()
            .copy_within(self.p..self.q, self.p - dist);
        self.p -= dist;
        self.q -= dist;
    }

    /// Resolves a span returned by [`Scanner::getline`] to its bytes.
    ///
    /// # Panics
    /// Panics if the span does not lie within the working buffer.
    #[inline]
    #[must_use]
    pub fn bytes(&self, span: Span) -> &[u8] {
        &self.arena.working()[span.range()]
    }

    /// Mutable access to a returned span, e.g. to overwrite the trailing
    /// delimiter with a NUL. Mutating bytes outside spans the scanner has
    /// returned (and not since invalidated) is a logic error.
    ///
    /// # Panics
    /// Panics if the span does not lie within the working buffer.
    #[inline]
    #[must_use]
    pub fn bytes_mut(&mut self, span: Span) -> &mut [u8] {
        &mut self.arena.working_mut()[span.range()]
    }

    /// Pause instead of invalidating bytes the caller may still hold.
    ///
    /// While enabled, any `getline` call that would shift or recycle the
    /// buffer returns [`ScanOutcome::Paused`] and leaves the buffer
    /// untouched until [`Scanner::resume_from_pause`].
    pub fn enable_pause(&mut self) {
        self.pause_on_inval = true;
    }

    /// Clears pause mode and any pending resume unconditionally.
    pub fn disable_pause(&mut self) {
        self.pause_on_inval = false;
        self.terminate_current_pause = false;
    }

    /// Permits one round of buffer invalidation (a shift or a recycle).
    ///
    /// One-shot: the latch clears as soon as the scanner next overwrites or
    /// shifts buffer contents, after which invalidating operations pause
    /// again until the next resume.
    pub fn resume_from_pause(&mut self) {
        self.terminate_current_pause = true;
    }

    /// Sets the guaranteed minimum length of any full line or first
    /// long-line chunk, for records at least that long.
    ///
    /// The default is the full buffer capacity: the scanner shifts as much
    /// as it must to return any record that can fit in one piece. Lowering
    /// it trades that guarantee for records in `(len, bufsz]` against the
    /// cost of large downward shifts: a pending prefix of at least `len`
    /// bytes is returned as a chunk instead of being copied down.
    ///
    /// # Errors
    /// [`ConfigError::MinFirstChunkOutOfRange`] if `len` is outside
    /// `[1, bufsz]`; the current value is left unchanged.
    pub fn set_min_first_chunk(&mut self, len: usize) -> Result<(), ConfigError> {
        if len == 0 || len > self.bufsz {
            return Err(ConfigError::MinFirstChunkOutOfRange {
                len,
                bufsz: self.bufsz,
            });
        }
        self.min_first_chunk = len;
        Ok(())
    }

    /// Current minimum first-chunk length.
    #[inline]
    #[must_use]
    pub fn min_first_chunk(&self) -> usize {
        self.min_first_chunk
    }

    /// Working buffer capacity in bytes (after any environment override).
    #[inline]
    #[must_use]
    pub fn buf_size(&self) -> usize {
        self.bufsz
    }

    /// The record delimiter this scanner was opened with.
    #[inline]
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}
