//! Random delimited-record generator for stress runs and tests.
//!
//! Produces a deterministic stream of records from a seed: `count` records
//! with lengths drawn uniformly from `[min_len, max_len]`, bytes drawn from
//! a configurable alphabet that must not contain the delimiter. The final
//! delimiter can be suppressed to exercise the no-trailing-delimiter tail
//! path of the scanner.
//!
//! Invariants:
//! - Output is a pure function of `(seed, config)`.
//! - Record payload bytes never equal the delimiter.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::rng::GenRng;

/// RFC 4648 base-64 alphabet, the default record payload alphabet.
pub const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Configuration for generating a record stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenConfig {
    /// Number of records to emit.
    pub count: u32,
    /// Minimum record payload length (excluding the delimiter).
    pub min_len: u32,
    /// Maximum record payload length (excluding the delimiter).
    pub max_len: u32,
    /// Record delimiter byte.
    pub delimiter: u8,
    /// Payload alphabet; must be non-empty and delimiter-free.
    pub alphabet: Vec<u8>,
    /// When false, the last record's delimiter is suppressed.
    pub final_delimiter: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            min_len: 0,
            max_len: 80,
            delimiter: b'\n',
            alphabet: BASE64_ALPHABET.to_vec(),
            final_delimiter: true,
        }
    }
}

impl GenConfig {
    /// Validate configuration invariants, returning a human-readable error.
    fn validate(&self) -> Result<(), String> {
        if self.min_len > self.max_len {
            return Err("min_len must be <= max_len".to_string());
        }
        if self.alphabet.is_empty() {
            return Err("alphabet must be non-empty".to_string());
        }
        if self.alphabet.contains(&self.delimiter) {
            return Err("alphabet must not contain the delimiter".to_string());
        }
        Ok(())
    }
}

/// Streaming record generator; one record per [`LineGen::next_record`] call.
#[derive(Clone, Debug)]
pub struct LineGen {
    rng: GenRng,
    cfg: GenConfig,
    remaining: u32,
}

impl LineGen {
    /// Create a generator, validating the configuration.
    pub fn new(seed: u64, cfg: GenConfig) -> Result<Self, String> {
        cfg.validate()?;
        let remaining = cfg.count;
        Ok(Self {
            rng: GenRng::new(seed),
            cfg,
            remaining,
        })
    }

    /// Fills `buf` with the next record (payload plus delimiter, unless this
    /// is the final record and the trailing delimiter is suppressed).
    /// Returns false when all records have been emitted; `buf` is left
    /// empty in that case.
    pub fn next_record(&mut self, buf: &mut Vec<u8>) -> bool {
        buf.clear();
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;

        let len = self.rng.record_len(self.cfg.min_len, self.cfg.max_len);
        buf.reserve(len as usize + 1);
        for _ in 0..len {
            buf.push(self.rng.pick(&self.cfg.alphabet));
        }
        if self.remaining > 0 || self.cfg.final_delimiter {
            buf.push(self.cfg.delimiter);
        }
        true
    }

    /// Writes every remaining record to `w`.
    pub fn write_all<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        let mut record = Vec::new();
        while self.next_record(&mut record) {
            w.write_all(&record)?;
        }
        Ok(())
    }
}

/// Generates the whole stream into one buffer. Convenience for tests.
pub fn generate(seed: u64, cfg: GenConfig) -> Result<Vec<u8>, String> {
    let mut lg = LineGen::new(seed, cfg)?;
    let mut out = Vec::new();
    let mut record = Vec::new();
    while lg.next_record(&mut record) {
        out.extend_from_slice(&record);
    }
    Ok(out)
}
