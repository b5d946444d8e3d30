//! Random record generator CLI.
//!
//! Emits `--count` records of length in `[--min-len, --max-len]` over the
//! RFC 4648 base-64 alphabet to stdout, delimited by newline (or NUL with
//! `--delim nul`). `--no-final-delim` suppresses the very last delimiter to
//! produce a stream that does not end on a record boundary.
//!
//! ```bash
//! linegen --count 1000000 --min-len 0 --max-len 120 --seed 7 | linecat
//! ```

use std::io::{self, BufWriter, Write};
use std::process;

use linescan::gen::{GenConfig, LineGen};

struct Args {
    count: u32,
    min_len: u32,
    max_len: u32,
    seed: u64,
    delimiter: u8,
    final_delimiter: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: linegen [--count N] [--min-len N] [--max-len N] [--seed N] \
         [--delim nl|nul|BYTE] [--no-final-delim]"
    );
    process::exit(2);
}

fn parse_delim(s: &str) -> Option<u8> {
    match s {
        "nl" => Some(b'\n'),
        "nul" => Some(0),
        _ => {
            let bytes = s.as_bytes();
            if bytes.len() == 1 {
                Some(bytes[0])
            } else {
                s.parse::<u8>().ok()
            }
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args {
        count: 1000,
        min_len: 0,
        max_len: 80,
        seed: 1,
        delimiter: b'\n',
        final_delimiter: true,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--count" => args.count = parse_or_usage(it.next()),
            "--min-len" => args.min_len = parse_or_usage(it.next()),
            "--max-len" => args.max_len = parse_or_usage(it.next()),
            "--seed" => args.seed = parse_or_usage(it.next()),
            "--delim" => {
                args.delimiter = it.next().as_deref().and_then(parse_delim).unwrap_or_else(|| {
                    eprintln!("linegen: bad --delim value");
                    usage()
                });
            }
            "--no-final-delim" => args.final_delimiter = false,
            "--help" | "-h" => usage(),
            other => {
                eprintln!("linegen: unknown argument {other}");
                usage();
            }
        }
    }
    args
}

fn parse_or_usage<T: std::str::FromStr>(val: Option<String>) -> T {
    match val.and_then(|v| v.parse().ok()) {
        Some(v) => v,
        None => usage(),
    }
}

fn main() {
    let args = parse_args();

    let cfg = GenConfig {
        count: args.count,
        min_len: args.min_len,
        max_len: args.max_len,
        delimiter: args.delimiter,
        final_delimiter: args.final_delimiter,
        ..GenConfig::default()
    };
    let mut lg = match LineGen::new(args.seed, cfg) {
        Ok(lg) => lg,
        Err(msg) => {
            eprintln!("linegen: {msg}");
            process::exit(2);
        }
    };

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);
    if let Err(err) = lg.write_all(&mut out).and_then(|()| out.flush()) {
        eprintln!("linegen: write failed: {err}");
        process::exit(1);
    }
}
