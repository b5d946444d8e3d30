//! Stress driver: copy stdin to stdout one record at a time.
//!
//! Every byte flows through the scanner and back out, so diffing the output
//! against the input checks record reassembly end to end:
//!
//! ```bash
//! linegen --count 100000 --seed 3 > in.txt
//! linecat < in.txt > out.txt
//! cmp in.txt out.txt
//! ```
//!
//! Exits 0 on success and 1 on an input or output failure.

use std::io::{self, BufWriter, Write};
use std::process;

use linescan::{allow_force_bufsz_env, ScanOutcome, Scanner};

struct Args {
    bufsz: usize,
    delimiter: u8,
    min_first_chunk: Option<usize>,
    allow_bufsz_env: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: linecat [--bufsz N] [--delim nl|nul|BYTE] [--min-first-chunk N] \
         [--allow-bufsz-env]"
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
        bufsz: 64 * 1024,
        delimiter: b'\n',
        min_first_chunk: None,
        allow_bufsz_env: false,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bufsz" => {
                args.bufsz = match it.next().and_then(|v| v.parse().ok()) {
                    Some(n) if n > 0 => n,
                    _ => usage(),
                }
            }
            "--delim" => {
                args.delimiter = it.next().as_deref().and_then(parse_delim).unwrap_or_else(|| {
                    eprintln!("linecat: bad --delim value");
                    usage()
                });
            }
            "--min-first-chunk" => {
                args.min_first_chunk = match it.next().and_then(|v| v.parse().ok()) {
                    Some(n) => Some(n),
                    None => usage(),
                }
            }
            "--allow-bufsz-env" => args.allow_bufsz_env = true,
            "--help" | "-h" => usage(),
            other => {
                eprintln!("linecat: unknown argument {other}");
                usage();
            }
        }
    }
    args
}

fn run(args: &Args) -> io::Result<()> {
    let stdin = io::stdin().lock();
    let mut scanner = match Scanner::new(stdin, args.bufsz, args.delimiter) {
        Ok(sc) => sc,
        Err(err) => return Err(io::Error::other(err.to_string())),
    };
    if let Some(len) = args.min_first_chunk {
        if let Err(err) = scanner.set_min_first_chunk(len) {
            return Err(io::Error::other(err.to_string()));
        }
    }

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);

    loop {
        match scanner.getline() {
            ScanOutcome::FullLine(span)
            | ScanOutcome::FullLineWithoutDelimiter(span)
            | ScanOutcome::LongLineStart(span)
            | ScanOutcome::LongLineChunk(span) => out.write_all(scanner.bytes(span))?,
            ScanOutcome::LongLineEnd => {}
            // Pause mode is never enabled here.
            ScanOutcome::Paused => unreachable!("pause disabled"),
            ScanOutcome::EndOfFile => break,
            ScanOutcome::Error(err) => return Err(err),
        }
    }
    out.flush()
}

fn main() {
    let args = parse_args();
    if args.allow_bufsz_env {
        allow_force_bufsz_env(true);
    }
    if let Err(err) = run(&args) {
        eprintln!("linecat: {err}");
        process::exit(1);
    }
}
