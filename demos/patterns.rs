//! Runs a few allocation patterns against a fresh heap and reports what
//! happened. Handy to watch the block chain change with `--dump`.
//!
//! ```text
//! cargo run --example patterns -- --dump exhaust reuse grow
//! ```

use std::{process, ptr::NonNull};

use argh::FromArgs;
use log::{LevelFilter, Log, Metadata, Record};
use mymalloc::{Heap, HeapError};

/// Exercise the allocator with a few allocation patterns.
#[derive(Debug, FromArgs)]
struct Args {
    /// patterns to run: exhaust, reuse, grow (all of them if none is given)
    #[argh(positional)]
    patterns: Vec<String>,

    /// print the heap after each pattern
    #[argh(switch, short = 'd')]
    dump: bool,

    /// log every allocator operation
    #[argh(switch, short = 'v')]
    verbose: bool,
}

/// Prints log records to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        eprintln!("[{:<5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

type Pattern = fn(&mut Heap) -> Result<(), HeapError>;

const PATTERNS: &[(&str, Pattern)] = &[("exhaust", exhaust), ("reuse", reuse), ("grow", grow)];

fn main() {
    let args: Args = argh::from_env();

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if args.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Warn
        });
    }

    let selected: Vec<_> = if args.patterns.is_empty() {
        PATTERNS.to_vec()
    } else {
        let mut selected = Vec::new();
        for name in &args.patterns {
            let Some(pattern) = PATTERNS.iter().find(|(known, _)| *known == name.as_str()) else {
                eprintln!("unknown pattern `{name}`");
                process::exit(2);
            };
            selected.push(*pattern);
        }
        selected
    };

    let mut failed = false;
    for (name, pattern) in selected {
        let mut heap = Heap::new();

        match pattern(&mut heap) {
            Ok(()) => println!("{name}: ok"),
            Err(err) => {
                println!("{name}: {err}");
                failed = true;
            }
        }

        if args.dump {
            println!("{}", heap.dump());
        }
    }

    if failed {
        process::exit(1);
    }
}

/// Allocates 10 bytes at a time, freeing every other chunk, until the heap
/// refuses or 100 allocations went through.
fn exhaust(heap: &mut Heap) -> Result<(), HeapError> {
    for i in 0..100 {
        let ptr = match heap.allocate(10) {
            Ok(ptr) => ptr,
            Err(err) if err.is_out_of_memory() => {
                println!("heap exhausted after {i} allocations: {err}");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        println!("allocated a chunk of memory: {ptr:p}");

        if i % 2 == 0 {
            unsafe { heap.free(ptr.as_ptr()) };
        }
    }

    Ok(())
}

/// Four chunks freed out of order must leave room for a new one.
fn reuse(heap: &mut Heap) -> Result<(), HeapError> {
    let chunks = allocate_four(heap)?;

    for i in [2, 0, 3, 1] {
        unsafe { heap.free(chunks[i].as_ptr()) };
    }

    let again = heap.allocate(10)?;
    println!("reallocated at {again:p}, first chunk was at {:p}", chunks[0]);

    Ok(())
}

/// Frees chunks one at a time from the back and asks for something bigger in
/// their place.
fn grow(heap: &mut Heap) -> Result<(), HeapError> {
    let chunks = allocate_four(heap)?;

    for i in [2, 1, 0] {
        unsafe { heap.free(chunks[i].as_ptr()) };
        let grown = heap.allocate(20)?;
        println!("chunk {} ({:p}) regrown at {grown:p}", i + 1, chunks[i]);
    }

    Ok(())
}

fn allocate_four(heap: &mut Heap) -> Result<[NonNull<u8>; 4], HeapError> {
    Ok([
        heap.allocate(10)?,
        heap.allocate(10)?,
        heap.allocate(10)?,
        heap.allocate(10)?,
    ])
}
