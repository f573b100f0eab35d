//! Lama bytecode runner.
//!
//! Loads a compiled `.bc` image and interprets it against the standard
//! input/output streams.
//!
//! Exit codes:
//! - 0: Program halted normally
//! - 1: Usage or input/load error
//! - 3: Runtime error

use std::process;

use lama_bytefile::Bytefile;
use lama_vm::{Heap, Interpreter, DEFAULT_STACK_CAPACITY};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mut stack_capacity = DEFAULT_STACK_CAPACITY;
    let mut path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--stack-size" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("error: --stack-size needs a value");
                    process::exit(1);
                };
                match value.parse::<usize>() {
                    Ok(words) if words > 0 => stack_capacity = words,
                    _ => {
                        eprintln!("error: invalid stack size '{value}'");
                        process::exit(1);
                    }
                }
            }
            other if other.starts_with('-') => {
                eprintln!("error: unknown option '{other}'");
                eprintln!();
                print_usage();
                process::exit(1);
            }
            other => {
                if path.replace(other).is_some() {
                    eprintln!("error: more than one input file");
                    process::exit(1);
                }
            }
        }
        i += 1;
    }

    let Some(path) = path else {
        print_usage();
        process::exit(1);
    };

    let image = match Bytefile::from_file(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {path}: {e}");
            process::exit(1);
        }
    };
    log::info!(
        "loaded {path}: {} code bytes, {} globals, {} public symbols",
        image.code().len(),
        image.global_area_size(),
        image.publics().len()
    );

    let mut interpreter = Interpreter::with_stack_capacity(&image, Heap::stdio(), stack_capacity);
    if let Err(e) = interpreter.run() {
        eprintln!("runtime error: {e}");
        process::exit(3);
    }
}

fn print_usage() {
    eprintln!("Usage: lamarun [options] <program.bc>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --stack-size <words>   Call-stack capacity (default {DEFAULT_STACK_CAPACITY})");
    eprintln!("  -h, --help             Show this help");
}
