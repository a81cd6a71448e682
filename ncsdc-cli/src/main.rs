//! NCS decompiler CLI — decompile, disassemble, inspect, and batch.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/decode/usage error

mod commands;

use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "decompile" => commands::decompile(&args[2..]),
        "disassemble" => commands::disassemble(&args[2..]),
        "info" => commands::info(&args[2..]),
        "batch" => commands::batch(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: ncsdc <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  decompile <input.ncs> [-o output.txt]   Decompile to structured text");
    eprintln!("  disassemble <input.ncs>                 Flat one-line-per-instruction listing");
    eprintln!("  info <input.ncs>                        Header fields and counts");
    eprintln!("  batch <dir>                             Decompile every .ncs in a directory");
}
