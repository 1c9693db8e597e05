//! CLI tool to display the field type compatibility matrix
//!
//! Usage:
//!   cargo run --bin type-matrix
//!   cargo run --bin type-matrix -- STR INT

use datadabble::schema::{format_matrix, FieldType, TypeCompatibility};
use std::env;

fn parse_or_exit(value: &str) -> FieldType {
    value.parse().unwrap_or_else(|e: String| {
        eprintln!("{}", e);
        std::process::exit(2);
    })
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 3 {
        let from_type = parse_or_exit(&args[1]);
        let to_type = parse_or_exit(&args[2]);

        println!("Checking: {} -> {}", from_type.code(), to_type.code());
        println!();

        match from_type.compatibility_with(to_type) {
            TypeCompatibility::Identical => {
                println!("Result: IDENTICAL");
                println!("  Types are the same, no change needed.");
            }
            TypeCompatibility::Safe => {
                println!("Result: SAFE");
                println!("  Every stored value converts.");
            }
            TypeCompatibility::DataLoss { reason } => {
                println!("Result: DATALOSS");
                println!("  Values that do not convert are cleared, and only after confirmation.");
                println!("  Reason: {}", reason);
                std::process::exit(1);
            }
            TypeCompatibility::Incompatible { reason } => {
                println!("Result: INCOMPATIBLE");
                println!("  Stored values will not convert.");
                println!("  Reason: {}", reason);
                std::process::exit(2);
            }
        }
    } else if args.len() == 1 {
        print!("{}", format_matrix());
    } else {
        eprintln!("Usage:");
        eprintln!("  {} <from_type> <to_type>  - Check specific conversion", args[0]);
        eprintln!("  {}                        - Display full matrix", args[0]);
        eprintln!();
        eprintln!("Types: BOOL INT DEC STR DATE EMAIL URL DICT LIST (or their long names)");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} INT DEC", args[0]);
        eprintln!("  {} string email", args[0]);
        std::process::exit(1);
    }
}
