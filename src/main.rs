//! fieldseal CLI entry point
//!
//! Parses arguments, dispatches to the command and exits non-zero on
//! failure. All logic lives in the `cli` module.

use fieldseal::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
