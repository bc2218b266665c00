//! Entry point for the command-line importer.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = osmplace_cli::run() {
        eprintln!("osmplace: {err}");
        std::process::exit(1);
    }
}
