//! Thin binary entry point — parses CLI args and delegates to `twitch_mcp::run()`.

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = twitch_mcp::cli::Cli::parse();

    match twitch_mcp::run(cli) {
        Ok(code) => finish(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Exit with the server's code. Unix codes are a single byte; signal deaths are already mapped
/// to `128 + n`.
#[cfg(unix)]
fn finish(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

/// Windows exit codes are full 32-bit values (`0xC000013A` after Ctrl-C), so pass them as-is.
#[cfg(not(unix))]
fn finish(code: i32) -> ExitCode {
    std::process::exit(code)
}

#[cfg(unix)]
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
