//! Binary entrypoint for `bts-helper`.

use std::process::ExitCode;

fn main() -> ExitCode {
    bts_helper_lib::run(std::env::args_os())
}
