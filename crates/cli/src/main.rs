use std::process::ExitCode;

fn main() -> ExitCode {
    denty_cli::run()
}
