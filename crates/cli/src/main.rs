use std::process::ExitCode;

fn main() -> ExitCode {
    stayledger_cli::run()
}
