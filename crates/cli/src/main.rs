use std::process::ExitCode;

fn main() -> ExitCode {
    ebert_cli::run()
}
