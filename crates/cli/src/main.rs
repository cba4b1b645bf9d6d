use std::process::ExitCode;

fn main() -> ExitCode {
    selma_cli::run()
}
