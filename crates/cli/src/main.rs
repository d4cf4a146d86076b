use std::process::ExitCode;

fn main() -> ExitCode {
    pricerun_cli::run()
}
