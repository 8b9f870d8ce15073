use std::process::ExitCode;

fn main() -> ExitCode {
    cartcalc_cli::run()
}
