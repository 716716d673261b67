use std::process::ExitCode;

fn main() -> ExitCode {
    plughost::app::startup::startup()
}
