use std::process::ExitCode;

fn main() -> ExitCode {
    dealsense_cli::run()
}
