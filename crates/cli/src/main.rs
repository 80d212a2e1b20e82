use std::process::ExitCode;

fn main() -> ExitCode {
    cloudscope_cli::run()
}
