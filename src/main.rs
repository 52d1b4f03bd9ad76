use std::process::ExitCode;

fn main() -> ExitCode {
    bear_alarm::run()
}
