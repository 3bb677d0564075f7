use std::process::ExitCode;

fn main() -> ExitCode {
    roccc::cli::main()
}
