//! Binary entry point: hands `argv` straight to `cli::run`.

fn main() -> std::process::ExitCode {
    let stop = cli::stop_flag();
    cli::run(std::env::args_os(), stop).into()
}
