fn main() -> std::process::ExitCode {
    termout_lib::cli::run()
}
