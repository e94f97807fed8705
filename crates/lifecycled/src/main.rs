use std::process::ExitCode;

fn main() -> ExitCode {
    match lifecycled::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("lifecycled: {error}");
            ExitCode::FAILURE
        }
    }
}
