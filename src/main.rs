use std::process::ExitCode;

fn main() -> ExitCode {
    match kw_trends::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(exit_code = err.exit_code(), "run failed");
            eprintln!("kwt: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
