use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match docvision::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "DocVision exited with an error");
            eprintln!("docvision: {e}");
            ExitCode::FAILURE
        }
    }
}
