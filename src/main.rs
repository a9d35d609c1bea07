use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use regiflow::run_everything_from_env;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let contains_errors = run_everything_from_env().await?;
    if contains_errors {
        tracing::error!("one or more series could not be anonymized");
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
