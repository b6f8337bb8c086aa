//! automl command-line entry point

use automl_engine::cli::{self, Cli};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_engine=info".into()),
        )
        .init();

    cli::run(Cli::parse())
}
