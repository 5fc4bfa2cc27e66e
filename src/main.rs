//! tokenmeter - AI API spend tracker
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use tokenmeter::cli::{Cli, OutputFormat};
use tokenmeter::core::logging::{self, LogSettings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = LogSettings::resolve(cli.log_level.as_deref(), cli.json_output, cli.verbose);
    logging::init(&settings);

    let format = cli.effective_format();
    match tokenmeter::cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            if format == OutputFormat::Json {
                let payload = serde_json::json!({
                    "error": {
                        "code": e.error_code(),
                        "category": e.category().to_string(),
                        "message": e.to_string(),
                    }
                });
                eprintln!("{payload}");
            } else {
                eprintln!("error: {e} [{}]", e.error_code());
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
