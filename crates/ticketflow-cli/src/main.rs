use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::{Cli, LogFormat};
use cli::commands::{dispatch, exit_codes};

const ENV_LOG: &str = "TICKETFLOW_LOG";

fn init_logging(format: LogFormat) {
    let level = std::env::var(ENV_LOG).unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .init(),
        LogFormat::Compact => builder.compact().with_target(false).init(),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            match ticketflow_core::errors::try_map_error(&e) {
                Some(diag) => eprintln!("{}", diag.format_terminal()),
                None => eprintln!("fatal: {e:?}"),
            }
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
