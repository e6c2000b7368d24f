use super::{exit_codes, load_workflow_config, read_input};
use crate::cli::args::{FixArgs, OutputFormat};
use ticketflow_core::corrector::Corrector;
use ticketflow_core::parser::parse_ticket;

pub async fn run(args: FixArgs) -> anyhow::Result<i32> {
    let cfg = load_workflow_config(args.config.as_deref())?;
    let corrector = Corrector::new(cfg.corrector_options())?;
    let text = read_input(&args.input).await?;

    let sql = if args.sql {
        text.trim().to_string()
    } else {
        parse_ticket(&text)?.sql
    };
    let correction = corrector.correct(&sql);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&correction)?),
        OutputFormat::Text => {
            println!("{}", correction.sql);
            if correction.changed {
                eprintln!("applied: {}", correction.applied_rules.join(", "));
            } else {
                eprintln!("no changes");
            }
        }
    }
    Ok(exit_codes::OK)
}
