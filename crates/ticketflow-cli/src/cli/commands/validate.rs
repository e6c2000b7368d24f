use super::{exit_codes, load_workflow_config, read_input};
use crate::cli::args::{OutputFormat, ValidateArgs};
use serde_json::json;
use ticketflow_core::corrector::Corrector;
use ticketflow_core::errors::{diagnostic::Diagnostic, try_map_error};
use ticketflow_core::parser::parse_ticket;
use ticketflow_core::validate::{validate_sql, validate_ticket, ValidateReport};

pub async fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let cfg = load_workflow_config(args.config.as_deref())?;
    let corrector = Corrector::new(cfg.corrector_options())?;
    let opts = cfg.validate_options();
    let text = read_input(&args.input).await?;

    let report = if args.sql {
        validate_sql(&text, &corrector, &opts)
    } else {
        match parse_ticket(&text) {
            Ok(ticket) => validate_ticket(&ticket, &corrector, &opts),
            Err(e) => {
                // An unparseable ticket is itself the finding.
                let err = anyhow::Error::new(e);
                let diag = try_map_error(&err)
                    .unwrap_or_else(|| Diagnostic::new("E_UNKNOWN", err.to_string()));
                ValidateReport {
                    diagnostics: vec![diag],
                }
            }
        }
    };

    print_report(&report, args.format);

    // Any error severity -> 2. Warnings only -> 0.
    if report.has_errors() {
        Ok(exit_codes::CONFIG_ERROR)
    } else {
        Ok(exit_codes::OK)
    }
}

fn print_report(report: &ValidateReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let (errors, warnings): (Vec<&Diagnostic>, Vec<&Diagnostic>) =
                report.diagnostics.iter().partition(|d| d.is_error());
            let output = json!({
                "schema_version": 1,
                "ok": errors.is_empty(),
                "errors": errors,
                "warnings": warnings,
                "summary": {
                    "diagnostic_count": report.diagnostics.len()
                }
            });
            println!("{}", output);
        }
        OutputFormat::Text => {
            if report.diagnostics.is_empty() {
                eprintln!("✔ no problems found");
                return;
            }
            for d in &report.diagnostics {
                eprintln!("{}", d.format_terminal());
            }
            eprintln!(
                "\n{} error(s), {} warning(s)",
                report.error_count(),
                report.warning_count()
            );
        }
    }
}
