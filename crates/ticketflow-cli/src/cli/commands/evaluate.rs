use super::{build_executor, exit_codes, load_workflow_config, read_input};
use crate::cli::args::{EvaluateArgs, OutputFormat, ReplyKind};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use ticketflow_core::corrector::Corrector;
use ticketflow_core::criteria::{evaluate, CriteriaExpression};
use ticketflow_core::model::{ResultSet, ResultsByQuery, Ticket};
use ticketflow_core::parser::parse_ticket;
use ticketflow_core::providers::{QueryExecutor, QueryRequest};
use ticketflow_core::report::{console, reply};
use tokio::time::timeout;

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsFile {
    Single(ResultSet),
    ByQuery(BTreeMap<String, ResultSet>),
}

fn load_results(path: &Path) -> anyhow::Result<ResultsByQuery> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read results '{}': {}", path.display(), e))?;
    let parsed: ResultsFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid results file '{}': {}", path.display(), e))?;

    match parsed {
        ResultsFile::Single(rows) => Ok(ResultsByQuery::from([(1, rows)])),
        ResultsFile::ByQuery(map) => map
            .into_iter()
            .map(|(k, rows)| match k.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok((n, rows)),
                _ => anyhow::bail!("results key '{}' is not a query index (1, 2, ...)", k),
            })
            .collect(),
    }
}

pub async fn run(args: EvaluateArgs) -> anyhow::Result<i32> {
    let cfg = load_workflow_config(args.config.as_deref())?;
    let text = read_input(&args.input).await?;
    let mut ticket = parse_ticket(&text)?;
    let expr = CriteriaExpression::parse(&ticket.criteria)?;

    if args.fix {
        let corrector = Corrector::new(cfg.corrector_options())?;
        let correction = corrector.fix_ticket(&mut ticket, None);
        if correction.changed {
            eprintln!("applied: {}", correction.applied_rules.join(", "));
        }
    }

    let results = match &args.results {
        Some(path) => load_results(path)?,
        None => match execute(&ticket, &cfg).await {
            Ok(results) => results,
            Err(e) => {
                eprintln!("💥 {}: {}", ticket.id, e);
                return Ok(exit_codes::FAILURE);
            }
        },
    };

    let evaluation = evaluate(&expr, &results);
    let row_count: usize = results.values().map(Vec::len).sum();

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ticket_id": ticket.id,
                "sql": ticket.sql,
                "is_fixed": ticket.is_fixed,
                "row_count": row_count,
                "overall_passed": evaluation.overall_passed,
                "evaluations": evaluation
                    .evaluations
                    .iter()
                    .map(|e| json!({
                        "query_index": e.query_index,
                        "passed": e.passed,
                        "message": e.message,
                        "row_count": e.row_count,
                    }))
                    .collect::<Vec<_>>(),
            }))?
        ),
        OutputFormat::Text => console::print_evaluation(&ticket.id, &evaluation),
    }

    if let Some(kind) = args.reply {
        let text = match kind {
            ReplyKind::Email => reply::email_template(&ticket.id, row_count, &evaluation),
            ReplyKind::Helpdesk => {
                reply::helpdesk_reply(&ticket.id, row_count, &evaluation, chrono::Utc::now())
            }
        };
        println!("{}", text);
    }

    if evaluation.overall_passed {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILURE)
    }
}

async fn execute(
    ticket: &Ticket,
    cfg: &ticketflow_core::config::WorkflowConfig,
) -> anyhow::Result<ResultsByQuery> {
    let executor = build_executor(cfg)?;
    let mut results = ResultsByQuery::new();
    for (i, sql) in ticket.sql_statements.iter().enumerate() {
        let req = QueryRequest {
            ticket_id: &ticket.id,
            query_index: i + 1,
            sql,
        };
        let rows = timeout(cfg.timeout(), executor.execute(&req))
            .await
            .map_err(|_| anyhow::anyhow!("query {} timed out", req.query_index))??;
        results.insert(req.query_index, rows);
    }
    Ok(results)
}
