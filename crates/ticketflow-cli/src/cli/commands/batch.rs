use super::{build_executor, exit_codes, load_workflow_config, read_input};
use crate::cli::args::{BatchArgs, OutputFormat};
use ticketflow_core::corrector::Corrector;
use ticketflow_core::engine::{BatchEvent, BatchOrchestrator, CancelHandle};
use ticketflow_core::model::{BatchItem, BatchStatus};
use ticketflow_core::parser::parse_batch;
use ticketflow_core::report::{console, export_completed, write_export};

pub async fn run(args: BatchArgs) -> anyhow::Result<i32> {
    let cfg = load_workflow_config(args.config.as_deref())?;
    let text = read_input(&args.input).await?;
    let mut items: Vec<BatchItem> = parse_batch(&text).into_iter().map(BatchItem::pending).collect();
    if items.is_empty() {
        eprintln!("no tickets found in input");
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let mut policy = cfg.batch_policy();
    policy.auto_fix |= args.auto_fix;
    let mut orch = BatchOrchestrator::new(build_executor(&cfg)?, policy)
        .with_corrector(Corrector::new(cfg.corrector_options())?);

    let mut events = orch.subscribe();
    let show_progress = args.format == OutputFormat::Text;
    let progress = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            if let BatchEvent::ItemUpdated { item, progress, .. } = ev {
                if show_progress && item.status.is_terminal() {
                    eprintln!(
                        "[{}/{}] {} {}",
                        progress.done, progress.total, item.ticket.id, item.status
                    );
                }
            }
        }
    });

    // Ctrl-C stops the run before the next ticket.
    let cancel = CancelHandle::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let summary = orch.run(&mut items, &cancel).await?;
    signal.abort();
    drop(orch);
    progress.await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => console::print_batch_summary(&items, &summary),
    }

    if let Some(path) = &args.export {
        let entries = export_completed(&items);
        write_export(path, &entries)?;
        eprintln!("exported {} ticket(s) to {}", entries.len(), path.display());
    }

    let criteria_failed = items.iter().any(|i| {
        i.status == BatchStatus::Completed
            && i.evaluation.as_ref().is_some_and(|e| !e.overall_passed)
    });
    if summary.failed > 0 || summary.pending > 0 || criteria_failed {
        Ok(exit_codes::FAILURE)
    } else {
        Ok(exit_codes::OK)
    }
}
