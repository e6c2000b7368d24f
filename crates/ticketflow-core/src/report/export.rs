use crate::model::{BatchItem, BatchStatus};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub ticket_id: String,
    pub sql: String,
    pub criteria: String,
    /// Rows over every query of the ticket.
    pub row_count: usize,
    pub status: BatchStatus,
}

/// Completed items only; Pending, Processing and Failed items are left out.
pub fn export_completed(items: &[BatchItem]) -> Vec<ExportEntry> {
    items
        .iter()
        .filter(|i| i.status == BatchStatus::Completed)
        .map(|i| ExportEntry {
            ticket_id: i.ticket.id.clone(),
            sql: i.ticket.sql.clone(),
            criteria: i.ticket.criteria.clone(),
            row_count: i.row_count(),
            status: i.status,
        })
        .collect()
}

pub fn write_export(path: &Path, entries: &[ExportEntry]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json + "\n")
        .map_err(|e| anyhow::anyhow!("failed to write export '{}': {}", path.display(), e))?;
    tracing::info!(
        event = "ticketflow.export",
        path = %path.display(),
        entries = entries.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Row, Scalar, Ticket};

    fn item(id: &str, status: BatchStatus, rows: usize) -> BatchItem {
        let mut item = BatchItem::pending(Ticket {
            id: id.into(),
            sql: "SELECT 1;".into(),
            criteria: "ROWCOUNT > 0".into(),
            ..Default::default()
        });
        item.status = status;
        item.results.insert(
            1,
            (0..rows)
                .map(|_| Row::from([("a".to_string(), Scalar::from(1.0))]))
                .collect(),
        );
        item
    }

    #[test]
    fn test_only_completed_items_are_exported() {
        let items = vec![
            item("A", BatchStatus::Completed, 3),
            item("B", BatchStatus::Failed, 0),
            item("C", BatchStatus::Completed, 1),
            item("D", BatchStatus::Pending, 0),
        ];
        let entries = export_completed(&items);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ticket_id, "A");
        assert_eq!(entries[0].row_count, 3);
        assert_eq!(entries[1].ticket_id, "C");
    }

    #[test]
    fn test_write_export_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_export(&path, &export_completed(&[item("A", BatchStatus::Completed, 2)])).unwrap();

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!([{
                "ticket_id": "A",
                "sql": "SELECT 1;",
                "criteria": "ROWCOUNT > 0",
                "row_count": 2,
                "status": "completed"
            }])
        );
    }
}
