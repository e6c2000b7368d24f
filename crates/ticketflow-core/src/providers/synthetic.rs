use super::executor::{QueryExecutor, QueryRequest};
use crate::corrector::row_limit_of;
use crate::fingerprint::sha256_seed;
use crate::model::{ResultSet, Row, Scalar};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

/// Deterministic stand-in for a database: the same SQL always yields the
/// same sales-like rows (`product_id`, `sales`, `region`, `date`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticExecutor {
    pub min_rows: usize,
    pub max_rows: usize,
}

impl Default for SyntheticExecutor {
    fn default() -> Self {
        Self {
            min_rows: 50,
            max_rows: 200,
        }
    }
}

/// xorshift64; never seeded with zero.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed | 1)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        if n == 0 {
            0
        } else {
            self.next() % n
        }
    }
}

impl SyntheticExecutor {
    pub fn generate(&self, sql: &str) -> ResultSet {
        let mut rng = Rng::new(sha256_seed(sql));
        let span = self.max_rows.saturating_sub(self.min_rows) as u64 + 1;
        let mut count = self.min_rows + rng.below(span) as usize;
        if let Some(limit) = row_limit_of(sql) {
            count = count.min(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        let epoch = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        (0..count)
            .map(|i| {
                let cents = 10_000 + rng.below(990_000);
                let day = rng.below(366) as i64;
                let region = REGIONS[rng.below(REGIONS.len() as u64) as usize];
                let date = epoch + Duration::days(day);

                let mut row = Row::new();
                row.insert("product_id".into(), Scalar::from(format!("P{:04}", i + 1)));
                row.insert("sales".into(), Scalar::from(cents as f64 / 100.0));
                row.insert("region".into(), Scalar::from(region));
                row.insert("date".into(), Scalar::from(date.format("%Y-%m-%d").to_string()));
                row
            })
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for SyntheticExecutor {
    async fn execute(&self, req: &QueryRequest<'_>) -> anyhow::Result<ResultSet> {
        let rows = self.generate(req.sql);
        tracing::debug!(
            event = "ticketflow.executor.synthetic",
            ticket_id = req.ticket_id,
            query_index = req.query_index,
            rows = rows.len(),
        );
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_sql_same_rows() {
        let exec = SyntheticExecutor::default();
        let a = exec.generate("SELECT * FROM orders;");
        let b = exec.generate("SELECT * FROM orders;");
        assert_eq!(a, b);
        assert!((50..=200).contains(&a.len()));
        assert!(a.iter().all(|r| r.get("sales").and_then(Scalar::as_f64).is_some()));
    }

    #[test]
    fn test_limit_caps_rows() {
        let rows = SyntheticExecutor::default().generate("SELECT a FROM t LIMIT 7;");
        assert_eq!(rows.len(), 7);
    }

    #[test]
    fn test_bounds_are_respected() {
        let exec = SyntheticExecutor {
            min_rows: 3,
            max_rows: 3,
        };
        assert_eq!(exec.generate("SELECT 1").len(), 3);
    }
}
