use super::Aggregate;
use crate::model::{Row, Scalar};

/// Cell lookup by exact column name, then case-insensitively.
fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a Scalar> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    })
}

/// Computes `aggregate` over `column` of `rows`.
///
/// Missing or non-numeric cells count as 0 for MIN/MAX/AVG/SUM; COUNT counts
/// non-null cells, and `COUNT(*)` or a bare `COUNT` counts rows. An empty
/// input yields 0.
pub fn compute(aggregate: Aggregate, column: Option<&str>, rows: &[Row]) -> f64 {
    let column = match (aggregate, column) {
        (Aggregate::RowCount, _) | (Aggregate::Count, None) | (Aggregate::Count, Some("*")) => {
            return rows.len() as f64
        }
        (_, Some(c)) => c,
        (_, None) => return 0.0,
    };

    if aggregate == Aggregate::Count {
        return rows
            .iter()
            .filter(|r| cell(r, column).is_some_and(|v| !v.is_null()))
            .count() as f64;
    }
    if rows.is_empty() {
        return 0.0;
    }

    let values = rows
        .iter()
        .map(|r| cell(r, column).and_then(Scalar::as_f64).unwrap_or(0.0));

    match aggregate {
        Aggregate::Min => values.fold(f64::INFINITY, f64::min),
        Aggregate::Max => values.fold(f64::NEG_INFINITY, f64::max),
        Aggregate::Sum => values.sum(),
        Aggregate::Avg => values.sum::<f64>() / rows.len() as f64,
        Aggregate::RowCount | Aggregate::Count => rows.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[Scalar]) -> Vec<Row> {
        values
            .iter()
            .map(|v| {
                let mut r = Row::new();
                r.insert("sales".to_string(), v.clone());
                r
            })
            .collect()
    }

    #[test]
    fn test_numeric_aggregates() {
        let data = rows(&[Scalar::from(10.0), Scalar::from(30.0), Scalar::from("20")]);
        assert_eq!(compute(Aggregate::Max, Some("sales"), &data), 30.0);
        assert_eq!(compute(Aggregate::Min, Some("sales"), &data), 10.0);
        assert_eq!(compute(Aggregate::Sum, Some("sales"), &data), 60.0);
        assert_eq!(compute(Aggregate::Avg, Some("SALES"), &data), 20.0);
        assert_eq!(compute(Aggregate::RowCount, None, &data), 3.0);
    }

    #[test]
    fn test_missing_and_text_values_count_as_zero() {
        let data = rows(&[Scalar::from(5.0), Scalar::from("n/a"), Scalar::Null]);
        assert_eq!(compute(Aggregate::Min, Some("sales"), &data), 0.0);
        assert_eq!(compute(Aggregate::Sum, Some("sales"), &data), 5.0);
        assert_eq!(compute(Aggregate::Max, Some("missing"), &data), 0.0);
    }

    #[test]
    fn test_count_skips_nulls() {
        let data = rows(&[Scalar::from(1.0), Scalar::Null, Scalar::from("x")]);
        assert_eq!(compute(Aggregate::Count, Some("sales"), &data), 2.0);
        assert_eq!(compute(Aggregate::Count, Some("*"), &data), 3.0);
        assert_eq!(compute(Aggregate::Count, Some("other"), &data), 0.0);
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(compute(Aggregate::Avg, Some("sales"), &[]), 0.0);
        assert_eq!(compute(Aggregate::Max, Some("sales"), &[]), 0.0);
        assert_eq!(compute(Aggregate::RowCount, None, &[]), 0.0);
    }
}
