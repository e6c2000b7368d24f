use ticketflow_core::corrector::{row_limit_of, Corrector, SqlHistory};
use ticketflow_core::criteria::{evaluate, evaluate_text, CriteriaExpression};
use ticketflow_core::errors::{try_map_error, ParseError};
use ticketflow_core::model::ResultsByQuery;
use ticketflow_core::parser::parse_ticket;
use ticketflow_core::providers::{QueryExecutor, QueryRequest, SyntheticExecutor};

const MULTI: &str = "Ticket #HELIX-20001
Request: Monthly and regional view
SQL: ```sql
-- Query 1: monthly totals
SELCT * FORM orders WEHERE date > '2024/01/01'
-- Query 2: regional averages
SELECT region, AVG(sales) AS avg_sales FROM orders GROPU BY region ORDR BY avg_sales DESC
```
Success Criteria: Query 1: ROWCOUNT > 10;
Query 2: ROWCOUNT >= 1 AND AVG(avg_sales) > 0
";

const SQL_SAMPLES: &[&str] = &[
    "SELECT a FROM t",
    "SELECT a FROM t;",
    "SELECT a FROM t;;",
    "select a from t order by a desc",
    "SELECT TOP 5 a FROM t",
    "SELCT * FORM orders WHERE region = 'west'",
    "-- Query 1: one\nSELECT 1\n-- Query 2: two\nSELECT 2 LIMIT 3;",
];

#[test]
fn test_corrected_sql_has_one_terminator_and_one_limit() {
    let corrector = Corrector::with_defaults().unwrap();
    for sql in SQL_SAMPLES {
        let once = corrector.correct(sql).sql;
        let twice = corrector.correct(&once).sql;
        assert_eq!(once, twice, "correction of {:?} is not stable", sql);

        for stmt in once.split("\n\n") {
            assert!(stmt.ends_with(';') && !stmt.ends_with(";;"), "{:?}", stmt);
            assert!(row_limit_of(stmt).is_some(), "{:?}", stmt);
            let limits = stmt.matches("LIMIT").count() + stmt.matches("TOP").count();
            assert_eq!(limits, 1, "{:?}", stmt);
        }
    }
}

#[tokio::test]
async fn test_parse_fix_execute_evaluate() -> anyhow::Result<()> {
    let mut ticket = parse_ticket(MULTI)?;
    assert_eq!(ticket.id, "HELIX-20001");
    assert_eq!(ticket.sql_statements.len(), 2);
    assert_eq!(
        ticket.criteria,
        "Query 1: ROWCOUNT > 10; Query 2: ROWCOUNT >= 1 AND AVG(avg_sales) > 0"
    );

    let corrector = Corrector::with_defaults()?;
    let mut history = SqlHistory::default();
    let correction = corrector.fix_ticket(&mut ticket, Some(&mut history));
    assert!(correction.changed);
    assert!(ticket.is_fixed);
    assert_eq!(ticket.sql_statements.len(), 2);
    assert!(ticket.sql_statements[0].contains("FROM orders\nWHERE date > '2024-01-01'"));
    assert!(ticket.sql_statements[1].contains("GROUP BY region\nORDER BY avg_sales DESC\nLIMIT 1000;"));

    let exec = SyntheticExecutor::default();
    let mut results = ResultsByQuery::new();
    for (i, sql) in ticket.sql_statements.iter().enumerate() {
        let req = QueryRequest {
            ticket_id: &ticket.id,
            query_index: i + 1,
            sql,
        };
        results.insert(i + 1, exec.execute(&req).await?);
    }

    let expr: CriteriaExpression = ticket.criteria.parse()?;
    let eval = evaluate(&expr, &results);
    assert_eq!(eval.evaluations.len(), 2);
    // Synthetic rows carry `sales`, not `avg_sales`, so query 2 fails on AVG.
    assert!(eval.evaluations[0].passed);
    assert!(!eval.evaluations[1].passed);
    assert!(eval.evaluations[1].message.contains("AVG(avg_sales) = 0 (❌ > 0)"));
    assert!(!eval.overall_passed);

    assert_eq!(history.undo().as_deref(), Some(MULTI_SQL));
    Ok(())
}

const MULTI_SQL: &str = "-- Query 1: monthly totals
SELCT * FORM orders WEHERE date > '2024/01/01'
-- Query 2: regional averages
SELECT region, AVG(sales) AS avg_sales FROM orders GROPU BY region ORDR BY avg_sales DESC";

#[test]
fn test_incomplete_ticket_maps_to_diagnostic() {
    let err = parse_ticket("Ticket #HELIX-1\nno sql here").unwrap_err();
    assert!(err.is_incomplete());
    let diag = try_map_error(&anyhow::Error::new(err.clone())).unwrap();
    assert_eq!(diag.code, "E_TICKET_INCOMPLETE");
    assert_eq!(
        err,
        ParseError::IncompleteTicket {
            ticket_id: "HELIX-1".into(),
            missing: vec!["sql", "criteria"],
        }
    );
}

// OR is not part of the grammar: an OR-joined predicate always fails closed.
#[test]
fn test_or_connective_is_unsupported() {
    let results = ResultsByQuery::from([(1, SyntheticExecutor::default().generate("SELECT 1"))]);
    let eval = evaluate_text("ROWCOUNT > 0 AND ROWCOUNT > 1 OR MAX(sales) > 0", &results).unwrap();
    assert!(!eval.overall_passed);
    assert!(eval.evaluations[0].message.contains("OR is not supported"));
}
