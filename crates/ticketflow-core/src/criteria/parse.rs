use super::{Aggregate, Clause, Comparator, CriteriaExpression, MalformedPredicate, Predicate, QueryCriterion};
use crate::errors::similarity::closest_match;
use crate::errors::CriteriaError;

const AGGREGATE_NAMES: [&str; 6] = ["ROWCOUNT", "MIN", "MAX", "AVG", "SUM", "COUNT"];

struct RawClause<'a> {
    query_index: Option<usize>,
    text: &'a str,
}

pub fn parse_expression(text: &str) -> Result<CriteriaExpression, CriteriaError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CriteriaError::Empty);
    }

    let mut raw: Vec<RawClause<'_>> = Vec::new();
    for piece in trimmed.split(';') {
        split_query_markers(piece, &mut raw)?;
    }

    let mut queries: Vec<QueryCriterion> = Vec::new();
    for (position, clause) in raw.iter().enumerate() {
        // Unprefixed clauses are positional: the only clause is query 1.
        let query_index = clause.query_index.unwrap_or(position + 1);
        let predicates: Vec<Clause> = split_and(clause.text)
            .into_iter()
            .map(|p| match parse_predicate(&p) {
                Ok(pred) => Clause::Predicate(pred),
                Err(bad) => Clause::Malformed(bad),
            })
            .collect();

        match queries.iter_mut().find(|q| q.query_index == query_index) {
            Some(existing) => existing.predicates.extend(predicates),
            None => queries.push(QueryCriterion {
                query_index,
                predicates,
            }),
        }
    }
    queries.sort_by_key(|q| q.query_index);

    let expr = CriteriaExpression { queries };
    let any_valid = expr
        .queries
        .iter()
        .flat_map(|q| q.predicates.iter())
        .any(|c| matches!(c, Clause::Predicate(_)));
    if !any_valid {
        return Err(CriteriaError::Unparseable {
            expression: trimmed.to_string(),
            reasons: expr.malformed().map(|m| m.to_string()).collect(),
        });
    }

    Ok(expr)
}

/// Splits one `;`-separated piece further on `Query N:` markers, so that
/// clauses folded onto one line without separators still parse.
fn split_query_markers<'a>(piece: &'a str, out: &mut Vec<RawClause<'a>>) -> Result<(), CriteriaError> {
    let markers = find_query_markers(piece);
    if markers.is_empty() {
        if !piece.trim().is_empty() {
            out.push(RawClause {
                query_index: None,
                text: piece.trim(),
            });
        }
        return Ok(());
    }

    let leading = piece[..markers[0].start].trim();
    if !leading.is_empty() {
        out.push(RawClause {
            query_index: None,
            text: leading,
        });
    }

    for (i, m) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map(|n| n.start).unwrap_or(piece.len());
        let index = match piece[m.digits.0..m.digits.1].parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(CriteriaError::InvalidQueryIndex(
                    piece[m.start..end].trim().to_string(),
                ))
            }
        };
        out.push(RawClause {
            query_index: Some(index),
            text: piece[m.end..end].trim(),
        });
    }
    Ok(())
}

struct Marker {
    start: usize,
    end: usize,
    digits: (usize, usize),
}

/// Byte offsets of every `Query <digits>:` marker (case-insensitive, at a
/// word start).
fn find_query_markers(text: &str) -> Vec<Marker> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i + 5 <= bytes.len() {
        let at_word_start = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        if !at_word_start || !bytes[i..i + 5].eq_ignore_ascii_case(b"query") {
            i += 1;
            continue;
        }

        let mut j = i + 5;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let digits_end = j;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        if digits_end > digits_start && j < bytes.len() && bytes[j] == b':' {
            found.push(Marker {
                start: i,
                end: j + 1,
                digits: (digits_start, digits_end),
            });
            i = j + 1;
        } else {
            i += 1;
        }
    }
    found
}

/// Splits on the standalone word `AND`; whitespace inside a predicate collapses.
fn split_and(text: &str) -> Vec<String> {
    let mut groups: Vec<Vec<&str>> = vec![Vec::new()];
    for word in text.split_whitespace() {
        if word.eq_ignore_ascii_case("AND") {
            groups.push(Vec::new());
        } else if let Some(last) = groups.last_mut() {
            last.push(word);
        }
    }
    groups.into_iter().map(|g| g.join(" ")).collect()
}

fn malformed(text: &str, reason: impl Into<String>) -> MalformedPredicate {
    MalformedPredicate {
        text: text.to_string(),
        reason: reason.into(),
    }
}

pub fn parse_predicate(text: &str) -> Result<Predicate, MalformedPredicate> {
    let text = text.trim();
    if text.is_empty() {
        return Err(malformed(text, "empty predicate"));
    }
    if text.split_whitespace().any(|w| w.eq_ignore_ascii_case("OR")) {
        return Err(malformed(
            text,
            "OR is not supported; split the condition into AND-ed predicates",
        ));
    }

    let Some(op_start) = text.find(|c: char| matches!(c, '<' | '>' | '=' | '!')) else {
        return Err(malformed(text, "missing comparator (>, <, =, >=, <=)"));
    };
    let op_len = text[op_start..]
        .chars()
        .take_while(|c| matches!(c, '<' | '>' | '=' | '!'))
        .count();
    let op = &text[op_start..op_start + op_len];
    let comparator = match op {
        ">" => Comparator::Gt,
        "<" => Comparator::Lt,
        "=" | "==" => Comparator::Eq,
        ">=" => Comparator::Ge,
        "<=" => Comparator::Le,
        other => {
            return Err(malformed(
                text,
                format!("unsupported comparator '{}'", other),
            ))
        }
    };

    let lhs = text[..op_start].trim();
    let rhs = text[op_start + op_len..].trim();

    let threshold = rhs
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| malformed(text, format!("threshold '{}' is not a number", rhs)))?;

    let (name, column) = match lhs.find('(') {
        Some(open) => {
            let Some(inner) = lhs[open + 1..].strip_suffix(')') else {
                return Err(malformed(text, "unbalanced parentheses around column"));
            };
            let col = inner.trim();
            (lhs[..open].trim(), (!col.is_empty()).then(|| col.to_string()))
        }
        None => (lhs, None),
    };

    if name.is_empty() {
        return Err(malformed(text, "missing aggregate"));
    }
    let Some(aggregate) = Aggregate::from_token(name) else {
        let reason = match closest_match(name, &AGGREGATE_NAMES, 0.5) {
            Some(hint) => format!("unknown aggregate '{}' (did you mean {}?)", name, hint),
            None => format!(
                "unknown aggregate '{}' (expected one of {})",
                name,
                AGGREGATE_NAMES.join(", ")
            ),
        };
        return Err(malformed(text, reason));
    };

    let column = match aggregate {
        Aggregate::RowCount => None,
        _ => column,
    };
    if aggregate.requires_column() && column.as_deref().map_or(true, |c| c == "*") {
        return Err(malformed(
            text,
            format!("{} needs a column, e.g. {}(sales)", aggregate.name(), aggregate.name()),
        ));
    }

    Ok(Predicate {
        aggregate,
        column,
        comparator,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(c: &Clause) -> &Predicate {
        match c {
            Clause::Predicate(p) => p,
            Clause::Malformed(m) => panic!("unexpected malformed predicate {}", m),
        }
    }

    #[test]
    fn test_single_query_and_split() {
        let expr = parse_expression("ROWCOUNT > 100 AND MAX(sales) > 5000").unwrap();
        assert_eq!(expr.queries.len(), 1);
        let q = &expr.queries[0];
        assert_eq!(q.query_index, 1);
        assert_eq!(q.predicates.len(), 2);
        assert_eq!(valid(&q.predicates[0]).aggregate, Aggregate::RowCount);
        let max = valid(&q.predicates[1]);
        assert_eq!(max.aggregate, Aggregate::Max);
        assert_eq!(max.column.as_deref(), Some("sales"));
        assert_eq!(max.threshold, 5000.0);
    }

    #[test]
    fn test_multi_query_prefixes() {
        let expr = parse_expression("Query 1: ROWCOUNT > 50; Query 2: ROWCOUNT > 2 AND AVG(avg_sales) > 3000").unwrap();
        assert!(expr.is_multi_query());
        assert_eq!(expr.queries[0].query_index, 1);
        assert_eq!(expr.queries[1].query_index, 2);
        assert_eq!(expr.queries[1].predicates.len(), 2);
    }

    #[test]
    fn test_markers_without_semicolons() {
        let expr = parse_expression("query 1: ROWCOUNT >= 1 Query 2: SUM(sales) <= 10").unwrap();
        assert_eq!(expr.queries.len(), 2);
        assert_eq!(valid(&expr.queries[1].predicates[0]).comparator, Comparator::Le);
    }

    #[test]
    fn test_duplicate_query_indices_are_merged() {
        let expr = parse_expression("Query 2: ROWCOUNT > 1; Query 2: MAX(x) < 5").unwrap();
        assert_eq!(expr.queries.len(), 1);
        assert_eq!(expr.queries[0].predicates.len(), 2);
    }

    #[test]
    fn test_unprefixed_clauses_are_positional() {
        let expr = parse_expression("ROWCOUNT > 1; ROWCOUNT > 2").unwrap();
        let idx: Vec<usize> = expr.queries.iter().map(|q| q.query_index).collect();
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn test_threshold_and_comparator_forms() {
        let p = parse_predicate("SUM(sales) == 1,500.5").unwrap();
        assert_eq!(p.comparator, Comparator::Eq);
        assert_eq!(p.threshold, 1500.5);

        let p = parse_predicate("count(*) >= 3").unwrap();
        assert_eq!(p.aggregate, Aggregate::Count);
        assert_eq!(p.column.as_deref(), Some("*"));

        let p = parse_predicate("rowcount(ignored) < 10").unwrap();
        assert_eq!(p.column, None);
    }

    #[test]
    fn test_malformed_predicates() {
        let m = parse_predicate("MEDIAN(sales) > 1").unwrap_err();
        assert!(m.reason.contains("unknown aggregate 'MEDIAN'"));

        let m = parse_predicate("ROWCONT > 1").unwrap_err();
        assert!(m.reason.contains("did you mean ROWCOUNT?"), "{}", m.reason);

        assert!(parse_predicate("ROWCOUNT != 1").unwrap_err().reason.contains("'!='"));
        assert!(parse_predicate("ROWCOUNT 5").unwrap_err().reason.contains("missing comparator"));
        assert!(parse_predicate("MAX > 5").unwrap_err().reason.contains("needs a column"));
        assert!(parse_predicate("ROWCOUNT > lots").unwrap_err().reason.contains("not a number"));
        assert!(parse_predicate("ROWCOUNT > NaN").is_err());
    }

    #[test]
    fn test_or_is_not_supported() {
        let expr = parse_expression("ROWCOUNT > 1 AND MAX(sales) > 5 OR MIN(sales) < 1").unwrap();
        let malformed: Vec<_> = expr.malformed().collect();
        assert_eq!(malformed.len(), 1);
        assert!(malformed[0].reason.contains("OR is not supported"));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(parse_expression("   "), Err(CriteriaError::Empty));
        assert!(matches!(
            parse_expression("Query 0: ROWCOUNT > 1"),
            Err(CriteriaError::InvalidQueryIndex(_))
        ));
        match parse_expression("looks good to me") {
            Err(CriteriaError::Unparseable { reasons, .. }) => assert_eq!(reasons.len(), 1),
            other => panic!("expected Unparseable, got {:?}", other),
        }
    }
}
