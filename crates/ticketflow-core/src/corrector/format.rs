/// A run of comment-only lines or a run of code lines within one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Comment(String),
    Code(String),
}

/// Splits a line at the first `--` outside a single-quoted literal into its
/// code part and its comment tail.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_quote = false;
    let mut prev_dash = false;
    for (i, c) in line.char_indices() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                prev_dash = false;
            }
            '-' if !in_quote => {
                if prev_dash {
                    return (&line[..i - 1], Some(&line[i - 1..]));
                }
                prev_dash = true;
            }
            _ => prev_dash = false,
        }
    }
    (line, None)
}

/// Groups the lines of a statement into comment and code runs, in order.
/// A trailing comment moves to its own line after the code it followed.
pub fn segments(statement: &str) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    for line in statement.lines() {
        let (code, comment) = split_comment(line);
        if !code.trim().is_empty() {
            match out.last_mut() {
                Some(Segment::Code(buf)) => {
                    buf.push('\n');
                    buf.push_str(code.trim_end());
                }
                _ => out.push(Segment::Code(code.trim_end().to_string())),
            }
        }
        if let Some(comment) = comment {
            match out.last_mut() {
                Some(Segment::Comment(buf)) => {
                    buf.push('\n');
                    buf.push_str(comment.trim());
                }
                _ => out.push(Segment::Comment(comment.trim().to_string())),
            }
        }
    }
    out
}

pub fn render(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Comment(c) | Segment::Code(c) => c.as_str(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits on whitespace outside single-quoted literals.
fn tokenize(code: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in code.chars() {
        if c == '\'' {
            in_quote = !in_quote;
        }
        if c.is_whitespace() && !in_quote {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn paren_delta(token: &str) -> i32 {
    let mut in_quote = false;
    let mut delta = 0;
    for c in token.chars() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => delta += 1,
            ')' if !in_quote => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Lays out a code run: whitespace collapsed, top-level clause keywords on
/// their own lines, boolean connectives on indented lines.
///
/// The `AND` of a `BETWEEN x AND y` range stays inline, and nothing inside
/// parentheses is broken.
pub fn format_code(code: &str) -> String {
    let tokens = tokenize(code);
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut depth = 0;
    let mut in_between = false;
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        let upper = tok.to_ascii_uppercase();
        let followed_by_by = tokens
            .get(i + 1)
            .is_some_and(|t| t.eq_ignore_ascii_case("BY"));
        let mut consumed = 1;

        let mut clause: Option<(String, &str)> = None;
        match upper.as_str() {
            "BETWEEN" => in_between = true,
            "AND" if in_between => in_between = false,
            "FROM" | "WHERE" | "HAVING" | "LIMIT" if depth == 0 => {
                clause = Some((upper.clone(), ""));
            }
            "GROUP" | "ORDER" if depth == 0 && followed_by_by => {
                clause = Some((format!("{} BY", upper), ""));
                consumed = 2;
            }
            "AND" | "OR" if depth == 0 => clause = Some((upper.clone(), "  ")),
            _ => {}
        }

        match clause {
            Some((keyword, indent)) => {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                line.push_str(indent);
                line.push_str(&keyword);
            }
            None => {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(tok);
            }
        }

        depth += paren_delta(tok);
        i += consumed;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}
