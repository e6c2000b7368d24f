use super::{exit_codes, read_input};
use crate::cli::args::{OutputFormat, ParseArgs};
use ticketflow_core::model::Ticket;
use ticketflow_core::parser::{parse_batch, parse_ticket};

pub async fn run(args: ParseArgs) -> anyhow::Result<i32> {
    let text = read_input(&args.input).await?;
    let tickets = if args.batch {
        parse_batch(&text)
    } else {
        vec![parse_ticket(&text)?]
    };

    match args.format {
        OutputFormat::Json if args.batch => println!("{}", serde_json::to_string_pretty(&tickets)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tickets[0])?),
        OutputFormat::Text => {
            for (i, t) in tickets.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                print_ticket(t);
            }
        }
    }
    Ok(exit_codes::OK)
}

fn print_ticket(t: &Ticket) {
    println!("Ticket: {}", t.id);
    println!("Statements: {}", t.sql_statements.len());
    println!("Criteria: {}", t.criteria);
    println!("SQL:");
    for line in t.sql.lines() {
        println!("  {}", line);
    }
}
