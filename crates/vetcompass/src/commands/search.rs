//! Search command - queries a coding session.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use uuid::Uuid;
use vetcompass_client::Query;

use super::{Context, SubjectArgs, rejected, settle};

/// Arguments for the search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search expression
    pub expression: String,

    /// Search within an existing session instead of creating one
    #[arg(short, long)]
    pub session: Option<Uuid>,

    /// Number of hits to skip
    #[arg(long)]
    pub skip: Option<u32>,

    /// Number of hits to return (server default 10, max 100)
    #[arg(short, long)]
    pub take: Option<u32>,

    /// Restrict results to these subset ids (repeatable)
    #[arg(long = "subset")]
    pub subsets: Vec<u32>,

    #[command(flatten)]
    pub subject: SubjectArgs,
}

/// Run the search command.
pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let mut query = Query::new(args.expression)?;
    if let Some(skip) = args.skip {
        query = query.with_skip(skip);
    }
    if let Some(take) = args.take {
        query = query.with_take(take);
    }
    if !args.subsets.is_empty() {
        query = query.with_subsets(args.subsets);
    }

    let factory = ctx.factory()?;
    let subject = args.subject.into_subject();
    let session = match args.session {
        Some(id) => factory.resume_coding_session(subject, id, None)?,
        None => factory.start_coding_session(subject, None)?,
    };

    let pending = session
        .query_async(query)
        .map_err(|e| rejected(e, &session, "search"))?;
    let response = settle(pending.await, &session, "search")?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!(
        "{} {}",
        style("Results for").bold(),
        style(response.query.search_expression()).bold().cyan()
    );
    if let Some(id) = session.session_id() {
        println!("{}", dim.apply_to(format!("session {}", id)));
    }
    println!("{}", dim.apply_to("─".repeat(50)));

    if response.results.is_empty() {
        println!("{}", dim.apply_to("No codes found"));
    } else {
        for code in &response.results {
            println!(
                "{:>8}  {}  {}",
                style(code.venom_id).yellow(),
                code.name,
                dim.apply_to(&code.subset)
            );
        }
    }

    if let Some(suggestion) = &response.suggested_search_expression {
        println!();
        println!("{} {}", dim.apply_to("Did you mean:"), suggestion);
    }
    Ok(())
}
