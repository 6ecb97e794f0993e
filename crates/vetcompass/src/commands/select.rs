//! Select command - records the code the user chose.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;
use uuid::Uuid;
use vetcompass_client::{CodingSubject, Selection};

use super::{Context, rejected, settle};

/// Arguments for the select command.
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Session the search was made in
    pub session_id: Uuid,

    /// Search expression at the time of selection
    pub expression: String,

    /// VeNom id of the chosen code
    pub venom_id: i32,
}

/// Run the select command.
pub async fn run(args: SelectArgs, ctx: &Context) -> Result<()> {
    let selection = Selection::new(args.expression, args.venom_id)?;

    let factory = ctx.factory()?;
    let session =
        factory.resume_coding_session(CodingSubject::default(), args.session_id, None)?;

    let pending = session
        .register_selection(selection)
        .map_err(|e| rejected(e, &session, "selection"))?;
    settle(pending.await, &session, "selection")?;

    if ctx.json_output {
        let output = json!({
            "session_id": args.session_id.to_string(),
            "venom_id": args.venom_id,
            "recorded": true,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        println!(
            "{} Selection {} recorded",
            green.apply_to("✓"),
            args.venom_id
        );
    }
    Ok(())
}
