//! Start command - creates a coding session.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, SubjectArgs, rejected, settle};

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub subject: SubjectArgs,
}

#[derive(Debug, Serialize)]
struct StartOutput {
    session_id: String,
    session_url: String,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let factory = ctx.factory()?;
    let session = factory.start_coding_session(args.subject.into_subject(), None)?;

    let ready = session
        .ready()
        .map_err(|e| rejected(e, &session, "session creation"))?;
    settle(ready.await, &session, "session creation")?;

    let session_id = session.session_id().map(|id| id.to_string()).unwrap_or_default();
    if ctx.json_output {
        let output = StartOutput {
            session_id,
            session_url: session
                .session_url()
                .map(|u| u.to_string())
                .unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        println!("{} Session created: {}", green.apply_to("✓"), session_id);
        if ctx.verbose
            && let Some(url) = session.session_url()
        {
            println!("{}", Style::new().dim().apply_to(url));
        }
    }
    Ok(())
}
