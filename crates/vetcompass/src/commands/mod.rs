//! CLI command handlers.

pub mod search;
pub mod select;
pub mod start;

use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow, bail};
use clap::Args;
use vetcompass_client::{CodingSession, CodingSessionFactory, CodingSubject, Error, Outcome};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if given.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Build a session factory from the config file and environment.
    pub fn factory(&self) -> Result<CodingSessionFactory> {
        let config = vetcompass_config::load_client_config(self.config_path.as_deref())
            .context("failed to load client configuration")?;
        let resolved = config.resolve()?;
        tracing::debug!(config = ?resolved, "resolved client configuration");

        let mut builder = CodingSessionFactory::builder()
            .client_id(resolved.client_id)
            .shared_secret(resolved.shared_secret);
        if let Some(base_url) = resolved.base_url {
            builder = builder.base_url(base_url.as_str());
        }
        if let Some(timeout) = resolved.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Patient details sent when a session is created.
#[derive(Args, Debug, Default)]
pub struct SubjectArgs {
    /// Case number of the patient in your system
    #[arg(long)]
    pub case_number: Option<String>,

    /// Species name
    #[arg(long)]
    pub species: Option<String>,

    /// Breed name
    #[arg(long)]
    pub breed: Option<String>,

    /// VeNom species code
    #[arg(long)]
    pub species_code: Option<i32>,

    /// VeNom breed code
    #[arg(long)]
    pub breed_code: Option<i32>,
}

impl SubjectArgs {
    pub fn into_subject(self) -> CodingSubject {
        CodingSubject {
            case_number: self.case_number,
            species_name: self.species,
            breed_name: self.breed,
            venom_species_code: self.species_code,
            venom_breed_code: self.breed_code,
            ..Default::default()
        }
    }
}

/// Explain a request the session refused before sending it.
pub fn rejected(err: Error, session: &CodingSession, action: &str) -> anyhow::Error {
    if err.is_misuse() {
        anyhow!("{} rejected by {} session: {}", action, session.state(), err)
    } else {
        err.into()
    }
}

/// Unwrap an outcome, describing cancellation and failure for the user.
pub fn settle<T>(outcome: Outcome<T>, session: &CodingSession, action: &str) -> Result<T> {
    match outcome {
        Outcome::Success(value) => Ok(value),
        Outcome::Cancelled(reason) => bail!("{} cancelled: {}", action, reason),
        Outcome::Failed(failure) => match session
            .server_error_message()
            .or_else(|| failure.root_cause().server_body())
        {
            Some(message) => bail!("{} failed: {} ({})", action, failure, message),
            None => bail!("{} failed: {}", action, failure),
        },
    }
}
