//! Request and response types for the coding service.
//!
//! Field names are serialized in PascalCase to match the service contract.
//! Responses are also accepted in camelCase.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Subject
// ─────────────────────────────────────────────────────────────────────────────

/// The patient being coded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodingSubject {
    /// Your system's unique identifier for the patient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    /// VeNom breed code, if known.
    #[serde(
        default,
        rename = "VeNomBreedCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub venom_breed_code: Option<i32>,
    /// Breed name in your system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed_name: Option<String>,
    /// VeNom species code, if known.
    #[serde(
        default,
        rename = "VeNomSpeciesCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub venom_species_code: Option<i32>,
    /// Species name in your system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_name: Option<String>,
    /// Whether the patient is female.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_female: Option<bool>,
    /// Whether the patient has been neutered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_neutered: Option<bool>,
    /// Approximate date of birth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_date_of_birth: Option<DateTime<Utc>>,
    /// Post code without its final two characters (UK patients).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_post_code: Option<String>,
}

impl CodingSubject {
    /// Create a subject with just a case number.
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: Some(case_number.into()),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query
// ─────────────────────────────────────────────────────────────────────────────

/// A search against a coding session.
///
/// The search expression is validated on construction and cannot be empty or
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Query {
    #[serde(alias = "searchExpression", deserialize_with = "non_blank")]
    search_expression: String,
    /// Hits to skip at the start of the results (server default 0).
    #[serde(default, alias = "skip", skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Hits to take (server default 10, max 100).
    #[serde(default, alias = "take", skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
    /// Subsets to filter by; see [`subsets`]. All but Modelling when empty.
    #[serde(
        default,
        alias = "filterSubset",
        skip_serializing_if = "Option::is_none"
    )]
    pub filter_subset: Option<BTreeSet<u32>>,
}

impl Query {
    /// Create a query.
    ///
    /// Returns [`Error::Validation`] if `search_expression` is blank.
    pub fn new(search_expression: impl Into<String>) -> Result<Self> {
        let search_expression = search_expression.into();
        validate_expression(&search_expression, "SearchExpression")?;
        Ok(Self {
            search_expression,
            skip: None,
            take: None,
            filter_subset: None,
        })
    }

    /// The search expression.
    pub fn search_expression(&self) -> &str {
        &self.search_expression
    }

    /// Replace the search expression, validating it.
    pub fn set_search_expression(&mut self, search_expression: impl Into<String>) -> Result<()> {
        let search_expression = search_expression.into();
        validate_expression(&search_expression, "SearchExpression")?;
        self.search_expression = search_expression;
        Ok(())
    }

    /// Set the number of hits to skip.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the number of hits to take.
    pub fn with_take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }

    /// Restrict results to the given subsets.
    pub fn with_subsets(mut self, subsets: impl IntoIterator<Item = u32>) -> Self {
        self.filter_subset = Some(subsets.into_iter().collect());
        self
    }
}

/// A code matched by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VetCompassCode {
    /// VeNom id of the code.
    #[serde(rename = "VeNomId", alias = "veNomId")]
    pub venom_id: i32,
    /// Display name.
    #[serde(alias = "name")]
    pub name: String,
    /// Name of the subset the code belongs to.
    #[serde(default, alias = "subset")]
    pub subset: String,
}

/// The service's answer to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResponse {
    /// The query this responds to.
    #[serde(alias = "query")]
    pub query: Query,
    /// Matches, best first.
    #[serde(default, alias = "results")]
    pub results: Vec<VetCompassCode>,
    /// An alternative search expression suggested by the service.
    #[serde(
        default,
        alias = "suggestedSearchExpression",
        skip_serializing_if = "Option::is_none"
    )]
    pub suggested_search_expression: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// A code the user picked from a set of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Selection {
    #[serde(alias = "searchExpression", deserialize_with = "non_empty")]
    search_expression: String,
    /// VeNom id of the chosen code.
    #[serde(rename = "VeNomId", alias = "veNomId")]
    pub venom_id: i32,
}

impl Selection {
    /// Create a selection.
    ///
    /// `search_expression` is what was in the search box when the user chose;
    /// it must not be empty.
    pub fn new(search_expression: impl Into<String>, venom_id: i32) -> Result<Self> {
        let search_expression = search_expression.into();
        if search_expression.is_empty() {
            return Err(Error::Validation("searchExpression must not be empty".into()));
        }
        Ok(Self {
            search_expression,
            venom_id,
        })
    }

    /// The search expression at the time of selection.
    pub fn search_expression(&self) -> &str {
        &self.search_expression
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subsets
// ─────────────────────────────────────────────────────────────────────────────

/// Subset identifiers for [`Query::with_subsets`].
pub mod subsets {
    // clinic
    pub const DIAGNOSIS: u32 = 14;
    pub const MORBIDITY_MORTALITY: u32 = 7;
    pub const PRESENTING_COMPLAINT: u32 = 18;
    pub const PHYSICAL_EXAMINATION: u32 = 17;
    pub const CORE_HISTORY: u32 = 6;

    // signalment
    pub const SPECIES: u32 = 2;
    pub const CANINE_BREED: u32 = 1;
    pub const FELINE_BREED: u32 = 9;
    pub const RABBIT_BREED: u32 = 3;

    // admin
    pub const REASON_FOR_VISIT: u32 = 16;
    pub const ADMINISTRATIVE_TASK: u32 = 15;

    // tests and procedures
    pub const DIAGNOSTIC_TEST: u32 = 11;
    pub const RADIOLOGY: u32 = 10;
    pub const ULTRASONOGRAPHY: u32 = 5;
    pub const PROCEDURE: u32 = 4;

    /// Internal use; excluded from results unless asked for.
    pub const MODELLING: u32 = 13;
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

fn validate_expression(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be blank", field)));
    }
    Ok(())
}

fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        return Err(serde::de::Error::custom("SearchExpression must not be blank"));
    }
    Ok(value)
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(serde::de::Error::custom("SearchExpression must not be empty"));
    }
    Ok(value)
}
