// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prediction ballot model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::AppError;

/// One predicted winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Pick {
    #[validate(length(min = 1, max = 128))]
    pub category: String,
    #[validate(length(min = 1, max = 128))]
    pub nominee: String,
}

/// A voter's full set of predictions.
///
/// Stored at: `predictions/{voter_id}`; resubmitting replaces the ballot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PredictionBallot {
    #[validate(length(min = 1, max = 128))]
    pub voter_id: String,
    #[validate(length(min = 1))]
    pub picks: Vec<Pick>,
    /// Submission timestamp (ISO 8601)
    #[serde(default)]
    pub submitted_at: String,
}

impl PredictionBallot {
    pub fn new(voter_id: impl Into<String>, picks: Vec<Pick>) -> Self {
        Self {
            voter_id: voter_id.into(),
            picks,
            submitted_at: String::new(),
        }
    }

    /// Full validation: field lengths, every pick, one pick per category.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        let mut seen = HashSet::new();
        for pick in &self.picks {
            pick.validate()?;
            if !seen.insert(pick.category.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "duplicate pick for category {}",
                    pick.category
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Pick {
    type Err = AppError;

    /// Parse `category=nominee`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, nominee) = s
            .split_once('=')
            .ok_or_else(|| AppError::BadRequest(format!("expected category=nominee, got {s:?}")))?;
        Ok(Pick {
            category: category.trim().to_string(),
            nominee: nominee.trim().to_string(),
        })
    }
}
