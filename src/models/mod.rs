// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod ballot;
pub mod session;
pub mod tally;

pub use ballot::{Pick, PredictionBallot};
pub use session::{SessionState, SessionToken, UserProfile};
pub use tally::LikeTally;
