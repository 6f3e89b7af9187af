// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session and aggregation logic.

pub mod aggregator;
pub mod identity;
pub mod session;

pub use aggregator::{AggregatorPhase, CountSink, DebouncedAggregator, FlushOutcome};
pub use identity::IdentityClient;
pub use session::{parse_redirect_fragment, RedirectFragment, SessionManager, Subscription};
