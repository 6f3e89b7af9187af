//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Like counts per nominee (keyed by target id)
    pub const LIKE_TALLIES: &str = "like_tallies";
    /// Prediction ballots (keyed by voter id)
    pub const PREDICTIONS: &str = "predictions";
}
