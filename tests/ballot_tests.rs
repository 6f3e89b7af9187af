// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prediction ballot validation and submission failure policy.

use awards_night::db::FirestoreDb;
use awards_night::error::AppError;
use awards_night::models::{Pick, PredictionBallot};

fn pick(category: &str, nominee: &str) -> Pick {
    Pick {
        category: category.to_string(),
        nominee: nominee.to_string(),
    }
}

#[test]
fn test_valid_ballot_passes() {
    let ballot = PredictionBallot::new(
        "1098765",
        vec![
            pick("best-demo", "Team Falcon"),
            pick("best-keynote", "Grace"),
        ],
    );
    assert!(ballot.check().is_ok());
}

#[test]
fn test_empty_ballot_rejected() {
    let ballot = PredictionBallot::new("1098765", vec![]);
    assert!(matches!(ballot.check(), Err(AppError::BadRequest(_))));
}

#[test]
fn test_missing_voter_rejected() {
    let ballot = PredictionBallot::new("", vec![pick("best-demo", "Team Falcon")]);
    assert!(matches!(ballot.check(), Err(AppError::BadRequest(_))));
}

#[test]
fn test_blank_pick_rejected() {
    let ballot = PredictionBallot::new("1098765", vec![pick("best-demo", "")]);
    assert!(matches!(ballot.check(), Err(AppError::BadRequest(_))));
}

#[test]
fn test_duplicate_category_rejected() {
    let ballot = PredictionBallot::new(
        "1098765",
        vec![
            pick("best-demo", "Team Falcon"),
            pick("best-demo", "Team Heron"),
        ],
    );
    let err = ballot.check().unwrap_err();
    assert!(err.to_string().contains("best-demo"));
    assert!(!err.is_retryable());
}

#[test]
fn test_pick_parses_from_cli_pair() {
    let parsed: Pick = " best-demo = Team Falcon ".parse().unwrap();
    assert_eq!(parsed, pick("best-demo", "Team Falcon"));

    assert!("best-demo".parse::<Pick>().is_err());
}

#[tokio::test]
async fn test_offline_submission_is_retryable() {
    let db = FirestoreDb::new_mock();
    let ballot = PredictionBallot::new("1098765", vec![pick("best-demo", "Team Falcon")]);

    let err = db.submit_prediction(&ballot).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_ballot_rejected_before_storage() {
    let db = FirestoreDb::new_mock();
    let ballot = PredictionBallot::new("1098765", vec![]);

    // Validation runs first, so the offline database is never reached.
    let err = db.submit_prediction(&ballot).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
