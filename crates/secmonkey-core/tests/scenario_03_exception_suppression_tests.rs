/// Scenario 3: Collection failure suppresses deletion and change
///
/// A location covered by an exception at any prefix scope must appear in
/// neither `deleted` nor `changed`.
mod common;

use common::snap;
use proptest::prelude::*;
use secmonkey_core::errors::{ExError, ExErrorKind};
use secmonkey_core::{classify, ExceptionMap, ExceptionScope, Location};
use serde_json::json;

fn failure() -> ExError {
    ExError::new(ExErrorKind::CollectionFailed).with_message("UnauthorizedOperation")
}

#[test]
fn test_scenario_03_region_exception_blocks_deletion() {
    // GIVEN i-1 was seen previously
    let prev = vec![snap("ec2", "acctA", "us-east-1", "i-1", json!({}))];

    // AND collection failed for (ec2, acctA, us-east-1)
    let mut exceptions = ExceptionMap::new();
    exceptions.record(ExceptionScope::region("ec2", "acctA", "us-east-1"), &failure());

    // WHEN the current poll has nothing
    let out = classify(&prev, &[], &exceptions, &[]);

    // THEN i-1 is not deleted
    assert!(out.deleted.is_empty());
}

#[test]
fn test_scenario_03_exception_blocks_change_but_not_creation() {
    let prev = vec![snap("ec2", "acctA", "us-east-1", "i-1", json!({"v": 1}))];
    let curr = vec![
        snap("ec2", "acctA", "us-east-1", "i-1", json!({"v": 2})),
        snap("ec2", "acctA", "us-east-1", "i-2", json!({"v": 1})),
    ];

    let mut exceptions = ExceptionMap::new();
    exceptions.record(ExceptionScope::account("ec2", "acctA"), &failure());

    let out = classify(&prev, &curr, &exceptions, &[]);
    assert!(out.changed.is_empty());
    assert_eq!(out.created.len(), 1, "new sightings are never filtered");
}

fn scope_for(location: &Location, depth: usize) -> ExceptionScope {
    location.scopes()[depth].clone()
}

proptest! {
    #[test]
    fn prop_covered_location_never_deleted_or_changed(
        depth in 0usize..4,
        present_now in any::<bool>(),
        old_v in 0i64..5,
        new_v in 0i64..5,
    ) {
        let loc = Location::new("ec2", "acctA", "us-east-1", "i-1");
        let prev = vec![snap("ec2", "acctA", "us-east-1", "i-1", json!({"v": old_v}))];
        let curr = if present_now {
            vec![snap("ec2", "acctA", "us-east-1", "i-1", json!({"v": new_v}))]
        } else {
            Vec::new()
        };

        let mut exceptions = ExceptionMap::new();
        exceptions.record(scope_for(&loc, depth), &failure());

        let out = classify(&prev, &curr, &exceptions, &[]);
        prop_assert!(out.deleted.is_empty());
        prop_assert!(out.changed.is_empty());
        prop_assert!(out.ephemeral.is_empty());
    }
}
