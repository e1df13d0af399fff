#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{address, fixtures};
use embedx_core::{
    apply_changes, cast, change, Action, CastOutcome, EmbedChange, EmbedInput, Embedded, Entity,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Distinct integer keys mapped to city names
fn arb_addresses() -> impl Strategy<Value = BTreeMap<i64, String>> {
    prop::collection::btree_map(0i64..1_000, "[a-zA-Z][a-zA-Z ]{0,11}", 0..8)
}

fn to_entities(addresses: &BTreeMap<i64, String>) -> Vec<Entity> {
    addresses
        .iter()
        .map(|(id, city)| address(json!(id), city))
        .collect()
}

fn to_params(addresses: &BTreeMap<i64, String>) -> Value {
    Value::Array(
        addresses
            .iter()
            .map(|(id, city)| json!({ "id": id, "city": city }))
            .collect(),
    )
}

fn changesets(change: &EmbedChange) -> Vec<(Action, usize)> {
    change
        .changesets()
        .map(|c| (c.action.unwrap(), c.changes.len()))
        .collect()
}

proptest! {
    #[test]
    fn identical_collections_change_to_unchanged_updates(addresses in arb_addresses()) {
        let fx = fixtures();
        let entities = to_entities(&addresses);
        let input = EmbedInput::from(&Embedded::Many(entities.clone()));

        let (aggregate, valid) =
            change(fx.addresses_relation(), input, &Embedded::Many(entities)).unwrap();

        prop_assert!(valid);
        prop_assert!(aggregate.is_noop());
        for (action, changes) in changesets(&aggregate) {
            prop_assert_eq!(action, Action::Update);
            prop_assert_eq!(changes, 0);
        }
    }

    #[test]
    fn identical_params_cast_to_unchanged_updates(addresses in arb_addresses()) {
        let fx = fixtures();
        let current = Embedded::Many(to_entities(&addresses));

        let outcome = cast(fx.addresses_relation(), &to_params(&addresses), &current).unwrap();

        match outcome {
            CastOutcome::Changed { change, valid } => {
                prop_assert!(valid);
                prop_assert_eq!(change.changesets().count(), addresses.len());
                for (action, changes) in changesets(&change) {
                    prop_assert_eq!(action, Action::Update);
                    prop_assert_eq!(changes, 0);
                }
            }
            CastOutcome::Invalid => prop_assert!(false, "well-formed params were rejected"),
        }
    }

    #[test]
    fn inserted_values_round_trip(addresses in arb_addresses()) {
        let fx = fixtures();
        let entities = to_entities(&addresses);
        let input = EmbedInput::Many(entities.iter().cloned().map(Into::into).collect());

        let (aggregate, _) =
            change(fx.addresses_relation(), input, &Embedded::Many(vec![])).unwrap();
        let applied = apply_changes(fx.addresses_relation(), &aggregate).unwrap();

        prop_assert_eq!(applied, Embedded::Many(entities));
    }

    #[test]
    fn deletions_follow_kept_entries(
        addresses in arb_addresses(),
        keep in prop::collection::vec(any::<bool>(), 8),
    ) {
        let fx = fixtures();
        let current = to_entities(&addresses);
        let kept: BTreeMap<i64, String> = addresses
            .iter()
            .zip(keep.iter())
            .filter(|(_, keep)| **keep)
            .map(|((id, city), _)| (*id, city.clone()))
            .collect();

        let (aggregate, _) = change(
            fx.addresses_relation(),
            EmbedInput::Many(to_entities(&kept).into_iter().map(Into::into).collect()),
            &Embedded::Many(current),
        )
        .unwrap();

        let actions: Vec<Action> = changesets(&aggregate).into_iter().map(|(a, _)| a).collect();
        let (updates, deletes) = actions.split_at(kept.len());
        prop_assert!(updates.iter().all(|a| *a == Action::Update));
        prop_assert!(deletes.iter().all(|a| *a == Action::Delete));
        prop_assert_eq!(deletes.len(), addresses.len() - kept.len());
    }
}
