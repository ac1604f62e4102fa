//! Property tests over generated trees and mutation sequences.

use proptest::prelude::*;
use proptest::sample::Index;
use std::cell::RefCell;
use std::rc::Rc;
use vault_core::{
    denormalize, normalize, normalize_with_report, EntityType, RestoreOptions, UndoHistory, Vault,
    VaultConfig,
};
use vault_testkit::prelude::*;
use vault_value::Value;

fn strict_config() -> VaultConfig {
    VaultConfig::default().reject_move_cycles(true)
}

fn loaded(tree: &Value) -> Vault {
    let mut vault = Vault::new(strict_config());
    vault.load(tree);
    vault
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn normalize_then_denormalize_is_lossless(tree in tree_strategy()) {
        let state = normalize(&tree);
        prop_assert_eq!(denormalize(&state), Some(expand_references(&tree)));
    }

    #[test]
    fn exported_tree_reloads_to_the_same_state(tree in tree_strategy()) {
        let state = normalize(&tree);
        let exported = denormalize(&state).unwrap();
        let (reloaded, report) = normalize_with_report(&exported);
        prop_assert!(report.is_clean(), "{:?}", report);
        prop_assert_eq!(&reloaded, &state);
    }

    #[test]
    fn record_trees_round_trip(tree in record_tree_strategy()) {
        let state = normalize(&tree);
        prop_assert_eq!(denormalize(&state), Some(tree));
    }

    #[test]
    fn json_text_round_trip(tree in tree_strategy()) {
        let text = tree.to_json_string(false).unwrap();
        let parsed = Value::from_json_str(&text).unwrap();
        prop_assert_eq!(denormalize(&normalize(&parsed)), Some(expand_references(&tree)));
    }

    #[test]
    fn every_entity_is_stored_once(tree in tree_strategy()) {
        let (state, report) = normalize_with_report(&tree);
        prop_assert!(report.is_clean());
        prop_assert!(check(&state).is_empty());
        let per_type: usize = EntityType::ALL.iter().map(|kind| state.count_of_type(*kind)).sum();
        prop_assert_eq!(per_type, state.len());
    }

    #[test]
    fn random_mutations_keep_invariants(
        tree in tree_strategy(),
        ops in vault_op_sequence_strategy(1, 40),
    ) {
        let mut runner = OpRunner::new(loaded(&tree));
        for op in &ops {
            runner.apply(op);
            let state = runner.vault.state();
            let violations: Vec<String> = check(state)
                .into_iter()
                .chain(check_acyclic(state))
                .map(|v| v.to_string())
                .collect();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);
        }
    }

    #[test]
    fn rejected_mutations_change_nothing(
        tree in tree_strategy(),
        ops in vault_op_sequence_strategy(1, 30),
    ) {
        let mut runner = OpRunner::new(loaded(&tree));
        let notified = Rc::new(RefCell::new(0u64));
        let counter = Rc::clone(&notified);
        runner.vault.subscribe(move |_| *counter.borrow_mut() += 1);

        for op in &ops {
            let before = runner.vault.snapshot();
            let sequence = runner.vault.latest_sequence();
            let calls = *notified.borrow();
            if let Some(Err(_)) = runner.apply(op) {
                prop_assert_eq!(runner.vault.state(), before.state());
                prop_assert_eq!(runner.vault.latest_sequence(), sequence);
                prop_assert_eq!(*notified.borrow(), calls);
            }
        }
    }

    #[test]
    fn listeners_see_increasing_sequences(
        tree in tree_strategy(),
        ops in vault_op_sequence_strategy(1, 30),
    ) {
        let mut runner = OpRunner::new(loaded(&tree));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        runner.vault.subscribe(move |event| sink.borrow_mut().push(event.sequence));
        runner.run(&ops);

        let seen = seen.borrow();
        prop_assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        if let Some(last) = seen.last() {
            prop_assert_eq!(*last, runner.vault.latest_sequence());
        }
    }

    #[test]
    fn trash_then_restore_is_identity(tree in tree_strategy(), target in any::<Index>()) {
        let mut vault = loaded(&tree);
        let mut ids: Vec<_> = EntityType::ALL
            .iter()
            .flat_map(|kind| vault.state().entities_of_type(*kind))
            .map(|entity| entity.id.clone())
            .collect();
        ids.sort();
        let id = ids[target.index(ids.len())].clone();
        let before = vault.state().clone();

        vault.move_to_trash(&id).unwrap();
        prop_assert!(vault.get(&id).is_none());
        prop_assert!(vault.is_trashed(&id));
        vault.restore_from_trash(&id, RestoreOptions::default()).unwrap();

        prop_assert_eq!(vault.state(), &before);
        prop_assert_eq!(vault.export(), Some(expand_references(&tree)));
    }

    #[test]
    fn trash_cascades_to_descendants(tree in tree_strategy(), target in any::<Index>()) {
        let mut vault = loaded(&tree);
        let mut records: Vec<_> = vault
            .state()
            .entities_of_type(EntityType::Record)
            .map(|entity| entity.id.clone())
            .collect();
        prop_assume!(!records.is_empty());
        records.sort();
        let id = records[target.index(records.len())].clone();
        let descendants = vault.get_descendants(&id);

        let captured = vault.move_to_trash(&id).unwrap();
        prop_assert_eq!(captured.len(), descendants.len() + 1);
        for descendant in &descendants {
            prop_assert!(vault.get(descendant).is_none());
            prop_assert!(vault.get_parent(descendant).is_none());
        }
        prop_assert!(vault.get_collections_containing(&id).is_empty());
        prop_assert!(check(vault.state()).is_empty());
    }

    #[test]
    fn undo_and_redo_replay_exports(
        tree in tree_strategy(),
        ops in vault_op_sequence_strategy(1, 20),
    ) {
        let mut runner = OpRunner::new(loaded(&tree));
        let mut history = UndoHistory::with_limit(ops.len());
        let initial = runner.vault.export();
        for op in &ops {
            history.checkpoint(&runner.vault);
            runner.apply(op);
        }
        let last = runner.vault.export();
        let last_state = runner.vault.state().clone();

        while history.undo(&mut runner.vault) {}
        prop_assert_eq!(runner.vault.export(), initial);

        while history.redo(&mut runner.vault) {}
        prop_assert_eq!(runner.vault.export(), last);
        prop_assert_eq!(runner.vault.state(), &last_state);
    }

    #[test]
    fn membership_sides_agree(
        tree in tree_strategy(),
        ops in vault_op_sequence_strategy(1, 30),
    ) {
        let mut runner = OpRunner::new(loaded(&tree));
        runner.run(&ops);
        let vault = &runner.vault;
        for grouping in vault.state().entities_of_type(EntityType::Grouping) {
            for member in vault.get_collection_members(&grouping.id) {
                prop_assert!(vault.get_collections_containing(member).contains(&grouping.id));
                prop_assert!(!vault.is_orphan(member));
            }
        }
    }
}
