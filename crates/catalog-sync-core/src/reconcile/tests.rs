use super::*;
use catalog_sync_models::{LookupRecord, RemoteEntry, TmdbMediaType, TmdbRecord};

fn local(entries: &[(&str, Option<&str>)]) -> OrderedCache<LookupRecord> {
    entries
        .iter()
        .map(|(key, id)| {
            let record = match id {
                Some(id) => LookupRecord::with_id(*id),
                None => LookupRecord::default(),
            };
            (TitleKey::from(*key), record)
        })
        .collect()
}

fn remote(entries: &[(&str, &str, &str)]) -> RemoteIdCache {
    entries
        .iter()
        .map(|(key, item_id, external_id)| (TitleKey::from(*key), RemoteEntry::new(*item_id, *external_id)))
        .collect()
}

fn keys(raw: &[&str]) -> Vec<TitleKey> {
    raw.iter().map(|k| TitleKey::from(*k)).collect()
}

/// Fold a plan into a copy of the remote cache as if every call succeeded
fn apply_plan_in_memory(plan: &SyncPlan, remote: &RemoteIdCache) -> RemoteIdCache {
    let mut applied = remote.clone();
    for op in &plan.to_remove {
        applied.remove(&op.key);
    }
    for item in &plan.to_add {
        let item_id = format!("li-{}", item.key);
        applied.insert(item.key.clone(), RemoteEntry::new(item_id, item.external_id.clone()));
    }
    for step in &plan.to_reorder {
        if let Some(entry) = applied.get(&step.key).cloned() {
            applied.insert_at(step.position - 1, step.key.clone(), entry);
        }
    }
    applied
}

#[test]
fn test_new_local_title_is_added_only() {
    let local = local(&[("Movie|2020", Some("tt1")), ("Movie2|2021", Some("tt2"))]);
    let remote = remote(&[("Movie|2020", "li1", "tt1")]);

    let plan = reconcile(&local, &remote);
    assert!(plan.to_remove.is_empty());
    assert_eq!(
        plan.to_add,
        vec![AddRequest {
            key: TitleKey::from("Movie2|2021"),
            external_id: "tt2".to_string(),
        }]
    );
    assert!(plan.to_reorder.is_empty());
}

#[test]
fn test_title_gone_from_local_is_deleted() {
    let local = local(&[("B|2020", Some("tt2"))]);
    let remote = remote(&[("A|2019", "li1", "tt1"), ("B|2020", "li2", "tt2")]);

    let plan = reconcile(&local, &remote);
    let ids: Vec<&str> = plan.to_remove.iter().map(|op| op.remote_item_id.as_str()).collect();
    assert_eq!(ids, vec!["li1"]);
    assert!(!plan.to_remove[0].changed);
    assert!(plan.to_add.is_empty());
}

#[test]
fn test_matching_caches_yield_empty_plan() {
    let local = local(&[("A|2019", Some("tt1")), ("B|2020", Some("tt2"))]);
    let remote = remote(&[("A|2019", "li1", "tt1"), ("B|2020", "li2", "tt2")]);

    let plan = reconcile(&local, &remote);
    assert!(plan.is_empty());
    assert!(plan.unresolved.is_empty());
}

#[test]
fn test_changed_id_is_removed_then_added() {
    let local = local(&[("A|2019", Some("tt9")), ("B|2020", Some("tt2"))]);
    let remote = remote(&[("A|2019", "li1", "tt1"), ("B|2020", "li2", "tt2")]);

    let plan = reconcile(&local, &remote);
    assert_eq!(plan.to_remove.len(), 1);
    assert_eq!(plan.to_remove[0].remote_item_id, "li1");
    assert!(plan.to_remove[0].changed);
    assert_eq!(plan.to_add.len(), 1);
    assert_eq!(plan.to_add[0].external_id, "tt9");
    assert_eq!(plan.changed_keys().collect::<Vec<_>>(), vec![&TitleKey::from("A|2019")]);

    // A goes back to the top once it has been re-added at the end
    assert_eq!(
        plan.to_reorder,
        vec![ReorderStep {
            key: TitleKey::from("A|2019"),
            position: 1,
        }]
    );
}

#[test]
fn test_removed_keys_precede_changed_keys() {
    let local = local(&[("B|2020", Some("tt22"))]);
    let remote = remote(&[("B|2020", "li2", "tt2"), ("A|2019", "li1", "tt1")]);

    let plan = reconcile(&local, &remote);
    let removed: Vec<&str> = plan.to_remove.iter().map(|op| op.key.as_str()).collect();
    assert_eq!(removed, vec!["A|2019", "B|2020"]);
}

#[test]
fn test_missing_keys_follow_local_order() {
    let local = local(&[("C|", Some("tt3")), ("A|", Some("tt1")), ("B|", Some("tt2"))]);
    let plan = reconcile(&local, &RemoteIdCache::new());

    let added: Vec<&str> = plan.to_add.iter().map(|item| item.key.as_str()).collect();
    assert_eq!(added, vec!["C|", "A|", "B|"]);
    assert!(plan.to_reorder.is_empty());
}

#[test]
fn test_local_record_without_id_is_unresolved() {
    let local = local(&[("A|2019", None), ("B|2020", Some("tt2"))]);
    let plan = reconcile(&local, &RemoteIdCache::new());

    assert_eq!(plan.unresolved, keys(&["A|2019"]));
    assert_eq!(plan.to_add.len(), 1);
}

#[test]
fn test_remote_entry_whose_local_record_lost_its_id_is_removed() {
    let local = local(&[("A|2019", None)]);
    let remote = remote(&[("A|2019", "li1", "tt1")]);

    let plan = reconcile(&local, &remote);
    assert_eq!(plan.to_remove.len(), 1);
    assert!(plan.to_add.is_empty());
    assert_eq!(plan.unresolved, keys(&["A|2019"]));
}

#[test]
fn test_new_release_moves_to_top() {
    let local = local(&[("New|2024", Some("tt4")), ("A|2019", Some("tt1")), ("B|2020", Some("tt2"))]);
    let remote = remote(&[("A|2019", "li1", "tt1"), ("B|2020", "li2", "tt2")]);

    let plan = reconcile(&local, &remote);
    assert_eq!(
        plan.to_reorder,
        vec![ReorderStep {
            key: TitleKey::from("New|2024"),
            position: 1,
        }]
    );
}

#[test]
fn test_reconcile_is_idempotent_after_applying_plan() {
    let local = local(&[
        ("E|2024", Some("tt5")),
        ("A|2019", Some("tt10")),
        ("C|2021", Some("tt3")),
        ("X|", None),
        ("B|2020", Some("tt2")),
    ]);
    let remote = remote(&[
        ("B|2020", "li2", "tt2"),
        ("D|2018", "li4", "tt4"),
        ("A|2019", "li1", "tt1"),
        ("C|2021", "li3", "tt3"),
    ]);

    let plan = reconcile(&local, &remote);
    assert!(!plan.is_empty());
    let applied = apply_plan_in_memory(&plan, &remote);

    let order: Vec<&str> = applied.keys().map(|k| k.as_str()).collect();
    assert_eq!(order, vec!["E|2024", "A|2019", "C|2021", "B|2020"]);

    let second = reconcile(&local, &applied);
    assert!(second.is_empty(), "second pass planned {:?}", second);
    assert_eq!(second.unresolved, keys(&["X|"]));
}

#[test]
fn test_plan_reorder_matching_order_is_stable() {
    let order = keys(&["A|", "B|", "C|"]);
    assert!(plan_reorder(&order, &order).is_empty());
}

#[test]
fn test_plan_reorder_moves_one_per_displaced_key() {
    let canonical = keys(&["A|", "B|", "C|", "D|"]);
    let current = keys(&["B|", "C|", "D|", "A|"]);
    let steps = plan_reorder(&canonical, &current);
    assert_eq!(
        steps,
        vec![ReorderStep {
            key: TitleKey::from("A|"),
            position: 1,
        }]
    );

    let reversed = keys(&["D|", "C|", "B|", "A|"]);
    let steps = plan_reorder(&canonical, &reversed);
    let positions: Vec<(&str, usize)> = steps.iter().map(|s| (s.key.as_str(), s.position)).collect();
    assert_eq!(positions, vec![("A|", 1), ("B|", 2), ("C|", 3)]);
}

#[test]
fn test_plan_reorder_ignores_keys_not_on_remote() {
    let canonical = keys(&["New|", "A|", "B|"]);
    let current = keys(&["A|", "B|"]);
    assert!(plan_reorder(&canonical, &current).is_empty());
}

#[test]
fn test_tmdb_records_reconcile_on_media_type_and_id() {
    let mut local = OrderedCache::new();
    local.insert(TitleKey::from("Matrix|1999"), TmdbRecord::new(603, TmdbMediaType::Movie, "tt0133093"));
    let remote = remote(&[("Matrix|1999", "movie:603", "movie:603")]);

    assert!(reconcile(&local, &remote).is_empty());

    let mut moved = local.clone();
    moved.insert(TitleKey::from("Matrix|1999"), TmdbRecord::new(603, TmdbMediaType::Tv, "tt0133093"));
    let plan = reconcile(&moved, &remote);
    assert_eq!(plan.to_add[0].external_id, "tv:603");
}

#[test]
fn test_validate_rejects_plan_for_other_caches() {
    let local = local(&[("B|2020", Some("tt2"))]);
    let remote = remote(&[("A|2019", "li1", "tt1")]);
    let plan = reconcile(&local, &remote);
    assert!(plan.validate(&remote).is_ok());

    let err = plan.validate(&RemoteIdCache::new()).unwrap_err();
    assert!(matches!(err, SyncError::InvariantViolation(_)));

    let mut foreign = plan.clone();
    foreign.canonical.clear();
    assert!(foreign.validate(&remote).is_err());
}
