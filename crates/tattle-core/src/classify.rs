//! Session-close classification: folds the raw signal stream into at most
//! one webhook event per affected root instance.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::entity::{ChangeKind, Instance, Key, Signal};
use crate::registration::Registration;
use crate::store::{DataStore, EventSink, StoreError};

/// Classify the session's signals for one registration and emit the
/// resulting events.
///
/// Per root key: created+deleted in the same session cancel out; otherwise
/// deleted beats created beats updated, where each step of the chain only
/// claims the key if its kind is enabled. A deleted root with deletes
/// disabled therefore still surfaces as `updated`.
pub(crate) fn exec(
    registration: &Registration,
    signals: &VecDeque<Signal>,
    store: &dyn DataStore,
    sink: &dyn EventSink,
) {
    let mut latest: BTreeMap<Key, Instance> = BTreeMap::new();
    let mut created: HashSet<Key> = HashSet::new();
    let mut deleted: HashSet<Key> = HashSet::new();

    for signal in signals {
        if signal.instance.entity == *registration.root() {
            match signal.kind {
                ChangeKind::Created => {
                    created.insert(signal.key.clone());
                }
                ChangeKind::Deleted => {
                    deleted.insert(signal.key.clone());
                }
                ChangeKind::Updated => {}
            }
            record(&mut latest, signal.instance.clone());
            continue;
        }

        // Nested deletes were resolved eagerly at pre-delete time (the rows
        // needed to walk back to the root are gone by now); the resulting
        // root-updated signals are already in the stream.
        if signal.kind == ChangeKind::Deleted {
            continue;
        }

        let Some(query) = registration.getter(&signal.instance.entity) else {
            tracing::debug!(
                target: "tattle_classify",
                base_name = %registration.base_name(),
                entity = %signal.instance.entity,
                "No getter for signal entity; skipping"
            );
            continue;
        };

        match query.roots(store, registration.root(), &signal.instance) {
            Ok(roots) => {
                for root in roots {
                    record(&mut latest, root);
                }
            }
            Err(StoreError::StaleReference(reason)) => {
                tracing::warn!(
                    target: "tattle_classify",
                    base_name = %registration.base_name(),
                    entity = %signal.instance.entity,
                    key = %signal.key,
                    %reason,
                    "Signal entity vanished before classification; skipping"
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "tattle_classify",
                    base_name = %registration.base_name(),
                    entity = %signal.instance.entity,
                    key = %signal.key,
                    error = %err,
                    "Root lookup failed; skipping signal"
                );
            }
        }
    }

    for (key, instance) in &latest {
        let was_created = created.contains(key);
        let was_deleted = deleted.contains(key);
        // Created and deleted within one session: nothing observable happened.
        if was_created && was_deleted {
            continue;
        }
        let kind = if was_deleted && registration.kind_enabled(ChangeKind::Deleted) {
            Some(ChangeKind::Deleted)
        } else if was_created && registration.kind_enabled(ChangeKind::Created) {
            Some(ChangeKind::Created)
        } else if registration.kind_enabled(ChangeKind::Updated) {
            Some(ChangeKind::Updated)
        } else {
            None
        };
        if let Some(kind) = kind {
            registration.notify(kind, instance, sink);
        }
    }
}

/// Last write wins, except an owner cached before deletion survives being
/// overwritten by a snapshot that could no longer resolve one.
fn record(latest: &mut BTreeMap<Key, Instance>, instance: Instance) {
    match latest.entry(instance.key.clone()) {
        Entry::Occupied(mut entry) => {
            let previous_owner = entry.get().cached_owner;
            let slot = entry.get_mut();
            *slot = instance;
            if slot.cached_owner.is_none() {
                slot.cached_owner = previous_owner;
            }
        }
        Entry::Vacant(entry) => {
            entry.insert(instance);
        }
    }
}
