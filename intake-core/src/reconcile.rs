//! Identifier Reconciliation
//!
//! The datastore assigns its own identifiers. While a submission attempt
//! writes Owners and Properties, each local id is recorded against the
//! server id it received; Assignments are then written with the server ids
//! resolved through this map.
//!
//! A map lives for exactly one attempt. A retry may create new rows with new
//! ids, so a map must never be carried over.

use crate::error::{IntakeError, IntakeResult};
use crate::types::{EntityKind, LocalId, ServerId};
use std::collections::BTreeMap;

/// Per-attempt local id -> server id map, one namespace per entity kind
#[derive(Debug, Default, Clone)]
pub struct ReconciliationMap {
    entries: BTreeMap<(EntityKind, LocalId), ServerId>,
}

impl ReconciliationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the server id a local entity received
    ///
    /// Recording the same pair twice is a no-op; mapping a local id to a
    /// second, different server id fails with `DuplicateMapping`.
    pub fn record(&mut self, kind: EntityKind, local_id: LocalId, server_id: ServerId) -> IntakeResult<()> {
        match self.entries.get(&(kind, local_id.clone())) {
            Some(existing) if existing == &server_id => Ok(()),
            Some(existing) => Err(IntakeError::DuplicateMapping {
                kind,
                local_id: local_id.0,
                existing: existing.0.clone(),
                attempted: server_id.0,
            }),
            None => {
                self.entries.insert((kind, local_id), server_id);
                Ok(())
            }
        }
    }

    /// Resolve a local id to its server id
    pub fn resolve(&self, kind: EntityKind, local_id: &LocalId) -> IntakeResult<&ServerId> {
        self.entries
            .get(&(kind, local_id.clone()))
            .ok_or_else(|| IntakeError::UnresolvedReference {
                kind,
                local_id: local_id.0.clone(),
            })
    }

    /// Reverse lookup
    pub fn local_for(&self, kind: EntityKind, server_id: &ServerId) -> Option<&LocalId> {
        self.entries
            .iter()
            .find(|((k, _), s)| *k == kind && *s == server_id)
            .map(|((_, local), _)| local)
    }

    /// All mappings of one kind, ordered by local id
    pub fn mappings(&self, kind: EntityKind) -> Vec<(LocalId, ServerId)> {
        self.entries
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, local), server)| (local.clone(), server.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_resolve() {
        let mut map = ReconciliationMap::new();
        map.record(EntityKind::Owner, "o1".into(), "srv-1".into()).unwrap();
        assert_eq!(
            map.resolve(EntityKind::Owner, &"o1".into()).unwrap(),
            &ServerId::new("srv-1")
        );
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut map = ReconciliationMap::new();
        map.record(EntityKind::Owner, "x".into(), "owner-row".into()).unwrap();
        map.record(EntityKind::Property, "x".into(), "property-row".into()).unwrap();

        assert_eq!(map.resolve(EntityKind::Owner, &"x".into()).unwrap().as_str(), "owner-row");
        assert_eq!(
            map.resolve(EntityKind::Property, &"x".into()).unwrap().as_str(),
            "property-row"
        );
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_same_mapping_twice_is_noop() {
        let mut map = ReconciliationMap::new();
        map.record(EntityKind::Owner, "o1".into(), "srv-1".into()).unwrap();
        map.record(EntityKind::Owner, "o1".into(), "srv-1".into()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_conflicting_mapping_rejected() {
        let mut map = ReconciliationMap::new();
        map.record(EntityKind::Property, "p1".into(), "srv-1".into()).unwrap();
        let err = map
            .record(EntityKind::Property, "p1".into(), "srv-2".into())
            .unwrap_err();
        assert!(matches!(err, IntakeError::DuplicateMapping { .. }));
        assert_eq!(
            map.resolve(EntityKind::Property, &"p1".into()).unwrap().as_str(),
            "srv-1"
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let map = ReconciliationMap::new();
        let err = map.resolve(EntityKind::Owner, &"missing".into()).unwrap_err();
        assert_eq!(
            err,
            IntakeError::UnresolvedReference {
                kind: EntityKind::Owner,
                local_id: "missing".into(),
            }
        );
    }

    #[test]
    fn test_reverse_lookup_and_listing() {
        let mut map = ReconciliationMap::new();
        map.record(EntityKind::Owner, "o2".into(), "srv-b".into()).unwrap();
        map.record(EntityKind::Owner, "o1".into(), "srv-a".into()).unwrap();
        assert_eq!(
            map.local_for(EntityKind::Owner, &"srv-b".into()),
            Some(&LocalId::new("o2"))
        );
        assert_eq!(map.local_for(EntityKind::Property, &"srv-b".into()), None);
        let owners = map.mappings(EntityKind::Owner);
        assert_eq!(owners[0].0.as_str(), "o1");
        assert_eq!(owners[1].1.as_str(), "srv-b");
    }
}
