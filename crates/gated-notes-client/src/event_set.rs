use std::collections::BTreeSet;

use dashmap::DashMap;
use gated_notes::{
    Event, KIND_ANNOUNCEMENT, KIND_GATED_NOTE, KIND_KEY_NOTE, TAG_GATE, TAG_GATE_LEGACY,
};

/// Events merged by id.
///
/// Safe to share between tasks feeding it from different subscriptions.
/// Announcements and key notes are indexed by the gated note they point at.
#[derive(Default)]
pub struct EventSet {
    events: DashMap<String, Event>,
    /// gated note id -> ids of events referencing it
    by_gate: DashMap<String, BTreeSet<String>>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless already present. Returns true for a new id.
    pub fn upsert(&self, event: Event) -> bool {
        let gate = event
            .tag_value(TAG_GATE)
            .or_else(|| event.tag_value(TAG_GATE_LEGACY))
            .map(String::from);
        let id = event.id.clone();

        let inserted = match self.events.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(event);
                true
            }
        };

        if inserted {
            if let Some(gate) = gate {
                self.by_gate.entry(gate).or_default().insert(id);
            }
        }
        inserted
    }

    /// Merge many events; returns how many were new.
    pub fn extend(&self, events: impl IntoIterator<Item = Event>) -> usize {
        events.into_iter().filter(|e| self.upsert(e.clone())).count()
    }

    pub fn get(&self, id: &str) -> Option<Event> {
        self.events.get(id).map(|e| e.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A stored gated note by id.
    pub fn gated_note(&self, id: &str) -> Option<Event> {
        self.get(id).filter(|e| e.kind == KIND_GATED_NOTE)
    }

    /// Events of `kind` pointing at `gated_note_id`, newest first.
    pub fn referencing(&self, gated_note_id: &str, kind: u32) -> Vec<Event> {
        let Some(ids) = self.by_gate.get(gated_note_id).map(|ids| ids.clone()) else {
            return Vec::new();
        };
        let mut found: Vec<Event> = ids
            .iter()
            .filter_map(|id| self.get(id))
            .filter(|e| e.kind == kind)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        found
    }

    pub fn announcements_for(&self, gated_note_id: &str) -> Vec<Event> {
        self.referencing(gated_note_id, KIND_ANNOUNCEMENT)
    }

    pub fn key_notes_for(&self, gated_note_id: &str) -> Vec<Event> {
        self.referencing(gated_note_id, KIND_KEY_NOTE)
    }

    /// All stored events of `kind`, newest first.
    pub fn of_kind(&self, kind: u32) -> Vec<Event> {
        let mut found: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        found
    }
}
