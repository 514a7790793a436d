//! Scratch artifacts
//!
//! Intermediate views (extracted luminance, masks) live in named slots for the
//! duration of a run. Every slot records the step that created it, and every
//! create and release is appended to a ledger, so a run can be checked for
//! leaked or double-released artifacts after the fact.

use std::collections::BTreeMap;

use crate::error::ScratchError;
use crate::host::ViewHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct ScratchEntry {
    pub view: ViewHandle,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Created { slot: String, view: String, step: String },
    Released { slot: String, view: String, step: String },
}

#[derive(Debug, Default)]
pub struct ScratchTable {
    slots: BTreeMap<String, ScratchEntry>,
    ledger: Vec<LedgerEvent>,
}

impl ScratchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `view` in `slot`. Fails if the slot is still held.
    pub fn insert(&mut self, slot: &str, view: ViewHandle, step: &str) -> Result<(), ScratchError> {
        if let Some(existing) = self.slots.get(slot) {
            return Err(ScratchError::SlotOccupied {
                slot: slot.to_string(),
                created_by: existing.created_by.clone(),
            });
        }

        self.ledger.push(LedgerEvent::Created {
            slot: slot.to_string(),
            view: view.id.clone(),
            step: step.to_string(),
        });
        self.slots.insert(
            slot.to_string(),
            ScratchEntry { view, created_by: step.to_string() },
        );
        Ok(())
    }

    pub fn get(&self, slot: &str) -> Result<&ViewHandle, ScratchError> {
        self.slots
            .get(slot)
            .map(|e| &e.view)
            .ok_or_else(|| ScratchError::NotFound { slot: slot.to_string() })
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// Empty `slot`, returning the view it held. The caller closes the view.
    pub fn release(&mut self, slot: &str, step: &str) -> Result<ViewHandle, ScratchError> {
        let entry = self
            .slots
            .remove(slot)
            .ok_or_else(|| ScratchError::NotFound { slot: slot.to_string() })?;

        self.ledger.push(LedgerEvent::Released {
            slot: slot.to_string(),
            view: entry.view.id.clone(),
            step: step.to_string(),
        });
        Ok(entry.view)
    }

    /// Release every held slot under `step`, returning what they held.
    pub fn drain(&mut self, step: &str) -> Vec<(String, ViewHandle)> {
        let slots = std::mem::take(&mut self.slots);
        slots
            .into_iter()
            .map(|(slot, entry)| {
                self.ledger.push(LedgerEvent::Released {
                    slot: slot.clone(),
                    view: entry.view.id.clone(),
                    step: step.to_string(),
                });
                (slot, entry.view)
            })
            .collect()
    }

    /// Slots still held, by name.
    pub fn outstanding(&self) -> Vec<(&str, &ScratchEntry)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    pub fn ledger(&self) -> &[LedgerEvent] {
        &self.ledger
    }

    /// Every artifact created so far was released exactly once.
    pub fn is_balanced(&self) -> bool {
        let created = self
            .ledger
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Created { .. }))
            .count();
        let released = self.ledger.len() - created;
        self.slots.is_empty() && created == released
    }

    /// Forget the ledger. Held slots are kept.
    pub fn clear_ledger(&mut self) {
        self.ledger.clear();
    }
}
