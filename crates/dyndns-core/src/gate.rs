//! Per-family change detection
//!
//! A [`ChangeGate`] remembers the last propagated address of each family and
//! lets a candidate through only when it differs. Producers and the
//! reconciler each own an independent instance.

use crate::address::{Family, ObservedAddress};

/// Last-observed state, one slot per family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeGate {
    last_v4: Option<ObservedAddress>,
    last_v6: Option<ObservedAddress>,
}

impl ChangeGate {
    /// Create a gate with both slots unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `candidate` should be propagated
    ///
    /// Returns `true` and records the candidate when the slot for its family
    /// is unset or holds a different address. Returns `false` without
    /// touching the slot otherwise.
    pub fn should_propagate(&mut self, candidate: &ObservedAddress) -> bool {
        let slot = self.slot_mut(candidate.family());

        if slot.as_ref() == Some(candidate) {
            return false;
        }

        *slot = Some(*candidate);
        true
    }

    /// The last propagated address of a family
    pub fn last(&self, family: Family) -> Option<ObservedAddress> {
        match family {
            Family::V4 => self.last_v4,
            Family::V6 => self.last_v6,
        }
    }

    /// Clear one family's slot so its next observation propagates again
    ///
    /// Used by producers when an accepted address could not be handed off.
    pub fn reset(&mut self, family: Family) {
        *self.slot_mut(family) = None;
    }

    fn slot_mut(&mut self, family: Family) -> &mut Option<ObservedAddress> {
        match family {
            Family::V4 => &mut self.last_v4,
            Family::V6 => &mut self.last_v6,
        }
    }
}
