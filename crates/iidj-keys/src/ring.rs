//! The two-slot key ring and its rotation predicates.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::keypair::KeyPair;

/// One of the two fixed key ring slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::A, Slot::B];

    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// Name of the slot in the persisted key file.
    pub fn file_key(self) -> &'static str {
        match self {
            Slot::A => "Key-A",
            Slot::B => "Key-B",
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_key())
    }
}

/// Exactly two key slots plus the designator of the one used for signing.
///
/// The next slot is always the other slot, so `current != next` holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    slots: [Option<KeyPair>; 2],
    current: Slot,
}

impl KeyRing {
    /// Fresh ring: `first` in slot A as current, slot B empty.
    pub fn bootstrap(first: KeyPair) -> Self {
        Self {
            slots: [Some(first), None],
            current: Slot::A,
        }
    }

    /// Rebuild a ring from persisted slots as seen at `now`.
    ///
    /// The file stores no designator. A newer key in the other slot only
    /// becomes current after the older key's rotate threshold, so before
    /// that point the newer key is still the pending successor. Ties and a
    /// missing slot B resolve to slot A. Returns `None` when both slots are
    /// empty.
    pub fn from_slots(
        a: Option<KeyPair>,
        b: Option<KeyPair>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let current = match (&a, &b) {
            (None, None) => return None,
            (Some(_), None) => Slot::A,
            (None, Some(_)) => Slot::B,
            (Some(ka), Some(kb)) if ka.issued_at == kb.issued_at => Slot::A,
            (Some(ka), Some(kb)) => {
                let (older, older_key) = if ka.issued_at < kb.issued_at {
                    (Slot::A, ka)
                } else {
                    (Slot::B, kb)
                };
                if now > rotate_after(older_key) {
                    older.other()
                } else {
                    older
                }
            }
        };
        Some(Self {
            slots: [a, b],
            current,
        })
    }

    pub fn current_slot(&self) -> Slot {
        self.current
    }

    pub fn next_slot(&self) -> Slot {
        self.current.other()
    }

    pub fn get(&self, slot: Slot) -> Option<&KeyPair> {
        self.slots[slot.index()].as_ref()
    }

    /// The key pair used for new signatures. Always populated.
    pub fn current(&self) -> &KeyPair {
        match self.get(self.current) {
            Some(kp) => kp,
            // The designator only ever points at a populated slot.
            None => unreachable!("current slot {} is empty", self.current),
        }
    }

    pub fn next(&self) -> Option<&KeyPair> {
        self.get(self.next_slot())
    }

    /// Populated key pairs, current first.
    pub fn key_pairs(&self) -> impl Iterator<Item = &KeyPair> {
        [self.current_slot(), self.next_slot()]
            .into_iter()
            .filter_map(|slot| self.get(slot))
    }

    /// Overwrite the next slot with a freshly generated key pair.
    pub fn replace_next(&mut self, key_pair: KeyPair) {
        let slot = self.next_slot();
        self.slots[slot.index()] = Some(key_pair);
    }

    /// Swap designators: next becomes current. No-op returning `false` when
    /// the next slot is empty.
    pub fn swap(&mut self) -> bool {
        if self.next().is_none() {
            return false;
        }
        self.current = self.current.other();
        true
    }

    /// True once the current key is past half of its lifetime and the next
    /// slot has not been refreshed since the current key was issued.
    pub fn should_prepare_next(&self, now: DateTime<Utc>) -> bool {
        let cur = self.current();
        let renew_after = cur.expires_at - cur.lifetime() / 2;
        debug!(slot = %self.current, %renew_after, "prepare threshold");

        let next_is_stale = match self.next() {
            Some(next) => cur.issued_at >= next.issued_at,
            None => true,
        };
        now > renew_after && next_is_stale
    }

    /// True once the current key is past five sixths of its lifetime and a
    /// successor issued after it is waiting in the next slot.
    pub fn should_rotate(&self, now: DateTime<Utc>) -> bool {
        let cur = self.current();
        let threshold = rotate_after(cur);
        debug!(slot = %self.current, rotate_after = %threshold, "rotate threshold");

        let successor_ready = self
            .next()
            .is_some_and(|next| next.issued_at > cur.issued_at);
        now > threshold && successor_ready
    }
}

/// Point after which a key should hand over to its successor.
fn rotate_after(key_pair: &KeyPair) -> DateTime<Utc> {
    key_pair.expires_at - key_pair.lifetime() / 6
}
