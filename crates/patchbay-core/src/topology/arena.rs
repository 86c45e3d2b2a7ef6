//! Generation-checked slot storage for channels and buffer-chain ranges.
//!
//! Every [`AudioUnit`](crate::AudioUnit) owns two arenas: one for channel nodes
//! and one for buffer-chain ranges. Handles are `Copy` keys carrying the owning
//! unit, a slot index, and the slot generation at insertion time. Removing a
//! value bumps the slot generation, so a handle kept past its target's release
//! resolves to `None` instead of silently pointing at whatever reuses the slot.

use std::collections::TryReserveError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_UNIT_ID: AtomicU32 = AtomicU32::new(0);

/// Identifies one audio unit for the lifetime of the process.
///
/// Unit IDs are assigned sequentially and never reused. Every channel and range
/// handle records the unit that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

/// Key types stored in an [`Arena`].
pub(crate) trait ArenaKey: Copy {
    fn from_parts(unit: UnitId, slot: u32, generation: u32) -> Self;
    fn parts(self) -> (UnitId, u32, u32);
}

macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            unit: UnitId,
            slot: u32,
            generation: u32,
        }

        impl $name {
            /// Returns the unit that issued this handle.
            #[inline]
            pub fn unit(self) -> UnitId {
                self.unit
            }

            /// Returns the raw slot index. Slots are reused after release.
            #[inline]
            pub fn slot(self) -> u32 {
                self.slot
            }
        }

        impl ArenaKey for $name {
            #[inline]
            fn from_parts(unit: UnitId, slot: u32, generation: u32) -> Self {
                Self {
                    unit,
                    slot,
                    generation,
                }
            }

            #[inline]
            fn parts(self) -> (UnitId, u32, u32) {
                (self.unit, self.slot, self.generation)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}({}:{}v{})",
                    $label, self.unit.0, self.slot, self.generation
                )
            }
        }
    };
}

arena_key!(
    /// Handle to a channel node of one audio unit.
    ChannelId,
    "ChannelId"
);

arena_key!(
    /// Handle to a buffer-chain range of one audio unit.
    RangeId,
    "RangeId"
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with free-list reuse and generation checks.
pub(crate) struct Arena<K, T> {
    unit: UnitId,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<K>,
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Makes room for `additional` inserts without reallocating.
    ///
    /// Free slots count toward the request; only the remainder grows the slot vector.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let fresh = additional.saturating_sub(self.free.len());
        self.slots.try_reserve(fresh)
    }

    pub fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            debug_assert!(entry.value.is_none(), "free slot {slot} still occupied");
            entry.value = Some(value);
            return K::from_parts(self.unit, slot, entry.generation);
        }
        let slot = u32::try_from(self.slots.len()).expect("arena slot index overflow");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_parts(self.unit, slot, 0)
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let (unit, slot, generation) = key.parts();
        if unit != self.unit {
            return None;
        }
        let entry = self.slots.get_mut(slot as usize)?;
        if entry.generation != generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<&T> {
        let (unit, slot, generation) = key.parts();
        if unit != self.unit {
            return None;
        }
        let entry = self.slots.get(slot as usize)?;
        if entry.generation != generation {
            return None;
        }
        entry.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let (unit, slot, generation) = key.parts();
        if unit != self.unit {
            return None;
        }
        let entry = self.slots.get_mut(slot as usize)?;
        if entry.generation != generation {
            return None;
        }
        entry.value.as_mut()
    }

    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        let unit = self.unit;
        self.slots.iter().enumerate().filter_map(move |(slot, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (K::from_parts(unit, slot as u32, entry.generation), value))
        })
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(|entry| entry.value.as_mut())
    }
}
