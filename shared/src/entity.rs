//! Enemy and fruit kinds, and the bounded slot pools that hold them.
//!
//! Each session owns a fixed number of enemy and fruit slots. A slot is
//! either active or free; spawning takes the first free slot and clearing
//! only flips the activity flag. Slot positions are part of the wire
//! contract, so the pool never compacts or reorders.

use crate::grid::Tile;
use std::fmt::Debug;

/// Behaviour shared by everything that can occupy a slot.
pub trait EntityKind: Copy + PartialEq + Debug {
    /// Integer written into the `type` field of a wire slot.
    fn wire_code(self) -> i32;
    /// Tile this entity is drawn as.
    fn tile(self) -> Tile;
    fn from_wire_code(code: i32) -> Option<Self>;
}

/// Enemy kinds the operator can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyKind {
    /// Walks along the side columns, standing on a platform.
    Foca = 1,
    /// Flies along the floor row.
    Bird = 2,
    /// Falling hazard dropped at an operator-chosen cell.
    Ice = 3,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 3] = [EnemyKind::Foca, EnemyKind::Bird, EnemyKind::Ice];

    pub fn name(self) -> &'static str {
        match self {
            EnemyKind::Foca => "Foca",
            EnemyKind::Bird => "Bird",
            EnemyKind::Ice => "Ice",
        }
    }
}

impl EntityKind for EnemyKind {
    fn wire_code(self) -> i32 {
        self as i32
    }

    fn tile(self) -> Tile {
        match self {
            EnemyKind::Foca => Tile::EnemyFoca,
            EnemyKind::Bird => Tile::EnemyBird,
            EnemyKind::Ice => Tile::EnemyIce,
        }
    }

    fn from_wire_code(code: i32) -> Option<Self> {
        EnemyKind::ALL.into_iter().find(|kind| kind.wire_code() == code)
    }
}

/// Fruit pickups. Point values only ever reach the log; scoring is done by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FruitKind {
    Orange = 0,
    Banana = 1,
    Eggplant = 2,
    Lettuce = 3,
}

impl FruitKind {
    pub const ALL: [FruitKind; 4] = [
        FruitKind::Orange,
        FruitKind::Banana,
        FruitKind::Eggplant,
        FruitKind::Lettuce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FruitKind::Orange => "Orange",
            FruitKind::Banana => "Banana",
            FruitKind::Eggplant => "Eggplant",
            FruitKind::Lettuce => "Lettuce",
        }
    }

    pub fn points(self) -> u32 {
        match self {
            FruitKind::Orange => 100,
            FruitKind::Banana => 200,
            FruitKind::Eggplant => 300,
            FruitKind::Lettuce => 400,
        }
    }
}

impl EntityKind for FruitKind {
    fn wire_code(self) -> i32 {
        self as i32
    }

    fn tile(self) -> Tile {
        match self {
            FruitKind::Orange => Tile::FruitA,
            FruitKind::Banana => Tile::FruitB,
            FruitKind::Eggplant => Tile::FruitC,
            FruitKind::Lettuce => Tile::FruitD,
        }
    }

    fn from_wire_code(code: i32) -> Option<Self> {
        FruitKind::ALL.into_iter().find(|kind| kind.wire_code() == code)
    }
}

/// One fixed position in a [`SlotPool`].
///
/// Deactivating a slot leaves its last position and kind in place; they are
/// still serialized until the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<K> {
    pub x: i32,
    pub y: i32,
    /// `None` only for a slot that has never been used since the last reset.
    pub kind: Option<K>,
    pub active: bool,
}

impl<K> Slot<K> {
    pub const fn vacant() -> Self {
        Self {
            x: 0,
            y: 0,
            kind: None,
            active: false,
        }
    }
}

/// Fixed-capacity pool with first-fit allocation.
///
/// `active_count` is maintained on every activation and deactivation and
/// always equals the number of slots whose `active` flag is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPool<K, const N: usize> {
    slots: [Slot<K>; N],
    active: usize,
}

impl<K: EntityKind, const N: usize> SlotPool<K, N> {
    pub fn new() -> Self {
        Self {
            slots: [Slot::vacant(); N],
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn is_full(&self) -> bool {
        self.active >= N
    }

    pub fn slots(&self) -> &[Slot<K>; N] {
        &self.slots
    }

    /// Places an entity in the first free slot.
    ///
    /// Returns the slot index, or `None` when every slot is active.
    pub fn activate(&mut self, x: i32, y: i32, kind: K) -> Option<usize> {
        let index = self.slots.iter().position(|slot| !slot.active)?;
        self.slots[index] = Slot {
            x,
            y,
            kind: Some(kind),
            active: true,
        };
        self.active += 1;
        Some(index)
    }

    /// Frees one slot. Returns false if it was already free or out of range.
    pub fn deactivate(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.active => {
                slot.active = false;
                self.active -= 1;
                true
            }
            _ => false,
        }
    }

    /// Frees every active slot matching `predicate`, returning how many were freed.
    pub fn deactivate_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Slot<K>) -> bool,
    {
        let mut freed = 0;
        for slot in self.slots.iter_mut() {
            if slot.active && predicate(slot) {
                slot.active = false;
                freed += 1;
            }
        }
        self.active -= freed;
        freed
    }

    pub fn deactivate_all(&mut self) -> usize {
        self.deactivate_where(|_| true)
    }

    /// Returns every slot to the never-used state.
    pub fn reset(&mut self) {
        self.slots = [Slot::vacant(); N];
        self.active = 0;
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &Slot<K>)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
    }
}

impl<K: EntityKind, const N: usize> Default for SlotPool<K, N> {
    fn default() -> Self {
        Self::new()
    }
}
