//! Per-session world state and the operations the operator drives.
//!
//! A [`GameState`] is owned by exactly one session. Every mutation that can
//! change what a client sees ends in a grid rebuild, and every entity placed
//! since the last frame stays in the outbox until [`GameState::drain_outbox`]
//! runs after a successful send.

use crate::spawn::{self, IceTarget};
use log::debug;
use rand::Rng;
use shared::{
    ControlToken, EnemyKind, FruitKind, Grid, SlotPool, Snapshot, GRID_HEIGHT, MAX_ENEMIES,
    MAX_FRUITS, PLAYER_SPAWN,
};
use thiserror::Error;

/// Why a spawn left the world unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnRejected {
    #[error("spawning this kind is disabled in the current phase")]
    PhaseGated,
    #[error("all {capacity} slots are active")]
    PoolFull { capacity: usize },
}

/// Which kinds of entity a session currently accepts.
///
/// The two flags are toggled together by control tokens but are stored and
/// checked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusPhase {
    pub can_spawn_fruit: bool,
    pub can_spawn_enemies: bool,
}

impl BonusPhase {
    pub fn apply(&mut self, token: ControlToken) {
        match token {
            ControlToken::BonusOff => {
                self.can_spawn_fruit = false;
                self.can_spawn_enemies = true;
            }
            ControlToken::Bonus => {
                self.can_spawn_fruit = true;
                self.can_spawn_enemies = false;
            }
        }
    }

    pub fn is_bonus(&self) -> bool {
        self.can_spawn_fruit && !self.can_spawn_enemies
    }
}

impl Default for BonusPhase {
    fn default() -> Self {
        Self {
            can_spawn_fruit: false,
            can_spawn_enemies: true,
        }
    }
}

/// Where a spawned entity landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub slot: usize,
    pub x: i32,
    pub y: i32,
}

/// One operator mutation, applied to a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldCommand {
    SpawnEnemy { kind: EnemyKind, ice: IceTarget },
    SpawnFruit(FruitKind),
    ClearEnemies,
    ClearFruits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Placed(Placement),
    Rejected(SpawnRejected),
    /// Number of slots that were active before the clear.
    Cleared(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub grid: Grid,
    pub player_x: i32,
    pub player_y: i32,
    pub enemies: SlotPool<EnemyKind, MAX_ENEMIES>,
    pub fruits: SlotPool<FruitKind, MAX_FRUITS>,
    /// Carried on the wire; scoring happens on the client.
    pub score: i32,
}

impl GameState {
    pub fn new() -> Self {
        let mut state = Self {
            grid: Grid::structural(),
            player_x: PLAYER_SPAWN.0,
            player_y: PLAYER_SPAWN.1,
            enemies: SlotPool::new(),
            fruits: SlotPool::new(),
            score: 0,
        };
        state.update();
        state
    }

    /// Resets to the canonical starting layout.
    pub fn initialize(&mut self) {
        self.player_x = PLAYER_SPAWN.0;
        self.player_y = PLAYER_SPAWN.1;
        self.enemies.reset();
        self.fruits.reset();
        self.score = 0;
        self.update();
    }

    /// Drops Ice hazards that have left the grid, then rebuilds.
    pub fn update(&mut self) {
        self.enemies.deactivate_where(|slot| {
            slot.kind == Some(EnemyKind::Ice) && slot.y >= GRID_HEIGHT as i32
        });
        self.grid
            .rebuild((self.player_x, self.player_y), &self.enemies, &self.fruits);
    }

    /// Places one enemy of `kind`
    ///
    /// The phase gate is checked first. An Ice spawn then deactivates any
    /// Ice enemy already in the pool, so the new one always replaces it.
    /// After that the pool must have a free slot, otherwise the world is
    /// left as it was. Foca and Bird positions come from the spawn planner;
    /// Ice goes exactly to the operator's clamped `ice` target.
    ///
    /// The grid is rebuilt before returning.
    pub fn spawn_enemy<R: Rng + ?Sized>(
        &mut self,
        kind: EnemyKind,
        ice: IceTarget,
        can_spawn_enemies: bool,
        rng: &mut R,
    ) -> Result<Placement, SpawnRejected> {
        if !can_spawn_enemies {
            return Err(SpawnRejected::PhaseGated);
        }
        // At most one Ice hazard per session. The purge runs before the
        // capacity check so a new Ice always replaces the old one.
        if kind == EnemyKind::Ice {
            self.enemies
                .deactivate_where(|slot| slot.kind == Some(EnemyKind::Ice));
        }

        let full = SpawnRejected::PoolFull {
            capacity: self.enemies.capacity(),
        };
        if self.enemies.is_full() {
            return Err(full);
        }

        let (x, y) = spawn::enemy_position(kind, &self.grid, ice, rng);
        let slot = self.enemies.activate(x, y, kind).ok_or(full)?;
        self.update();

        debug!("{} enemy placed in slot {} at ({}, {})", kind.name(), slot, x, y);
        Ok(Placement { slot, x, y })
    }

    /// Places one fruit of `kind` on a free cell
    ///
    /// Rejected when the phase forbids fruit or all fruit slots are active.
    /// When no empty cell turns up within the draw budget the planner's
    /// fallback cell is used unchecked.
    pub fn spawn_fruit<R: Rng + ?Sized>(
        &mut self,
        kind: FruitKind,
        can_spawn_fruit: bool,
        rng: &mut R,
    ) -> Result<Placement, SpawnRejected> {
        if !can_spawn_fruit {
            return Err(SpawnRejected::PhaseGated);
        }
        let full = SpawnRejected::PoolFull {
            capacity: self.fruits.capacity(),
        };
        if self.fruits.is_full() {
            return Err(full);
        }

        let (x, y) = spawn::fruit_position(&self.grid, rng);
        let slot = self.fruits.activate(x, y, kind).ok_or(full)?;
        self.update();

        debug!("{} fruit placed in slot {} at ({}, {})", kind.name(), slot, x, y);
        Ok(Placement { slot, x, y })
    }

    /// Deactivates every enemy, Ice included, and rebuilds
    ///
    /// Returns how many slots were active.
    pub fn clear_enemies(&mut self) -> usize {
        let cleared = self.enemies.deactivate_all();
        self.update();
        cleared
    }

    /// Same as [`GameState::clear_enemies`] for the fruit pool.
    pub fn clear_fruits(&mut self) -> usize {
        let cleared = self.fruits.deactivate_all();
        self.update();
        cleared
    }

    /// Runs one command under the given phase.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        command: WorldCommand,
        phase: BonusPhase,
        rng: &mut R,
    ) -> CommandOutcome {
        let placed = match command {
            WorldCommand::SpawnEnemy { kind, ice } => {
                self.spawn_enemy(kind, ice, phase.can_spawn_enemies, rng)
            }
            WorldCommand::SpawnFruit(kind) => self.spawn_fruit(kind, phase.can_spawn_fruit, rng),
            WorldCommand::ClearEnemies => return CommandOutcome::Cleared(self.clear_enemies()),
            WorldCommand::ClearFruits => return CommandOutcome::Cleared(self.clear_fruits()),
        };
        match placed {
            Ok(placement) => CommandOutcome::Placed(placement),
            Err(rejected) => CommandOutcome::Rejected(rejected),
        }
    }

    /// Frees every slot once a frame carrying them has been delivered.
    ///
    /// Returns the number of enemies and fruits that were drained.
    pub fn drain_outbox(&mut self) -> (usize, usize) {
        let enemies = self.enemies.deactivate_all();
        let fruits = self.fruits.deactivate_all();
        self.update();
        (enemies, fruits)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.grid, &self.enemies, &self.fruits, self.score)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
