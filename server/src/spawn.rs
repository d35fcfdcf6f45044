//! Placement search for newly spawned enemies and fruit.
//!
//! Searches run against the session's current rendered grid, so cells held
//! by the player or by entities already on screen count as occupied.

use rand::Rng;
use shared::{EnemyKind, Grid, Tile, GRID_HEIGHT, GRID_WIDTH};

/// Row draws tried for a Foca before falling back to the floor row.
pub const FOCA_ATTEMPTS: usize = 20;
/// Cell draws tried for a fruit before falling back to a fixed row.
pub const FRUIT_ATTEMPTS: usize = 50;

const WIDTH: i32 = GRID_WIDTH as i32;
const HEIGHT: i32 = GRID_HEIGHT as i32;

/// Cell an Ice enemy is dropped at, always inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceTarget {
    pub row: i32,
    pub col: i32,
}

impl IceTarget {
    /// Clamps operator input into the grid.
    pub fn clamped(row: i32, col: i32) -> Self {
        Self {
            row: row.clamp(0, HEIGHT - 1),
            col: col.clamp(0, WIDTH - 1),
        }
    }
}

impl Default for IceTarget {
    fn default() -> Self {
        Self { row: 0, col: 10 }
    }
}

/// Picks `(x, y)` for a new enemy of `kind`.
pub fn enemy_position<R: Rng + ?Sized>(
    kind: EnemyKind,
    grid: &Grid,
    ice: IceTarget,
    rng: &mut R,
) -> (i32, i32) {
    match kind {
        EnemyKind::Foca => foca_position(grid, rng),
        EnemyKind::Bird => bird_position(rng),
        EnemyKind::Ice => (ice.col, ice.row),
    }
}

/// A side column, on an empty cell standing on a platform if one turns up
/// within [`FOCA_ATTEMPTS`] draws, otherwise on the floor row.
pub fn foca_position<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> (i32, i32) {
    let x = if rng.gen_bool(0.5) { 1 } else { WIDTH - 2 };
    let y = (0..FOCA_ATTEMPTS)
        .map(|_| rng.gen_range(1..=HEIGHT - 3))
        .find(|&y| stands_on_platform(grid, x, y))
        .unwrap_or(HEIGHT - 2);
    (x, y)
}

pub fn bird_position<R: Rng + ?Sized>(rng: &mut R) -> (i32, i32) {
    (rng.gen_range(1..=WIDTH - 2), HEIGHT - 2)
}

/// An empty cell resting on a platform if one turns up within
/// [`FRUIT_ATTEMPTS`] draws. The fallback row is not checked.
pub fn fruit_position<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> (i32, i32) {
    for _ in 0..FRUIT_ATTEMPTS {
        let x = rng.gen_range(0..WIDTH);
        let y = rng.gen_range(0..=HEIGHT - 2);
        if fruit_fits(grid, x, y) {
            return (x, y);
        }
    }
    (rng.gen_range(0..WIDTH), HEIGHT - 3)
}

fn stands_on_platform(grid: &Grid, x: i32, y: i32) -> bool {
    grid.get(x, y) == Some(Tile::Empty) && grid.get(x, y + 1) == Some(Tile::Platform)
}

fn fruit_fits(grid: &Grid, x: i32, y: i32) -> bool {
    grid.get(x, y) == Some(Tile::Empty)
        && (y + 1 >= HEIGHT || grid.get(x, y + 1) == Some(Tile::Platform))
}
