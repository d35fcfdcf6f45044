//! Tile grid and the rule that derives it.
//!
//! A grid is never patched in place. [`Grid::rebuild`] recomputes every cell
//! from three layers in order: the structural map, the player marker, then
//! active entities. Entities only land on cells that are still empty.

use crate::entity::{EnemyKind, EntityKind, FruitKind, SlotPool};
use crate::{GRID_HEIGHT, GRID_WIDTH};
use std::fmt;

/// Closed set of cell codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Tile {
    Empty = 0,
    Platform = 1,
    Player = 2,
    EnemyFoca = 3,
    EnemyBird = 4,
    EnemyIce = 5,
    FruitA = 6,
    FruitB = 7,
    FruitC = 8,
    FruitD = 9,
    BonusZone = 22,
}

impl Tile {
    pub const ALL: [Tile; 11] = [
        Tile::Empty,
        Tile::Platform,
        Tile::Player,
        Tile::EnemyFoca,
        Tile::EnemyBird,
        Tile::EnemyIce,
        Tile::FruitA,
        Tile::FruitB,
        Tile::FruitC,
        Tile::FruitD,
        Tile::BonusZone,
    ];

    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Tile> {
        Tile::ALL.into_iter().find(|tile| tile.code() == code)
    }

    /// Single character used by text dumps of a grid.
    pub fn glyph(self) -> char {
        match self {
            Tile::Empty => '.',
            Tile::Platform => '#',
            Tile::Player => '@',
            Tile::EnemyFoca => 'f',
            Tile::EnemyBird => 'b',
            Tile::EnemyIce => 'i',
            Tile::FruitA => '1',
            Tile::FruitB => '2',
            Tile::FruitC => '3',
            Tile::FruitD => '4',
            Tile::BonusZone => 'B',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Tile> {
        Tile::ALL.into_iter().find(|tile| tile.glyph() == glyph)
    }
}

/// Level layout every session starts from: side walls, a platform every
/// fourth row and a two-cell bonus zone at the top.
const STRUCTURAL_MAP: [&str; GRID_HEIGHT] = [
    "#..........BB............#",
    "#........................#",
    "#........................#",
    "##########################",
    "#........................#",
    "#........................#",
    "#........................#",
    "##########################",
    "#........................#",
    "#........................#",
    "#........................#",
    "##########################",
    "#........................#",
    "#........................#",
    "#........................#",
    "##########################",
    "#........................#",
    "#........................#",
    "#........................#",
    "##########################",
    "#........................#",
    "#........................#",
    "#........................#",
    "##########################",
];

/// Rectangular tile matrix, indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[Tile; GRID_WIDTH]; GRID_HEIGHT],
}

impl Grid {
    /// The canonical structural map with no player or entities.
    pub fn structural() -> Self {
        let mut grid = Self::filled(Tile::Empty);
        for (row, line) in STRUCTURAL_MAP.iter().enumerate() {
            for (col, glyph) in line.chars().take(GRID_WIDTH).enumerate() {
                grid.cells[row][col] = match Tile::from_glyph(glyph) {
                    Some(tile @ (Tile::Platform | Tile::BonusZone)) => tile,
                    _ => Tile::Empty,
                };
            }
        }
        grid
    }

    pub fn filled(tile: Tile) -> Self {
        Self {
            cells: [[tile; GRID_WIDTH]; GRID_HEIGHT],
        }
    }

    pub fn in_bounds(x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < GRID_WIDTH && (y as usize) < GRID_HEIGHT
    }

    /// Tile at column `x`, row `y`, or `None` outside the grid.
    pub fn get(&self, x: i32, y: i32) -> Option<Tile> {
        if Self::in_bounds(x, y) {
            Some(self.cells[y as usize][x as usize])
        } else {
            None
        }
    }

    /// Overwrites one cell. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        if !Self::in_bounds(x, y) {
            return false;
        }
        self.cells[y as usize][x as usize] = tile;
        true
    }

    /// Writes `tile` only if the cell is in bounds and currently empty.
    pub fn stamp(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        match self.get(x, y) {
            Some(Tile::Empty) => self.set(x, y, tile),
            _ => false,
        }
    }

    /// Recomputes every cell from the structural map, the player and the
    /// active entities
    ///
    /// Layers are applied in a fixed order: the structural map, then the
    /// player, then non-Ice enemies, then fruit. Entities are only stamped
    /// onto empty cells, so an entity never hides a platform, the bonus zone,
    /// the player or an earlier entity. Entities outside the grid are skipped.
    pub fn rebuild<const E: usize, const F: usize>(
        &mut self,
        player: (i32, i32),
        enemies: &SlotPool<EnemyKind, E>,
        fruits: &SlotPool<FruitKind, F>,
    ) {
        *self = Self::structural();
        self.set(player.0, player.1, Tile::Player);

        for (_, slot) in enemies.iter_active() {
            match slot.kind {
                // Ice hazards are tracked but never drawn; clients render them.
                Some(EnemyKind::Ice) | None => {}
                Some(kind) => {
                    self.stamp(slot.x, slot.y, kind.tile());
                }
            }
        }

        for (_, slot) in fruits.iter_active() {
            if let Some(kind) = slot.kind {
                self.stamp(slot.x, slot.y, kind.tile());
            }
        }
    }

    /// Counts the cells currently holding `tile`
    ///
    /// Used by status dumps and tests to check what a rebuild produced
    /// without walking the rows by hand.
    pub fn count(&self, tile: Tile) -> usize {
        self.cells.iter().flatten().filter(|&&cell| cell == tile).count()
    }

    pub fn rows(&self) -> &[[Tile; GRID_WIDTH]; GRID_HEIGHT] {
        &self.cells
    }

    /// Integer codes in wire order
    ///
    /// Row-major, `[row][column]`, one `i32` per cell. This is the exact
    /// matrix a frame carries ahead of the entity arrays.
    pub fn codes(&self) -> [[i32; GRID_WIDTH]; GRID_HEIGHT] {
        let mut codes = [[0; GRID_WIDTH]; GRID_HEIGHT];
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, tile) in cells.iter().enumerate() {
                codes[row][col] = tile.code();
            }
        }
        codes
    }

    /// Inverse of [`Grid::codes`]; `None` if any code is outside [`Tile`].
    pub fn from_codes(codes: &[[i32; GRID_WIDTH]; GRID_HEIGHT]) -> Option<Self> {
        let mut grid = Self::filled(Tile::Empty);
        for (row, cells) in codes.iter().enumerate() {
            for (col, &code) in cells.iter().enumerate() {
                grid.cells[row][col] = Tile::from_code(code)?;
            }
        }
        Some(grid)
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::structural()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: String = row.iter().map(|tile| tile.glyph()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_ENEMIES, MAX_FRUITS, PLAYER_SPAWN};

    fn empty_pools() -> (SlotPool<EnemyKind, MAX_ENEMIES>, SlotPool<FruitKind, MAX_FRUITS>) {
        (SlotPool::new(), SlotPool::new())
    }

    #[test]
    fn test_structural_map_dimensions() {
        for line in STRUCTURAL_MAP {
            assert_eq!(line.chars().count(), GRID_WIDTH, "row {:?}", line);
        }
    }

    #[test]
    fn test_structural_layout() {
        let grid = Grid::structural();
        let h = GRID_HEIGHT as i32;
        let w = GRID_WIDTH as i32;

        for y in 0..h {
            assert_eq!(grid.get(0, y), Some(Tile::Platform));
            assert_eq!(grid.get(w - 1, y), Some(Tile::Platform));
        }
        for y in [3, 7, 11, 15, 19, 23] {
            assert!((0..w).all(|x| grid.get(x, y) == Some(Tile::Platform)));
        }
        assert_eq!(grid.get(11, 0), Some(Tile::BonusZone));
        assert_eq!(grid.get(12, 0), Some(Tile::BonusZone));
        assert_eq!(grid.count(Tile::BonusZone), 2);
        assert_eq!(grid.count(Tile::Player), 0);
    }

    #[test]
    fn test_display_matches_map() {
        let text = Grid::structural().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, STRUCTURAL_MAP.to_vec());
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = Grid::structural();
        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(0, GRID_HEIGHT as i32), None);
        assert!(!grid.set(GRID_WIDTH as i32, 0, Tile::Player));
        assert!(!grid.stamp(5, -3, Tile::FruitA));
        assert_eq!(grid, Grid::structural());
    }

    #[test]
    fn test_stamp_only_on_empty() {
        let mut grid = Grid::structural();
        assert!(!grid.stamp(0, 0, Tile::EnemyBird));
        assert_eq!(grid.get(0, 0), Some(Tile::Platform));
        assert!(grid.stamp(5, 5, Tile::EnemyBird));
        assert!(!grid.stamp(5, 5, Tile::FruitB));
        assert_eq!(grid.get(5, 5), Some(Tile::EnemyBird));
    }

    #[test]
    fn test_rebuild_places_single_player() {
        let (enemies, fruits) = empty_pools();
        let mut grid = Grid::filled(Tile::Player);
        grid.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        assert_eq!(grid.count(Tile::Player), 1);
        assert_eq!(grid.get(PLAYER_SPAWN.0, PLAYER_SPAWN.1), Some(Tile::Player));
    }

    #[test]
    fn test_rebuild_draws_entities() {
        let (mut enemies, mut fruits) = empty_pools();
        enemies.activate(1, 2, EnemyKind::Foca);
        enemies.activate(8, 22, EnemyKind::Bird);
        fruits.activate(10, 6, FruitKind::Eggplant);

        let mut grid = Grid::structural();
        grid.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        assert_eq!(grid.get(1, 2), Some(Tile::EnemyFoca));
        assert_eq!(grid.get(8, 22), Some(Tile::EnemyBird));
        assert_eq!(grid.get(10, 6), Some(Tile::FruitC));
    }

    #[test]
    fn test_rebuild_never_draws_ice() {
        let (mut enemies, fruits) = empty_pools();
        enemies.activate(10, 1, EnemyKind::Ice);

        let mut grid = Grid::structural();
        grid.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        assert_eq!(grid.get(10, 1), Some(Tile::Empty));
        assert_eq!(grid.count(Tile::EnemyIce), 0);
    }

    #[test]
    fn test_rebuild_drops_entities_on_occupied_cells() {
        let (mut enemies, mut fruits) = empty_pools();
        enemies.activate(PLAYER_SPAWN.0, PLAYER_SPAWN.1, EnemyKind::Bird);
        enemies.activate(0, 5, EnemyKind::Foca);
        enemies.activate(4, 4, EnemyKind::Bird);
        fruits.activate(4, 4, FruitKind::Orange);

        let mut grid = Grid::structural();
        grid.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        assert_eq!(grid.get(PLAYER_SPAWN.0, PLAYER_SPAWN.1), Some(Tile::Player));
        assert_eq!(grid.get(0, 5), Some(Tile::Platform));
        assert_eq!(grid.get(4, 4), Some(Tile::EnemyBird));
        assert_eq!(grid.count(Tile::FruitA), 0);
    }

    #[test]
    fn test_rebuild_ignores_out_of_bounds_entities() {
        let (mut enemies, mut fruits) = empty_pools();
        enemies.activate(-1, 4, EnemyKind::Bird);
        fruits.activate(3, GRID_HEIGHT as i32 + 2, FruitKind::Lettuce);

        let mut grid = Grid::structural();
        grid.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        let mut expected = Grid::structural();
        expected.set(PLAYER_SPAWN.0, PLAYER_SPAWN.1, Tile::Player);
        assert_eq!(grid, expected);
    }

    #[test]
    fn test_rebuild_is_repeatable() {
        let (mut enemies, mut fruits) = empty_pools();
        enemies.activate(24, 10, EnemyKind::Foca);
        fruits.activate(6, 14, FruitKind::Banana);

        let mut first = Grid::structural();
        first.rebuild(PLAYER_SPAWN, &enemies, &fruits);
        let mut second = first.clone();
        second.rebuild(PLAYER_SPAWN, &enemies, &fruits);

        assert_eq!(first.codes(), second.codes());
    }

    #[test]
    fn test_codes_conversion() {
        let grid = Grid::structural();
        let codes = grid.codes();
        assert_eq!(codes[0][0], 1);
        assert_eq!(codes[0][11], 22);
        assert_eq!(codes[1][1], 0);
        assert_eq!(Grid::from_codes(&codes), Some(grid));

        let mut bad = codes;
        bad[4][4] = 17;
        assert_eq!(Grid::from_codes(&bad), None);
    }
}
