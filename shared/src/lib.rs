//! Types and wire formats shared by the climber server and its clients.
//!
//! The server keeps one tile grid per connected player and ships it as a
//! fixed-layout binary frame. Clients answer with short text control tokens.
//! Both sides of that exchange live here so they cannot drift apart.

pub mod entity;
pub mod grid;
pub mod protocol;

pub use entity::{EnemyKind, EntityKind, FruitKind, Slot, SlotPool};
pub use grid::{Grid, Tile};
pub use protocol::{ClientMessage, ControlToken, InboundMessage, Snapshot, WireSlot, FRAME_LEN};

/// Grid width in cells.
pub const GRID_WIDTH: usize = 26;
/// Grid height in cells.
pub const GRID_HEIGHT: usize = 24;

/// Enemy slots per session.
pub const MAX_ENEMIES: usize = 10;
/// Fruit slots per session.
pub const MAX_FRUITS: usize = 4;

/// Port the reference deployment listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// Largest single read taken from a client connection.
pub const RECV_BUFFER_SIZE: usize = 4096;
/// Bytes of an inbound message inspected for control tokens.
pub const CONTROL_TEXT_LIMIT: usize = 511;
/// Content bytes carried by a structured client message.
pub const MESSAGE_BUFFER_SIZE: usize = 256;

/// Structured record type tags.
pub const MESSAGE_TYPE_GAME_STATE: i32 = 1;
pub const MESSAGE_TYPE_CLIENT_MESSAGE: i32 = 2;

/// Cell where every player starts.
pub const PLAYER_SPAWN: (i32, i32) = (2, GRID_HEIGHT as i32 - 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_spawn_is_inside_grid() {
        let (x, y) = PLAYER_SPAWN;
        assert!(x >= 0 && (x as usize) < GRID_WIDTH);
        assert!(y >= 0 && (y as usize) < GRID_HEIGHT);
    }

    #[test]
    fn test_text_window_fits_receive_buffer() {
        assert!(CONTROL_TEXT_LIMIT < RECV_BUFFER_SIZE);
        assert!(MESSAGE_BUFFER_SIZE + 8 <= CONTROL_TEXT_LIMIT);
    }
}
