//! Wire formats between the server and game clients.
//!
//! Outbound, the server sends [`Snapshot`] frames: a fixed byte layout with
//! no length prefix or version tag. Every integer is a 4-byte little-endian
//! `i32`:
//!
//! ```text
//! grid (H x W cells, row-major) | enemy count | enemy slots (x, y, type, active) x 10
//!   | fruit count | fruit slots (x, y, type, active) x 4 | score
//! ```
//!
//! Inbound, clients send short text. `BONUS` starts a bonus phase and
//! `BONUSOFF` ends it. The same tokens may also arrive inside a structured
//! [`ClientMessage`] record.

use crate::entity::{EnemyKind, EntityKind, FruitKind, Slot, SlotPool};
use crate::grid::Grid;
use crate::{
    CONTROL_TEXT_LIMIT, GRID_HEIGHT, GRID_WIDTH, MAX_ENEMIES, MAX_FRUITS, MESSAGE_BUFFER_SIZE,
    MESSAGE_TYPE_CLIENT_MESSAGE,
};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Size in bytes of one encoded [`Snapshot`].
pub const FRAME_LEN: usize =
    (GRID_WIDTH * GRID_HEIGHT + 1 + MAX_ENEMIES * 4 + 1 + MAX_FRUITS * 4 + 1) * 4;

/// Fixed-width little-endian integers, no length prefixes on arrays.
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Slot as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireSlot {
    pub x: i32,
    pub y: i32,
    pub kind: i32,
    pub active: i32,
}

impl<K: EntityKind> From<&Slot<K>> for WireSlot {
    fn from(slot: &Slot<K>) -> Self {
        Self {
            x: slot.x,
            y: slot.y,
            kind: slot.kind.map(K::wire_code).unwrap_or(0),
            active: i32::from(slot.active),
        }
    }
}

impl WireSlot {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }
}

/// One outbound frame: a session's full grid, entity slots and score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub grid: [[i32; GRID_WIDTH]; GRID_HEIGHT],
    pub enemy_count: i32,
    pub enemies: [WireSlot; MAX_ENEMIES],
    pub fruit_count: i32,
    pub fruits: [WireSlot; MAX_FRUITS],
    pub score: i32,
}

impl Snapshot {
    pub fn capture(
        grid: &Grid,
        enemies: &SlotPool<EnemyKind, MAX_ENEMIES>,
        fruits: &SlotPool<FruitKind, MAX_FRUITS>,
        score: i32,
    ) -> Self {
        Self {
            grid: grid.codes(),
            enemy_count: enemies.active_count() as i32,
            enemies: std::array::from_fn(|i| WireSlot::from(&enemies.slots()[i])),
            fruit_count: fruits.active_count() as i32,
            fruits: std::array::from_fn(|i| WireSlot::from(&fruits.slots()[i])),
            score,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        wire_options().serialize(self)
    }

    /// Decodes exactly one frame. Short input or trailing bytes are errors.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        wire_options().deserialize(bytes)
    }

    /// Grid as typed tiles, or `None` if it holds an unknown code.
    pub fn tiles(&self) -> Option<Grid> {
        Grid::from_codes(&self.grid)
    }

    pub fn active_enemies(&self) -> impl Iterator<Item = &WireSlot> {
        self.enemies.iter().filter(|slot| slot.is_active())
    }

    pub fn active_fruits(&self) -> impl Iterator<Item = &WireSlot> {
        self.fruits.iter().filter(|slot| slot.is_active())
    }
}

/// Client-sent tokens that toggle the bonus phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlToken {
    BonusOff,
    Bonus,
}

impl ControlToken {
    /// Match order. `BONUSOFF` contains `BONUS`, so it has to be tried first.
    pub const PRIORITY: [ControlToken; 2] = [ControlToken::BonusOff, ControlToken::Bonus];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlToken::BonusOff => "BONUSOFF",
            ControlToken::Bonus => "BONUS",
        }
    }

    /// First token, in priority order, that occurs anywhere in `text`.
    pub fn find(text: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|token| text.contains(token.as_str()))
    }
}

/// A decoded inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A control token found in the raw text of the buffer.
    RawControlToken(ControlToken),
    /// A structured client record, possibly carrying a control token.
    StructuredClientMessage {
        client_id: i32,
        content: String,
        token: Option<ControlToken>,
    },
    /// Anything else, as text.
    Unrecognized(String),
}

impl InboundMessage {
    /// Decodes one received buffer.
    ///
    /// Only the first [`CONTROL_TEXT_LIMIT`] bytes are inspected. Raw text is
    /// searched before the structured record is considered, and text ends at
    /// the first NUL byte in both forms.
    pub fn decode(bytes: &[u8]) -> Self {
        let window = &bytes[..bytes.len().min(CONTROL_TEXT_LIMIT)];
        let text = text_until_nul(window);

        if let Some(token) = ControlToken::find(&text) {
            return InboundMessage::RawControlToken(token);
        }

        if let Some((message_type, client_id)) = read_header(window) {
            if message_type == MESSAGE_TYPE_CLIENT_MESSAGE {
                let end = window.len().min(ClientMessage::LEN);
                let content = text_until_nul(&window[ClientMessage::HEADER_LEN..end]);
                let token = ControlToken::find(&content);
                return InboundMessage::StructuredClientMessage {
                    client_id,
                    content,
                    token,
                };
            }
        }

        InboundMessage::Unrecognized(text)
    }

    pub fn control_token(&self) -> Option<ControlToken> {
        match self {
            InboundMessage::RawControlToken(token) => Some(*token),
            InboundMessage::StructuredClientMessage { token, .. } => *token,
            InboundMessage::Unrecognized(_) => None,
        }
    }
}

fn text_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_header(bytes: &[u8]) -> Option<(i32, i32)> {
    let header = bytes.get(..ClientMessage::HEADER_LEN)?;
    wire_options().deserialize(header).ok()
}

/// Structured record a client may send: `{messageType, clientId, messageContent[256]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub message_type: i32,
    pub client_id: i32,
    pub content: String,
}

impl ClientMessage {
    pub const HEADER_LEN: usize = 8;
    pub const LEN: usize = Self::HEADER_LEN + MESSAGE_BUFFER_SIZE;

    pub fn new(client_id: i32, content: impl Into<String>) -> Self {
        Self {
            message_type: MESSAGE_TYPE_CLIENT_MESSAGE,
            client_id,
            content: content.into(),
        }
    }

    /// Encodes the record. Content longer than 255 bytes is cut so the
    /// field always ends in a NUL.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut bytes = wire_options().serialize(&(self.message_type, self.client_id))?;
        let content = self.content.as_bytes();
        let kept = content.len().min(MESSAGE_BUFFER_SIZE - 1);
        bytes.extend_from_slice(&content[..kept]);
        bytes.resize(Self::LEN, 0);
        Ok(bytes)
    }
}
