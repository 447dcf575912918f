//! Named events emitted by the simulation for presentation and audio layers.
//!
//! The core only calls into an [`EventSink`]; what a sink does with the
//! events (sounds, floating score labels, logs) is up to the caller.
use serde::{Deserialize, Serialize};

use crate::cart::CartId;
use crate::pickups::PickupTag;
use crate::tile::TileId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    CoinPickup {
        cart: CartId,
        score: i32,
        tile: TileId,
    },
    FlagPickup {
        cart: CartId,
        score: i32,
        tile: TileId,
    },
    /// Score cashed in at a portal.
    Collect {
        cart: CartId,
        score: i32,
        tile: TileId,
    },
    Diamond {
        cart: CartId,
    },
    /// Gold block mined with an axe.
    Pickaxe {
        cart: CartId,
    },
    AxePickup {
        cart: CartId,
    },
    Rock {
        cart: CartId,
    },
    RockDrop {
        cart: CartId,
        tile: TileId,
    },
    Lamp {
        cart: CartId,
    },
    Pickup {
        cart: CartId,
        tag: PickupTag,
    },
    CartHit {
        cart: CartId,
        other: CartId,
    },
    SwitchToggled {
        cart: CartId,
        tile: TileId,
    },
    /// Dynamite went off, on a cart or on the ground.
    Explosion {
        cart: Option<CartId>,
        tile: TileId,
        lost: i32,
    },
    DarknessStart,
    DarknessShuffle,
    TwinSpawned {
        holder: CartId,
        twin: CartId,
    },
    TwinRetired {
        twin: CartId,
    },
    CoinDropped {
        cart: CartId,
        tile: TileId,
    },
    Teleport {
        cart: CartId,
        from: TileId,
        to: TileId,
    },
}

impl GameEvent {
    /// Score delta this event carries for its cart, if any.
    #[must_use]
    pub const fn score_delta(&self) -> i32 {
        match self {
            Self::CoinPickup { score, .. }
            | Self::FlagPickup { score, .. }
            | Self::Collect { score, .. } => *score,
            Self::Explosion { lost, .. } => -*lost,
            Self::CoinDropped { .. } => -1,
            _ => 0,
        }
    }
}

/// Receiver of simulation events.
pub trait EventSink {
    fn emit(&mut self, event: GameEvent);
}

impl EventSink for Vec<GameEvent> {
    fn emit(&mut self, event: GameEvent) {
        self.push(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: GameEvent) {}
}

/// Stable, deterministic identifier for a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    /// Tick counter when the event occurred.
    pub tick: u64,
    /// Sequence number within the tick.
    pub seq: u16,
}

/// Event paired with the tick it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub event: GameEvent,
}

/// Append-only event history kept by a session.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Append the events of one tick in emission order.
    pub fn extend_tick(&mut self, tick: u64, events: impl IntoIterator<Item = GameEvent>) {
        for (seq, event) in events.into_iter().enumerate() {
            let seq = u16::try_from(seq).unwrap_or(u16::MAX);
            self.records.push(EventRecord {
                id: EventId { tick, seq },
                event,
            });
        }
    }

    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of logged events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.records.iter().filter(|r| predicate(&r.event)).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
