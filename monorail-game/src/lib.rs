//! Monorail Game Engine
//!
//! Platform-agnostic rail simulation for Monorail: the track graph, cart
//! physics, pickups and the predictive switching used by computer players.
//! This crate has no rendering, audio or input-device dependencies.

pub mod ai;
pub mod cart;
pub mod config;
pub mod constants;
pub mod direction;
pub mod events;
pub mod level;
pub mod numbers;
pub mod pickups;
pub mod playfield;
pub mod position;
pub mod rng;
pub mod session;
pub mod tile;
pub mod trail;

// Re-export commonly used types
pub use ai::{
    AiController, CartController, ControlView, Forecast, GroundControl, HumanController,
    InputState, NodeState, PredictionTree, RootChange, WorldSnapshot,
};
pub use cart::{Cart, CartId, CollisionOutcome, resolve_collision};
pub use config::{ConfigError, SimConfig, TreeConfig};
pub use direction::Direction;
pub use events::{EventId, EventLog, EventRecord, EventSink, GameEvent, NullSink};
pub use level::{Level, LevelError};
pub use pickups::{Carried, Collectible, Modifier, Pickup, PickupTag, PowerUp};
pub use playfield::Playfield;
pub use position::TrailPosition;
pub use rng::{CountingRng, RngBundle};
pub use session::Session;
pub use tile::{SlopeHalf, Tile, TileId, TilePos, TileShape};
pub use trail::{Trail, TrailKind};

/// Trait for abstracting where encoded levels live
/// Platform-specific implementations should provide this
pub trait LevelStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store an encoded level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be saved.
    fn save_level(&self, name: &str, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fetch an encoded level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be read.
    fn load_level(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Delete a stored level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be deleted.
    fn delete_level(&self, name: &str) -> Result<(), Self::Error>;
}

/// Main engine for creating sessions from stored levels
pub struct MonorailEngine<S>
where
    S: LevelStorage,
{
    storage: S,
    config: SimConfig,
}

impl<S> MonorailEngine<S>
where
    S: LevelStorage,
{
    /// Create a new engine over `storage` that starts sessions with `config`
    pub const fn new(storage: S, config: SimConfig) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Encode and store a level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be saved.
    pub fn save_level(&self, name: &str, level: &Level) -> Result<(), S::Error> {
        self.storage.save_level(name, &level.encode())
    }

    /// Load and decode a level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be read or its data is malformed.
    pub fn load_level(&self, name: &str) -> Result<Option<Level>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        if let Some(bytes) = self.storage.load_level(name).map_err(Into::into)? {
            let level = Level::decode(&bytes)?;
            log::debug!("loaded level {name}: {} tiles", level.len());
            Ok(Some(level))
        } else {
            Ok(None)
        }
    }

    /// Delete a stored level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be deleted.
    pub fn delete_level(&self, name: &str) -> Result<(), S::Error> {
        self.storage.delete_level(name)
    }

    /// Start a session on a stored level
    ///
    /// # Errors
    ///
    /// Returns an error if the level cannot be loaded or the configuration is invalid.
    pub fn create_session(&self, name: &str, seed: u64) -> Result<Option<Session>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let Some(level) = self.load_level(name)? else {
            return Ok(None);
        };
        Ok(Some(Session::new(level, self.config.clone(), seed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        levels: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    }

    impl LevelStorage for MemoryStorage {
        type Error = Infallible;

        fn save_level(&self, name: &str, bytes: &[u8]) -> Result<(), Self::Error> {
            self.levels
                .borrow_mut()
                .insert(name.to_string(), bytes.to_vec());
            Ok(())
        }

        fn load_level(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
            Ok(self.levels.borrow().get(name).cloned())
        }

        fn delete_level(&self, name: &str) -> Result<(), Self::Error> {
            self.levels.borrow_mut().remove(name);
            Ok(())
        }
    }

    fn square() -> Level {
        Level::from_tiles([
            Tile::new(TilePos::new(0, 0, 0), TileShape::Portal),
            Tile::new(TilePos::new(1, 0, 0), TileShape::Flat),
            Tile::new(TilePos::new(1, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
        ])
    }

    #[test]
    fn engine_round_trips_levels_through_storage() {
        let storage = MemoryStorage::default();
        let engine = MonorailEngine::new(storage.clone(), SimConfig::default());
        let level = square();
        engine.save_level("square", &level).unwrap();

        let loaded = engine.load_level("square").unwrap().expect("stored level");
        assert_eq!(loaded.fingerprint(), level.fingerprint());
        assert!(engine.load_level("missing").unwrap().is_none());

        engine.delete_level("square").unwrap();
        assert!(storage.levels.borrow().is_empty());
    }

    #[test]
    fn sessions_start_from_stored_levels() {
        let engine = MonorailEngine::new(MemoryStorage::default(), SimConfig::default());
        engine.save_level("square", &square()).unwrap();
        let mut session = engine
            .create_session("square", 11)
            .unwrap()
            .expect("session");
        session.add_ai(0, None);
        assert_eq!(session.spawn_all(false), 1);
        session.run(10);
        assert_eq!(session.ticks(), 10);
        assert!(engine.create_session("missing", 11).unwrap().is_none());
    }

    #[test]
    fn corrupt_levels_surface_as_errors() {
        let storage = MemoryStorage::default();
        storage.save_level("broken", &[1, 0, 0, 0, 0xFF]).unwrap();
        let engine = MonorailEngine::new(storage, SimConfig::default());
        let err = engine.load_level("broken").expect_err("truncated data");
        assert!(err.downcast_ref::<LevelError>().is_some());
    }
}
