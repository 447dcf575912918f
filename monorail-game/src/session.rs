//! A running game: playfield, controllers, random streams and event history.
use log::{debug, info};

use crate::ai::{AiController, GroundControl, HumanController, InputState};
use crate::cart::CartId;
use crate::config::{ConfigError, SimConfig};
use crate::events::{EventLog, EventRecord, GameEvent};
use crate::level::Level;
use crate::playfield::Playfield;
use crate::rng::RngBundle;

/// Single entry point that advances the simulation one tick at a time.
#[derive(Debug)]
pub struct Session {
    playfield: Playfield,
    control: GroundControl,
    rng: RngBundle,
    log: EventLog,
    tick: u64,
    seed: u64,
    config: SimConfig,
}

impl Session {
    /// Start a session on `level` with streams derived from `seed`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(level: Level, config: SimConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "session started: seed {seed}, {} tiles, {} portals",
            level.len(),
            level.portals().len()
        );
        Ok(Self {
            playfield: Playfield::new(level).with_lookahead(config.switch_lookahead_steps),
            control: GroundControl::new(config.tree.clone()),
            rng: RngBundle::from_user_seed(seed),
            log: EventLog::default(),
            tick: 0,
            seed,
            config,
        })
    }

    /// Add an unplaced cart steered by `button`.
    pub fn add_human(&mut self, owner: u8, button: u8) -> CartId {
        let id = self.playfield.add_cart(owner);
        self.control
            .add_controller(Box::new(HumanController::new(id, button)));
        id
    }

    /// Add an unplaced computer cart; `iq` falls back to the configured default.
    pub fn add_ai(&mut self, owner: u8, iq: Option<f32>) -> CartId {
        let id = self.playfield.add_cart(owner);
        let iq = iq.unwrap_or(self.config.default_iq).clamp(0.0, 1.0);
        debug!("{id} joins as a computer player with iq {iq}");
        self.control.add_controller(Box::new(AiController::new(id, iq)));
        id
    }

    /// Place every waiting cart at a portal. Returns how many were placed.
    pub fn spawn_all(&mut self, random: bool) -> usize {
        let mut placed = 0;
        while self
            .playfield
            .spawn_next_cart(random, &mut *self.rng.placement())
        {
            placed += 1;
        }
        placed
    }

    /// Advance one tick and return the events it produced.
    pub fn tick(&mut self, input: &InputState) -> &[EventRecord] {
        let mut events: Vec<GameEvent> = Vec::new();
        self.playfield.tick(&self.rng, &mut events);
        self.control
            .tick(&mut self.playfield, input, &mut *self.rng.ai(), &mut events);

        let start = self.log.len();
        self.log.extend_tick(self.tick, events);
        self.tick += 1;
        &self.log.records()[start..]
    }

    /// Run `ticks` ticks without input.
    pub fn run(&mut self, ticks: u64) {
        let input = InputState::new();
        for _ in 0..ticks {
            self.tick(&input);
        }
    }

    #[must_use]
    pub const fn playfield(&self) -> &Playfield {
        &self.playfield
    }

    /// Scenario layers place pickups and arm carts through this.
    pub fn playfield_mut(&mut self) -> &mut Playfield {
        &mut self.playfield
    }

    #[must_use]
    pub const fn control(&self) -> &GroundControl {
        &self.control
    }

    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub const fn rng(&self) -> &RngBundle {
        &self.rng
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// State hash plus per-stream draw counts.
    #[must_use]
    pub fn digest(&self) -> (u64, [u64; 3]) {
        (self.playfield.digest(), self.rng.draw_counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickups::Pickup;
    use crate::tile::{Tile, TilePos, TileShape};

    /// A four-tile loop whose north-west corner is a portal.
    fn portal_loop() -> Level {
        Level::from_tiles([
            Tile::new(TilePos::new(0, 0, 0), TileShape::Portal),
            Tile::new(TilePos::new(1, 0, 0), TileShape::Flat),
            Tile::new(TilePos::new(1, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
        ])
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig {
            default_iq: 2.0,
            ..SimConfig::default()
        };
        let err = Session::new(portal_loop(), config, 1).expect_err("iq out of range");
        assert!(matches!(err, ConfigError::RangeViolation { field: "default_iq", .. }));
    }

    #[test]
    fn carts_spawn_at_portals_and_keep_moving() {
        let mut session = Session::new(portal_loop(), SimConfig::default(), 9).expect("session");
        let human = session.add_human(0, 1);
        let computer = session.add_ai(1, None);
        assert_eq!(session.spawn_all(false), 2);
        assert_eq!(session.spawn_all(false), 0);

        session.run(200);
        assert_eq!(session.ticks(), 200);
        for id in [human, computer] {
            let cart = session.playfield().cart(id).expect("cart");
            assert!(cart.position.is_some());
            assert!(cart.speed >= 0);
        }
        assert!(session.control().tree(computer).is_some_and(|t| !t.is_empty()));
        // Human carts are predicted too so computers can avoid them.
        assert_eq!(session.control().forecasts().len(), 2);
    }

    #[test]
    fn tick_returns_only_its_own_events() {
        let mut session = Session::new(portal_loop(), SimConfig::default(), 3).expect("session");
        session.add_human(0, 1);
        session.spawn_all(false);
        let east = session.playfield().level.tile_at(1, 0).expect("east");
        session.playfield_mut().level[east].pickup = Some(Pickup::coin());

        let input = InputState::new();
        let mut seen = 0;
        for _ in 0..100 {
            let tick = session.ticks();
            let records = session.tick(&input);
            assert!(records.iter().all(|r| r.id.tick == tick));
            seen += records.len();
        }
        assert_eq!(seen, session.log().len());
        assert_eq!(
            session
                .log()
                .count(|e| matches!(e, GameEvent::CoinPickup { .. })),
            1
        );
    }

    #[test]
    fn equal_seeds_replay_identically() {
        let run = |seed| {
            let mut session =
                Session::new(portal_loop(), SimConfig::default(), seed).expect("session");
            session.add_ai(0, Some(0.5));
            session.add_ai(1, Some(0.9));
            session.spawn_all(true);
            session.run(300);
            session.digest()
        };
        assert_eq!(run(42), run(42));
    }
}
