use anyhow::{Context, Result, ensure};
use monorail_game::constants::{COLLIDE_DISTANCE, MAX_SPEED};
use monorail_game::{
    GameEvent, InputState, Level, NullSink, Pickup, Playfield, RngBundle, Session, SimConfig,
    Tile, TileId, TilePos, TileShape, TrailPosition,
};

/// Inputs shared by every scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub ticks: u64,
    pub config: SimConfig,
}

impl ScenarioCtx {
    /// The requested tick count, raised to what the scenario needs to mean anything.
    #[must_use]
    pub fn ticks_at_least(&self, floor: u64) -> u64 {
        self.ticks.max(floor)
    }
}

/// What a passing run leaves behind for the report.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSummary {
    pub ticks: u64,
    pub events: usize,
    pub digest: u64,
    pub scores: Vec<i32>,
}

type ScenarioFn = fn(&ScenarioCtx) -> Result<ScenarioSummary>;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub key: &'static str,
    pub description: &'static str,
    run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("key", &self.key).finish()
    }
}

impl Scenario {
    /// Run once; any broken expectation comes back as an error.
    ///
    /// # Errors
    ///
    /// Returns the first expectation the run violated.
    pub fn run(&self, ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
        (self.run)(ctx)
    }
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "loop",
        description: "A lone cart laps a portal loop without leaving the track",
        run: run_loop,
    },
    Scenario {
        key: "portal",
        description: "Portal pair teleports a cart from one end of the track to the other",
        run: run_portal_cycle,
    },
    Scenario {
        key: "head-on",
        description: "Oncoming carts bounce apart and never overlap",
        run: run_head_on,
    },
    Scenario {
        key: "junction-ai",
        description: "Computer carts steer a junction track within their search budget",
        run: run_junction_ai,
    },
    Scenario {
        key: "determinism",
        description: "Two sessions on one seed produce identical digests",
        run: run_determinism,
    },
    Scenario {
        key: "roundtrip",
        description: "Binary level encoding preserves tiles, links and portals",
        run: run_level_roundtrip,
    },
];

#[must_use]
pub fn all_scenarios() -> &'static [Scenario] {
    SCENARIOS
}

#[must_use]
pub fn get_scenario(key: &str) -> Option<&'static Scenario> {
    all_scenarios().iter().find(|s| s.key == key)
}

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    all_scenarios().iter().map(|s| (s.key, s.description))
}

fn flat(x: i32, y: i32) -> Tile {
    Tile::new(TilePos::new(x, y, 0), TileShape::Flat)
}

fn portal(x: i32, y: i32) -> Tile {
    Tile::new(TilePos::new(x, y, 0), TileShape::Portal)
}

fn at(level: &Level, x: i32, y: i32) -> Result<TileId> {
    level
        .tile_at(x, y)
        .with_context(|| format!("no tile at ({x}, {y})"))
}

fn portal_loop() -> Level {
    Level::from_tiles([portal(0, 0), flat(1, 0), flat(1, 1), flat(0, 1)])
}

fn portal_track() -> Level {
    Level::from_tiles([
        portal(2, 0),
        flat(1, 0),
        flat(0, 0),
        flat(0, 1),
        flat(0, 2),
        flat(1, 2),
        portal(2, 2),
    ])
}

/// Two loops sharing a junction row, fed by a portal.
pub fn junction_track() -> Level {
    let mut tiles = vec![portal(0, 0)];
    tiles.extend((1..=4).map(|y| flat(0, y)));
    for x in 1..=4 {
        tiles.push(flat(x, 2));
        tiles.push(flat(x, 4));
    }
    tiles.extend([flat(4, 3), flat(-1, 2), flat(-1, 3), flat(-1, 4)]);
    Level::from_tiles(tiles)
}

fn scores(session: &Session) -> Vec<i32> {
    session.playfield().carts().iter().map(|c| c.score).collect()
}

fn summarize(session: &Session) -> ScenarioSummary {
    ScenarioSummary {
        ticks: session.ticks(),
        events: session.log().len(),
        digest: session.digest().0,
        scores: scores(session),
    }
}

fn run_loop(ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let mut session = Session::new(portal_loop(), ctx.config.clone(), ctx.seed)?;
    let cart = session.add_human(0, 1);
    ensure!(session.spawn_all(false) == 1, "cart was not placed");

    let input = InputState::new();
    for _ in 0..ctx.ticks {
        session.tick(&input);
        let field = session.playfield();
        let state = field.cart(cart).context("cart vanished")?;
        let pos = state.position.context("cart left the track")?;
        ensure!(
            (0..=MAX_SPEED).contains(&state.speed),
            "speed {} out of range at tick {}",
            state.speed,
            session.ticks()
        );
        let len = field.level[pos.tile].length();
        ensure!(
            (0..=len).contains(&pos.progress),
            "progress {} outside 0..={len}",
            pos.progress
        );
    }
    Ok(summarize(&session))
}

fn run_portal_cycle(ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let level = portal_track();
    let start = at(&level, 0, 1)?;
    let mut session = Session::new(level, ctx.config.clone(), ctx.seed)?;
    session
        .playfield_mut()
        .add_cart_at(0, TrailPosition::new(start, 0));
    session.run(ctx.ticks_at_least(1000));

    let teleports = session
        .log()
        .count(|e| matches!(e, GameEvent::Teleport { .. }));
    ensure!(teleports > 0, "cart never went through a portal");
    Ok(summarize(&session))
}

fn run_head_on(ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let level = Level::from_tiles((0..3).map(|y| flat(0, y)));
    let middle = at(&level, 0, 1)?;
    let mut field = Playfield::new(level);
    let a = field.add_cart_at(0, TrailPosition::new(middle, 240));
    let mut oncoming = TrailPosition::new(middle, 240 + COLLIDE_DISTANCE + 20);
    oncoming.reverse();
    let b = field.add_cart_at(1, oncoming);
    for id in [a, b] {
        if let Some(cart) = field.cart_mut(id) {
            cart.speed = 15;
        }
    }

    let rng = RngBundle::from_user_seed(ctx.seed);
    let mut events = Vec::new();
    field.tick(&rng, &mut events);
    ensure!(
        events.iter().any(|e| matches!(e, GameEvent::CartHit { .. })),
        "carts passed through each other"
    );
    let pa = field.cart(a).and_then(|c| c.position).context("cart a")?;
    let pb = field.cart(b).and_then(|c| c.position).context("cart b")?;
    let gap = pa.distance(&field.level, &pb);
    ensure!(gap >= COLLIDE_DISTANCE - 1, "carts overlap: gap {gap}");

    for _ in 1..ctx.ticks {
        field.tick(&rng, &mut NullSink);
    }
    for id in [a, b] {
        let placed = field.cart(id).and_then(|c| c.position);
        ensure!(placed.is_some(), "{id} fell off the track");
    }
    Ok(ScenarioSummary {
        ticks: ctx.ticks,
        events: events.len(),
        digest: field.digest(),
        scores: field.carts().iter().map(|c| c.score).collect(),
    })
}

fn junction_session(ctx: &ScenarioCtx) -> Result<Session> {
    let mut session = Session::new(junction_track(), ctx.config.clone(), ctx.seed)?;
    session.add_ai(0, Some(1.0));
    session.add_ai(1, None);
    session.spawn_all(true);
    let ids: Vec<TileId> = session.playfield().level.ids().collect();
    for (n, id) in ids.into_iter().enumerate() {
        let tile = &mut session.playfield_mut().level[id];
        if n % 3 == 1 && !tile.is_portal() {
            tile.pickup = Some(Pickup::coin());
        }
    }
    Ok(session)
}

fn run_junction_ai(ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let mut session = junction_session(ctx)?;
    let budget = ctx.config.tree.clone();
    let carts: Vec<_> = session.playfield().carts().iter().map(|c| c.id).collect();

    let input = InputState::new();
    for _ in 0..ctx.ticks {
        session.tick(&input);
        for &id in &carts {
            let Some(tree) = session.control().tree(id) else {
                continue;
            };
            ensure!(
                tree.len() <= budget.max_tree_nodes,
                "{id} tree holds {} nodes",
                tree.len()
            );
            ensure!(
                tree.depth() <= budget.max_generation,
                "{id} tree is {} generations deep",
                tree.depth()
            );
        }
    }
    for &id in &carts {
        let placed = session.playfield().cart(id).and_then(|c| c.position);
        ensure!(placed.is_some(), "{id} fell off the track");
    }
    Ok(summarize(&session))
}

fn run_determinism(ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let replay = || -> Result<Session> {
        let mut session = junction_session(ctx)?;
        session.run(ctx.ticks);
        Ok(session)
    };
    let first = replay()?;
    let second = replay()?;
    ensure!(
        first.digest() == second.digest(),
        "digests differ: {:?} vs {:?}",
        first.digest(),
        second.digest()
    );
    ensure!(
        first.log().records() == second.log().records(),
        "event histories differ"
    );
    Ok(summarize(&first))
}

fn run_level_roundtrip(_ctx: &ScenarioCtx) -> Result<ScenarioSummary> {
    let mut checked = 0;
    for level in [portal_loop(), portal_track(), junction_track()] {
        let decoded = Level::decode(&level.encode())?;
        ensure!(decoded.len() == level.len(), "tile count changed");
        ensure!(decoded.portals() == level.portals(), "portal list changed");
        for (before, after) in level.tiles().iter().zip(decoded.tiles()) {
            ensure!(
                before.neighbors() == after.neighbors(),
                "links changed at {}",
                before.position
            );
        }

        let mut buffer = Vec::new();
        level.write_to(&mut buffer)?;
        let read = Level::read_from(buffer.as_slice())?;
        ensure!(
            read.fingerprint() == level.fingerprint(),
            "stream round trip changed the level"
        );
        checked += level.len();
    }
    Ok(ScenarioSummary {
        events: checked,
        ..ScenarioSummary::default()
    })
}
