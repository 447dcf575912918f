//! Centralized tuning constants for the Monorail rail simulation.
//!
//! These values define the deterministic math of the core. They are
//! load-bearing for gameplay feel; scenario tests that count ticks depend on
//! them rather than on core correctness.

// Track geometry ------------------------------------------------------------
/// Length of a straight flat tile.
pub const STRAIGHT_LENGTH: i32 = 1000;
/// Quarter arc of radius 500, truncated.
pub const CURVE_LENGTH: i32 = 785;
/// Length of either slope half.
pub const SLOPE_LENGTH: i32 = 2300 / 2;
/// Acceleration factor of a slope tile. Not a real angle.
pub const SLOPE_ANGLE: i32 = 8;

// Cart physics --------------------------------------------------------------
pub const CART_START_SPEED: i32 = 70;
pub const SPEED_DECAY: f64 = 0.99;
pub const MIN_SPEED: i32 = 140;
pub const MAX_SPEED: i32 = 230;
pub const SLOPE_ACCEL: f64 = 1.2;
pub const SLOPE_SLOWDOWN: f64 = 0.8;
pub const SPEEDUP: f64 = 1.05;
pub const FLAT_BOOST: i32 = 5;
pub const OILER_MIN_SPEED: i32 = 150;
pub const OILER_SLOPE_SLOWDOWN: f64 = 0.15;
pub const OILER_SPEEDUP: f64 = 1.5;

// Collisions ----------------------------------------------------------------
pub const COLLIDE_DISTANCE: i32 = 500;
pub const COLLIDE_SPEEDUP: f64 = 1.05;
pub const COLLIDE_SLOWDOWN: f64 = 0.95;
/// Near-miss speed difference below which trailing carts are nudged apart.
pub const NEAR_MISS_SPEED_DELTA: i32 = 10;
/// Returned by distance queries between positions that are not adjacent.
pub const FAR_DISTANCE: i32 = 999_999_999;

// Switching -----------------------------------------------------------------
pub const SWITCH_LOOKAHEAD_STEPS: u32 = 100;
/// Ticks a keypress stays latched for key-driven effects.
pub const KEY_LATCH_TICKS: u32 = 2;

// Pickups -------------------------------------------------------------------
pub const TICKS_PER_SECOND: u32 = 25;
pub const KEY_TICKS: u32 = 15 * TICKS_PER_SECOND;
pub const MULTIPLIER_TICKS: u32 = 15 * TICKS_PER_SECOND;
pub const BALLOON_TICKS: u32 = 20 * TICKS_PER_SECOND;
pub const MIRROR_TICKS: u32 = 15 * TICKS_PER_SECOND;
pub const OILER_TICKS: u32 = 20 * TICKS_PER_SECOND;
pub const GHOST_TICKS: u32 = 15 * TICKS_PER_SECOND;
pub const DYNAMITE_FUSE_STEP: f64 = 0.0015;
pub const LAMP_PERIOD: u32 = TICKS_PER_SECOND;
pub const DIAMOND_DELIVERY_SCORE: i32 = 10;
/// One in this many tile changes drops a coin while a leprechaun rides along.
pub const LEPRECHAUN_DROP_ODDS: u32 = 6;
/// Maximum cart load level shown by the presentation layer.
pub const MAX_LOAD_AMOUNT: u8 = 3;

// Playfield -----------------------------------------------------------------
/// Free positions keep this multiple of the collide distance from any cart.
pub const FREE_POSITION_CLEARANCE: f64 = 1.2;
pub const DARKNESS_STEP: u32 = 15;
pub const DARKNESS_SHUFFLE_AT: u32 = 256;
pub const DARKNESS_END_AT: u32 = 512;
/// Attempts made to find a free position during a darkness shuffle.
pub const SHUFFLE_PLACEMENT_ATTEMPTS: u32 = 64;

// Prediction ----------------------------------------------------------------
pub const TREE_MAX_NODES_PER_UPDATE: usize = 256 * 2;
pub const TREE_MAX_GENERATION: u32 = 256 / 4;
pub const TREE_MAX_NODES: usize = 4096;
/// Node scores are fixed point with this many units per point.
pub const SCORE_UNIT: i32 = 100;
/// Generations within which another cart's forecast counts as a meeting.
pub const FORECAST_MEET_WINDOW: u32 = 1;
/// Chance denominator of an idle press when no best move is known.
pub const AI_IDLE_PRESS_ODDS: u32 = 17;
/// Chance denominator of a press when the controller ignores its tree.
pub const AI_RANDOM_PRESS_ODDS: u32 = 33;
