//! Carts: per-tick physics, switch lookahead and pairwise collisions.
use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    CART_START_SPEED, COLLIDE_DISTANCE, COLLIDE_SLOWDOWN, COLLIDE_SPEEDUP, FLAT_BOOST,
    KEY_LATCH_TICKS, LEPRECHAUN_DROP_ODDS, MAX_LOAD_AMOUNT, MAX_SPEED, MIN_SPEED,
    NEAR_MISS_SPEED_DELTA, OILER_MIN_SPEED, OILER_SLOPE_SLOWDOWN, OILER_SPEEDUP, SLOPE_ACCEL,
    SLOPE_SLOWDOWN, SPEED_DECAY, SPEEDUP, SWITCH_LOOKAHEAD_STEPS,
};
use crate::direction::Direction;
use crate::events::{EventSink, GameEvent};
use crate::level::Level;
use crate::numbers::{proportion, scale_i32, trunc_f64_to_i32};
use crate::pickups::{Carried, Collectible, Modifier, Pickup, PickupTag, PowerUp};
use crate::position::TrailPosition;
use crate::tile::TileId;

/// Stable identity of a cart; survives removal of other carts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartId(pub u32);

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cart-{}", self.0)
    }
}

/// Speed limits of a cart, shifted by an oiler.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedProfile {
    min: i32,
    slope_slowdown: f64,
    speedup: f64,
}

impl SpeedProfile {
    const fn for_modifier(modifier: Option<&Modifier>) -> Self {
        match modifier {
            Some(Modifier::Oiler { .. }) => Self {
                min: OILER_MIN_SPEED,
                slope_slowdown: OILER_SLOPE_SLOWDOWN,
                speedup: OILER_SPEEDUP,
            },
            _ => Self {
                min: MIN_SPEED,
                slope_slowdown: SLOPE_SLOWDOWN,
                speedup: SPEEDUP,
            },
        }
    }
}

/// What happened when two carts were checked against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// Out of range, unplaced, or the other cart is a ghost.
    Clear,
    /// A ghost slipped through and may have swapped cargo.
    PassedThrough,
    Hit,
    NearMiss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    /// Player number; mirror twins share it with their holder.
    pub owner: u8,
    /// Absent until spawned.
    pub position: Option<TrailPosition>,
    pub speed: i32,
    pub pending_switch: Option<TileId>,
    /// Side the cart will enter its pending switch from.
    pub switch_dir: Direction,
    pub switch_dist: i32,
    pub carried: Option<Carried>,
    pub modifier: Option<Modifier>,
    pub score: i32,
    load_amount: u8,
    key_latch: u32,
    lookahead_steps: u32,
}

impl Cart {
    #[must_use]
    pub const fn new(id: CartId, owner: u8, position: Option<TrailPosition>) -> Self {
        Self {
            id,
            owner,
            position,
            speed: CART_START_SPEED,
            pending_switch: None,
            switch_dir: Direction::North,
            switch_dist: 0,
            carried: None,
            modifier: None,
            score: 0,
            load_amount: 0,
            key_latch: 0,
            lookahead_steps: SWITCH_LOOKAHEAD_STEPS,
        }
    }

    #[must_use]
    pub const fn with_lookahead(mut self, steps: u32) -> Self {
        self.lookahead_steps = steps;
        self
    }

    #[must_use]
    pub const fn load_amount(&self) -> u8 {
        self.load_amount
    }

    /// Presentation hint of how full the cart looks.
    pub fn set_load_amount(&mut self, amount: u8) {
        self.load_amount = amount.min(MAX_LOAD_AMOUNT);
    }

    #[must_use]
    pub fn carries(&self, tag: PickupTag) -> bool {
        self.carried.as_ref().is_some_and(|item| item.is(tag))
    }

    #[must_use]
    pub const fn is_ghost(&self) -> bool {
        matches!(self.modifier, Some(Modifier::Ghost { .. }))
    }

    /// Whether a keypress happened within the latch window.
    #[must_use]
    pub const fn key_went_down(&self) -> bool {
        self.key_latch > 0
    }

    /// Integrate one tick of physics and carried-item bookkeeping.
    ///
    /// Mirror draining is left to the playfield, which owns both carts.
    pub fn tick<R: Rng + ?Sized>(&mut self, level: &mut Level, rng: &mut R, sink: &mut dyn EventSink) {
        let Some(mut pos) = self.position else {
            return;
        };
        let old_tile = pos.tile;
        let profile = SpeedProfile::for_modifier(self.modifier.as_ref());
        let (flat, angle) = {
            let tile = &level[old_tile];
            (tile.shape.is_flat(), f64::from(tile.angle()))
        };

        self.speed = scale_i32(self.speed, SPEED_DECAY);
        if flat && self.speed < profile.min {
            self.speed = scale_i32(self.speed + FLAT_BOOST, profile.speedup);
        }
        let descending = pos.is_reversed() != self.carries(PickupTag::Balloon);
        let sloped = if descending {
            f64::from(self.speed) + SLOPE_ACCEL * angle
        } else {
            f64::from(self.speed) - profile.slope_slowdown * angle
        };
        self.speed = trunc_f64_to_i32(sloped).min(MAX_SPEED);

        if self.speed < 0 {
            self.speed = -self.speed;
            pos.reverse();
            self.position = Some(pos);
            self.select_next_switch(level);
        }
        if self.is_ghost() {
            self.speed = (MIN_SPEED + MAX_SPEED) / 2;
        }

        pos.advance(level, self.speed);
        self.position = Some(pos);
        let tile_changed = pos.tile != old_tile;
        if tile_changed {
            level[old_tile].trail.may_switch = true;
            level[pos.tile].trail.may_switch = false;
            self.select_next_switch(level);
        }

        self.tick_carried();
        if let Some(modifier) = self.modifier.as_mut() {
            modifier.tick(true);
            // Ghosts are retired by the playfield once the cart stands free.
            if modifier.is_done() && !matches!(modifier, Modifier::Ghost { .. }) {
                self.modifier = None;
            }
        }
        self.key_latch = self.key_latch.saturating_sub(1);

        if tile_changed
            && self.carries(PickupTag::Leprechaun)
            && self.score > 0
            && level[old_tile].pickup.is_none()
            && rng.gen_range(0..LEPRECHAUN_DROP_ODDS) == 0
        {
            self.score -= 1;
            level[old_tile].pickup = Some(Pickup::coin());
            sink.emit(GameEvent::CoinDropped {
                cart: self.id,
                tile: old_tile,
            });
        }

        let gate = &level[pos.tile];
        if gate.is_gate() && gate.gate_down {
            let middle = TrailPosition::new(pos.tile, gate.length() / 2);
            if pos.distance(level, &middle) < COLLIDE_DISTANCE / 2 {
                trace!("{} bounced off gate {}", self.id, pos.tile);
                self.speed = -self.speed;
            }
        }
    }

    fn tick_carried(&mut self) {
        let Some(item) = self.carried.as_mut() else {
            return;
        };
        match item {
            Carried::Collectible(collectible) => {
                collectible.tick();
                self.score += collectible.score();
            }
            Carried::PowerUp(power_up) => {
                power_up.tick(true);
                if power_up.is_done() {
                    self.carried = None;
                }
            }
        }
    }

    /// Find the next switch ahead and mark it selected.
    pub fn select_next_switch(&mut self, level: &mut Level) {
        if let Some(previous) = self.pending_switch.take() {
            if let Some(tile) = level.get_mut(previous) {
                tile.selected = false;
            }
        }
        let Some(mut it) = self.position else {
            return;
        };

        let mut out_dir = it.out_direction(level);
        it.to_next_tile(level);
        self.switch_dist = level[it.tile].length();

        let mut steps = 0;
        while !level[it.tile].is_switch() {
            if steps >= self.lookahead_steps {
                return;
            }
            out_dir = it.out_direction(level);
            let previous = it.tile;
            it.to_next_tile(level);
            if previous == it.tile {
                return;
            }
            self.switch_dist += level[it.tile].length();
            steps += 1;
        }

        self.pending_switch = Some(it.tile);
        self.switch_dir = out_dir.opposite();
        level[it.tile].selected = true;
    }

    /// Make the pending switch enterable from the side the cart arrives at.
    pub fn align_switch(&self, level: &mut Level) {
        if let Some(switch) = self.pending_switch {
            level[switch].align(Some(self.switch_dir));
        }
    }

    /// The single action a player has: flip the pending switch.
    pub fn keydown(&mut self, level: &mut Level, sink: &mut dyn EventSink) {
        if let Some(switch) = self.pending_switch {
            level[switch].switch_it(Some(self.switch_dir));
            sink.emit(GameEvent::SwitchToggled {
                cart: self.id,
                tile: switch,
            });
        }
        self.key_latch = KEY_LATCH_TICKS;
    }

    /// Drop the pending switch and leave the track, freeing the current tile.
    pub fn lift(&mut self, level: &mut Level) {
        if let Some(switch) = self.pending_switch.take() {
            level[switch].selected = false;
        }
        if let Some(pos) = self.position.take() {
            level[pos.tile].trail.may_switch = true;
        }
    }

    /// Put the cart on the track and look for its first switch.
    pub fn place(&mut self, level: &mut Level, position: TrailPosition) {
        self.position = Some(position);
        self.select_next_switch(level);
    }

    /// Take a pickup from `tile`; coins, gold and flags turn into points.
    pub fn add_pickup(&mut self, pickup: Pickup, tile: TileId, sink: &mut dyn EventSink) {
        let factor = if self.carries(PickupTag::Multiplier) { 2 } else { 1 };
        let cart = self.id;
        match pickup {
            Pickup::Collectible(Collectible::CopperCoin) => {
                self.score += factor;
                sink.emit(GameEvent::CoinPickup {
                    cart,
                    score: factor,
                    tile,
                });
            }
            Pickup::Collectible(Collectible::GoldBlock) => {
                self.score += factor;
                sink.emit(GameEvent::Pickaxe { cart });
            }
            Pickup::Collectible(Collectible::Flag { .. }) => {
                self.score += factor;
                sink.emit(GameEvent::FlagPickup {
                    cart,
                    score: factor,
                    tile,
                });
            }
            Pickup::Collectible(item) => {
                let event = match item {
                    Collectible::Diamond => GameEvent::Diamond { cart },
                    Collectible::Axe => GameEvent::AxePickup { cart },
                    Collectible::RockBlock => GameEvent::Rock { cart },
                    Collectible::Lamp { .. } => GameEvent::Lamp { cart },
                    _ => GameEvent::Pickup {
                        cart,
                        tag: Pickup::Collectible(item.clone()).tag(),
                    },
                };
                self.carried = Some(Carried::Collectible(item));
                sink.emit(event);
            }
            Pickup::PowerUp(item) => {
                let tag = Pickup::PowerUp(item.clone()).tag();
                self.carried = Some(Carried::PowerUp(item));
                sink.emit(GameEvent::Pickup { cart, tag });
            }
            Pickup::Modifier(item) => {
                let tag = Pickup::Modifier(item.clone()).tag();
                self.modifier = Some(item);
                sink.emit(GameEvent::Pickup { cart, tag });
            }
            Pickup::Torch | Pickup::Bonus => {}
        }
    }

    /// Arm the cart with dynamite unless it already carries something.
    pub fn give_dynamite(&mut self) -> bool {
        if self.carried.is_some() {
            return false;
        }
        self.carried = Some(Carried::PowerUp(PowerUp::dynamite()));
        true
    }
}

/// Resolve a possible collision of `a` against `b`.
///
/// Overlapping carts swap speeds and cargo and are pushed apart so the trail
/// distance between them is back at [`COLLIDE_DISTANCE`].
pub fn resolve_collision(
    a: &mut Cart,
    b: &mut Cart,
    level: &Level,
    sink: &mut dyn EventSink,
) -> CollisionOutcome {
    let (Some(mut pa), Some(mut pb)) = (a.position, b.position) else {
        return CollisionOutcome::Clear;
    };
    let distance = pa.distance(level, &pb);

    if a.is_ghost() {
        if distance < COLLIDE_DISTANCE && a.carried.is_none() {
            std::mem::swap(&mut a.carried, &mut b.carried);
        }
        return CollisionOutcome::PassedThrough;
    }
    if b.is_ghost() {
        return CollisionOutcome::Clear;
    }

    if distance < COLLIDE_DISTANCE {
        debug!("{} hit {} at distance {distance}", a.id, b.id);
        sink.emit(GameEvent::CartHit {
            cart: a.id,
            other: b.id,
        });
        std::mem::swap(&mut a.speed, &mut b.speed);

        let head_on = !pa.same_direction(level, &pb);
        if head_on {
            // Carts already driving apart keep their heading.
            let separating = pa.advanced(level, -distance).same_point(level, &pb);
            if !separating {
                pa.reverse();
                pb.reverse();
            }
        }
        let shortfall = COLLIDE_DISTANCE - pa.distance(level, &pb);
        let share_a = trunc_f64_to_i32(f64::from(shortfall) * proportion(a.speed, b.speed));
        // The remainder goes to `b` so truncation never eats into the gap.
        let share_b = shortfall - share_a;

        if head_on {
            pa.advance(level, share_a);
            pb.advance(level, share_b);
            a.speed = scale_i32(a.speed, COLLIDE_SPEEDUP);
            b.speed = scale_i32(b.speed, COLLIDE_SPEEDUP);
        } else if a_trails(level, &pa, &pb, a.speed <= b.speed) {
            pa.retreat(level, share_a);
            pb.advance(level, share_b + 1);
            a.speed = scale_i32(a.speed, COLLIDE_SLOWDOWN);
            b.speed = scale_i32(b.speed, COLLIDE_SPEEDUP);
        } else {
            pa.advance(level, share_a + 1);
            pb.retreat(level, share_b);
            a.speed = scale_i32(a.speed, COLLIDE_SPEEDUP);
            b.speed = scale_i32(b.speed, COLLIDE_SLOWDOWN);
        }
        a.position = Some(pa);
        b.position = Some(pb);
        std::mem::swap(&mut a.carried, &mut b.carried);
        return CollisionOutcome::Hit;
    }

    if distance < COLLIDE_DISTANCE * 3 / 2
        && pa.same_direction(level, &pb)
        && (a.speed - b.speed).abs() < NEAR_MISS_SPEED_DELTA
    {
        if a_trails(level, &pa, &pb, true) {
            a.speed = scale_i32(a.speed, COLLIDE_SLOWDOWN);
            b.speed = scale_i32(b.speed, COLLIDE_SPEEDUP);
        } else {
            a.speed = scale_i32(a.speed, COLLIDE_SPEEDUP);
            b.speed = scale_i32(b.speed, COLLIDE_SLOWDOWN);
        }
        return CollisionOutcome::NearMiss;
    }
    CollisionOutcome::Clear
}

/// Whether `a` drives behind `b`; `fallback` decides when the trail cannot tell.
fn a_trails(level: &Level, a: &TrailPosition, b: &TrailPosition, fallback: bool) -> bool {
    let distance = a.distance(level, b);
    if a.advanced(level, distance).same_point(level, b) {
        true
    } else if b.advanced(level, distance).same_point(level, a) {
        false
    } else {
        fallback
    }
}
