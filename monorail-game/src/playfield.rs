//! The playing area: a level, its carts and the global per-tick rules.
//!
//! Carts are updated in index order. Each cart integrates its physics, then
//! reacts to portals, pickups and collisions against every other cart in index
//! order before the next cart moves. The order is part of the contract:
//! resolving A against B before B against C changes outcomes.
use log::{debug, trace};
use rand::Rng;
use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::cart::{Cart, CartId, CollisionOutcome, resolve_collision};
use crate::constants::{
    COLLIDE_DISTANCE, DARKNESS_END_AT, DARKNESS_SHUFFLE_AT, DARKNESS_STEP,
    DIAMOND_DELIVERY_SCORE, FREE_POSITION_CLEARANCE, MAX_LOAD_AMOUNT, SHUFFLE_PLACEMENT_ATTEMPTS,
    SWITCH_LOOKAHEAD_STEPS,
};
use crate::events::{EventSink, GameEvent};
use crate::level::Level;
use crate::pickups::{Carried, Collectible, Modifier, Pickup, PickupTag, PowerUp};
use crate::position::TrailPosition;
use crate::rng::RngBundle;
use crate::tile::TileId;

/// A mirror holder and the twin it spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MirrorLink {
    holder: CartId,
    twin: CartId,
}

#[derive(Debug, Clone)]
pub struct Playfield {
    pub level: Level,
    carts: Vec<Cart>,
    next_cart_id: u32,
    pickup_counts: BTreeMap<PickupTag, usize>,
    /// Running while a torch effect is active.
    darkness: Option<u32>,
    mirrors: Vec<MirrorLink>,
    lookahead_steps: u32,
}

impl Playfield {
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            carts: Vec::new(),
            next_cart_id: 0,
            pickup_counts: BTreeMap::new(),
            darkness: None,
            mirrors: Vec::new(),
            lookahead_steps: SWITCH_LOOKAHEAD_STEPS,
        }
    }

    /// Switch lookahead budget given to carts added from now on.
    #[must_use]
    pub const fn with_lookahead(mut self, steps: u32) -> Self {
        self.lookahead_steps = steps;
        self
    }

    /// Add an unplaced cart for player `owner`.
    pub fn add_cart(&mut self, owner: u8) -> CartId {
        let id = CartId(self.next_cart_id);
        self.next_cart_id += 1;
        self.carts
            .push(Cart::new(id, owner, None).with_lookahead(self.lookahead_steps));
        id
    }

    /// Add a cart and put it on the track at `position`.
    pub fn add_cart_at(&mut self, owner: u8, position: TrailPosition) -> CartId {
        let id = self.add_cart(owner);
        if let Some(cart) = self.carts.last_mut() {
            cart.place(&mut self.level, position);
        }
        id
    }

    #[must_use]
    pub fn carts(&self) -> &[Cart] {
        &self.carts
    }

    #[must_use]
    pub fn cart(&self, id: CartId) -> Option<&Cart> {
        self.carts.iter().find(|c| c.id == id)
    }

    pub fn cart_mut(&mut self, id: CartId) -> Option<&mut Cart> {
        self.carts.iter_mut().find(|c| c.id == id)
    }

    fn index_of(&self, id: CartId) -> Option<usize> {
        self.carts.iter().position(|c| c.id == id)
    }

    #[must_use]
    pub const fn darkness(&self) -> Option<u32> {
        self.darkness
    }

    /// Number of pickups of `tag` on tiles and carts as of the last tick.
    #[must_use]
    pub fn pickup_count(&self, tag: PickupTag) -> usize {
        self.pickup_counts.get(&tag).copied().unwrap_or(0)
    }

    /// Carts grouped by descending score; ties share a group in index order.
    #[must_use]
    pub fn ranking(&self) -> Vec<Vec<CartId>> {
        let mut sorted: Vec<&Cart> = self.carts.iter().collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));
        let mut ranking: Vec<Vec<CartId>> = Vec::new();
        let mut previous = None;
        for cart in sorted {
            match ranking.last_mut() {
                Some(group) if previous == Some(cart.score) => group.push(cart.id),
                _ => ranking.push(vec![cart.id]),
            }
            previous = Some(cart.score);
        }
        ranking
    }

    /// Place the first unplaced cart at a portal. Returns `false` once every
    /// cart is on the track or the level has no portal.
    pub fn spawn_next_cart<R: Rng + ?Sized>(&mut self, random_spawn: bool, rng: &mut R) -> bool {
        let Some(idx) = self.carts.iter().position(|c| c.position.is_none()) else {
            return false;
        };
        let portal = if random_spawn {
            self.level.random_portal(rng)
        } else {
            self.level.first_portal()
        };
        let Some(portal) = portal else {
            return false;
        };
        debug!("spawning {} at portal {portal}", self.carts[idx].id);
        self.carts[idx].place(&mut self.level, TrailPosition::new(portal, 0));
        true
    }

    /// Whether no placed cart other than `ignore` is within the clearance of `position`.
    #[must_use]
    pub fn is_free_position(&self, position: &TrailPosition, ignore: Option<CartId>) -> bool {
        let clearance = f64::from(COLLIDE_DISTANCE) * FREE_POSITION_CLEARANCE;
        self.carts
            .iter()
            .filter(|cart| Some(cart.id) != ignore)
            .filter_map(|cart| cart.position)
            .all(|pos| f64::from(pos.distance(&self.level, position)) >= clearance)
    }

    /// Middle of a random empty flat tile, if it is free. A single attempt.
    pub fn get_free_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TrailPosition> {
        let tile = self.level.random_flat_tile(rng)?;
        if self.level[tile].pickup.is_some() {
            return None;
        }
        let pos = TrailPosition::new(tile, self.level[tile].length() / 2);
        self.is_free_position(&pos, None).then_some(pos)
    }

    /// Drop `pickup` on a random flat tile unless that tile is occupied.
    pub fn spawn_pickup<R: Rng + ?Sized>(&mut self, pickup: Pickup, rng: &mut R) -> Option<TileId> {
        let tile = self.level.random_flat_tile(rng)?;
        let slot = &mut self.level[tile].pickup;
        if slot.is_some() {
            return None;
        }
        *slot = Some(pickup);
        Some(tile)
    }

    /// Arm a cart with dynamite unless it already carries something.
    pub fn spawn_dynamite_on_cart(&mut self, id: CartId) -> bool {
        self.cart_mut(id).is_some_and(Cart::give_dynamite)
    }

    /// A player's button press; mirror holders press for their twin too.
    pub fn keydown(&mut self, id: CartId, sink: &mut dyn EventSink) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        self.carts[idx].keydown(&mut self.level, sink);
        let twin = self.carts[idx].modifier.as_ref().and_then(Modifier::twin);
        if let Some(twin_idx) = twin.and_then(|t| self.index_of(t)) {
            self.carts[twin_idx].keydown(&mut self.level, sink);
        }
    }

    /// Advance the playfield one tick.
    pub fn tick(&mut self, rng: &RngBundle, sink: &mut dyn EventSink) {
        let mut physics = rng.physics();
        let mut placement = rng.placement();
        self.pickup_counts.clear();

        // Twins spawned during the loop are ticked in the same pass.
        let mut idx = 0;
        while idx < self.carts.len() {
            self.tick_cart(idx, &mut *physics, &mut *placement, sink);
            idx += 1;
        }

        self.tick_tiles(sink);
        self.explode_carts(&mut *placement, sink);
        self.count_pickups();
        self.tick_darkness(&mut *placement, sink);
        self.retire_mirrors(sink);
        self.refresh_load_amounts();
    }

    /// The leader shows up to a full load; every rank below sheds part of it
    /// according to how far it trails the rank above.
    fn refresh_load_amounts(&mut self) {
        let ranking = self.ranking();
        let Some(leader) = ranking.first() else {
            return;
        };
        let full = i32::from(MAX_LOAD_AMOUNT);
        let score_of = |field: &Self, group: &[CartId]| {
            group
                .first()
                .and_then(|id| field.cart(*id))
                .map_or(0, |cart| cart.score)
        };
        let followers = i32::try_from(ranking.len() - 1).unwrap_or(full);
        let step = full / followers.clamp(1, full);
        let mut previous = score_of(self, leader);
        let mut amount = previous.min(full);
        for group in &ranking {
            let score = score_of(self, group);
            amount -= step.min(previous - score);
            let load = u8::try_from(amount.clamp(0, full)).unwrap_or(0);
            for id in group {
                if let Some(cart) = self.cart_mut(*id) {
                    cart.set_load_amount(load);
                }
            }
            previous = score;
        }
    }

    fn tick_cart<P, Q>(&mut self, idx: usize, physics: &mut P, placement: &mut Q, sink: &mut dyn EventSink)
    where
        P: Rng + ?Sized,
        Q: Rng + ?Sized,
    {
        let before = self.carts[idx].position;
        self.carts[idx].tick(&mut self.level, physics, sink);
        self.drain_mirror(idx);

        let (Some(before), Some(after)) = (before, self.carts[idx].position) else {
            return;
        };
        // A bounce inside a portal is the cue to deliver cargo and teleport.
        if self.level[after.tile].is_portal()
            && after.tile == before.tile
            && after.is_reversed() != before.is_reversed()
        {
            self.enter_portal(idx, placement, sink);
        }

        self.handle_new_pickups(idx, placement, sink);
        self.handle_collisions(idx, sink);
        self.carts[idx].align_switch(&mut self.level);
        self.handle_special_pickups(idx);
    }

    fn drain_mirror(&mut self, idx: usize) {
        let twin = self.carts[idx].modifier.as_ref().and_then(Modifier::twin);
        let Some(twin_idx) = twin.and_then(|t| self.index_of(t)) else {
            return;
        };
        if twin_idx == idx {
            return;
        }
        let (holder, twin) = pair_mut(&mut self.carts, idx, twin_idx);
        holder.score += twin.score;
        twin.score = 0;
    }

    fn enter_portal<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R, sink: &mut dyn EventSink) {
        let cart = &mut self.carts[idx];
        let Some(pos) = cart.position else {
            return;
        };
        match cart.carried {
            Some(Carried::Collectible(Collectible::RockBlock)) => {
                cart.carried = None;
                sink.emit(GameEvent::RockDrop {
                    cart: cart.id,
                    tile: pos.tile,
                });
            }
            Some(Carried::Collectible(Collectible::Diamond)) => {
                cart.carried = None;
                cart.score += DIAMOND_DELIVERY_SCORE;
                sink.emit(GameEvent::Collect {
                    cart: cart.id,
                    score: DIAMOND_DELIVERY_SCORE,
                    tile: pos.tile,
                });
            }
            _ => {}
        }

        let Some(port) = self.level.random_companion(pos.tile, rng) else {
            return;
        };
        let mut target = pos;
        target.tile = port;
        target.progress = 0;
        let id = self.carts[idx].id;
        if !self.is_free_position(&target, Some(id)) {
            trace!("{id} stays at portal {}: exit {port} is blocked", pos.tile);
            return;
        }
        debug!("{id} teleports from {} to {port}", pos.tile);
        self.level[pos.tile].trail.may_switch = true;
        self.level[port].trail.may_switch = false;
        let cart = &mut self.carts[idx];
        cart.position = Some(target);
        cart.select_next_switch(&mut self.level);
        sink.emit(GameEvent::Teleport {
            cart: id,
            from: pos.tile,
            to: port,
        });
    }

    fn handle_new_pickups<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R, sink: &mut dyn EventSink) {
        let Some(tile) = self.carts[idx].position.map(|p| p.tile) else {
            return;
        };
        let take = match self.level[tile].pickup.as_ref() {
            None => return,
            Some(Pickup::Torch) => {
                if self.darkness.is_none() {
                    self.level[tile].pickup = None;
                    self.darkness = Some(0);
                    debug!("{} lit a torch: darkness falls", self.carts[idx].id);
                    sink.emit(GameEvent::DarknessStart);
                }
                return;
            }
            Some(pickup) => accepts(&self.carts[idx], pickup),
        };
        if !take {
            return;
        }
        let Some(pickup) = self.level[tile].pickup.take() else {
            return;
        };
        let is_mirror = matches!(pickup, Pickup::Modifier(Modifier::Mirror { .. }));
        self.carts[idx].add_pickup(pickup, tile, sink);
        if is_mirror {
            self.spawn_twin(idx, rng, sink);
        }
    }

    fn spawn_twin<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R, sink: &mut dyn EventSink) {
        let position = self.get_free_position(rng);
        let holder = self.carts[idx].id;
        let owner = self.carts[idx].owner;
        let twin = self.add_cart(owner);
        if let (Some(position), Some(cart)) = (position, self.carts.last_mut()) {
            cart.place(&mut self.level, position);
        }
        if let Some(Modifier::Mirror { twin: slot, .. }) = self.carts[idx].modifier.as_mut() {
            *slot = Some(twin);
        }
        self.mirrors.push(MirrorLink { holder, twin });
        debug!("{holder} picked a mirror and spawned {twin}");
        sink.emit(GameEvent::TwinSpawned { holder, twin });
    }

    fn handle_collisions(&mut self, idx: usize, sink: &mut dyn EventSink) {
        for other in 0..self.carts.len() {
            if other == idx || self.carts[other].position.is_none() {
                continue;
            }
            let (cart, rival) = pair_mut(&mut self.carts, idx, other);
            if resolve_collision(cart, rival, &self.level, sink) == CollisionOutcome::Hit {
                trace!("{} and {} bounced apart", cart.id, rival.id);
            }

            // Only the closer cart keeps control of a shared switch.
            if cart.pending_switch.is_some() && cart.pending_switch == rival.pending_switch {
                if cart.switch_dist < rival.switch_dist {
                    rival.pending_switch = None;
                } else {
                    cart.pending_switch = None;
                }
            }
        }
    }

    fn handle_special_pickups(&mut self, idx: usize) {
        let cart = &self.carts[idx];
        if cart.carries(PickupTag::Key) && cart.key_went_down() {
            let own = cart.pending_switch;
            let switches: Vec<TileId> = self
                .level
                .ids()
                .filter(|id| Some(*id) != own && self.level[*id].is_switch())
                .collect();
            for id in switches {
                self.level[id].switch_it(None);
            }
        }

        let cart = &self.carts[idx];
        if let (Some(Modifier::Ghost { .. }), Some(pos)) = (cart.modifier.as_ref(), cart.position) {
            let expired = cart.modifier.as_ref().is_some_and(Modifier::is_done);
            if expired && self.is_free_position(&pos, Some(cart.id)) {
                self.carts[idx].modifier = None;
            }
        }
    }

    fn tick_tiles(&mut self, sink: &mut dyn EventSink) {
        for id in self.level.ids() {
            let tile = &mut self.level[id];
            tile.tick();
            if tile.pickup.as_ref().is_some_and(Pickup::is_exploding) {
                tile.pickup = None;
                debug!("dynamite exploded on tile {id}");
                sink.emit(GameEvent::Explosion {
                    cart: None,
                    tile: id,
                    lost: 0,
                });
            }
        }
    }

    /// Exploding dynamite halves the carrier's score and scatters the loss as
    /// coins over random flat tiles; coins landing on occupied tiles are lost.
    fn explode_carts<R: Rng + ?Sized>(&mut self, rng: &mut R, sink: &mut dyn EventSink) {
        for idx in 0..self.carts.len() {
            let cart = &mut self.carts[idx];
            let exploding = matches!(
                cart.carried.as_ref(),
                Some(Carried::PowerUp(item)) if item.is_exploding()
            );
            let Some(pos) = cart.position.filter(|_| exploding) else {
                continue;
            };
            let old_score = cart.score;
            cart.score /= 2;
            let lost = old_score - cart.score;
            cart.carried = None;
            debug!("dynamite blew up on {}: {lost} points scattered", cart.id);
            sink.emit(GameEvent::Explosion {
                cart: Some(cart.id),
                tile: pos.tile,
                lost,
            });
            for _ in 0..lost {
                if let Some(tile) = self.level.random_flat_tile(rng) {
                    let slot = &mut self.level[tile].pickup;
                    if slot.is_none() {
                        *slot = Some(Pickup::coin());
                    }
                }
            }
        }
    }

    fn count_pickups(&mut self) {
        let mut counts: BTreeMap<PickupTag, usize> = BTreeMap::new();
        for cart in &self.carts {
            if let Some(modifier) = cart.modifier.as_ref() {
                *counts.entry(Pickup::Modifier(modifier.clone()).tag()).or_default() += 1;
            }
            if let Some(item) = cart.carried.as_ref() {
                *counts.entry(item.tag()).or_default() += 1;
            }
        }
        for tile in self.level.tiles() {
            if let Some(pickup) = tile.pickup.as_ref() {
                *counts.entry(pickup.tag()).or_default() += 1;
            }
        }
        self.pickup_counts = counts;
    }

    fn tick_darkness<R: Rng + ?Sized>(&mut self, rng: &mut R, sink: &mut dyn EventSink) {
        let Some(old) = self.darkness else {
            return;
        };
        let counter = old + DARKNESS_STEP;
        if old < DARKNESS_SHUFFLE_AT && counter >= DARKNESS_SHUFFLE_AT {
            self.shuffle_carts(rng);
            sink.emit(GameEvent::DarknessShuffle);
        }
        self.darkness = (counter < DARKNESS_END_AT).then_some(counter);
    }

    /// Move every placed cart to a free position; carts without one stay put.
    fn shuffle_carts<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for idx in 0..self.carts.len() {
            if self.carts[idx].position.is_none() {
                continue;
            }
            let found = (0..SHUFFLE_PLACEMENT_ATTEMPTS).find_map(|_| self.get_free_position(rng));
            let Some(position) = found else {
                trace!("no free position for {} in the dark", self.carts[idx].id);
                continue;
            };
            let cart = &mut self.carts[idx];
            cart.lift(&mut self.level);
            cart.place(&mut self.level, position);
        }
    }

    fn retire_mirrors(&mut self, sink: &mut dyn EventSink) {
        let links = std::mem::take(&mut self.mirrors);
        for link in links {
            let active = self
                .cart(link.holder)
                .and_then(|c| c.modifier.as_ref())
                .and_then(Modifier::twin)
                == Some(link.twin);
            if active {
                self.mirrors.push(link);
                continue;
            }
            if let Some(idx) = self.index_of(link.twin) {
                let mut twin = self.carts.remove(idx);
                twin.lift(&mut self.level);
                debug!("mirror of {} expired, removing {}", link.holder, link.twin);
                sink.emit(GameEvent::TwinRetired { twin: link.twin });
            }
        }
    }

    /// Hash of the dynamic state, for comparing reruns.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for cart in &self.carts {
            hasher.write_u32(cart.id.0);
            hasher.write_i32(cart.score);
            hasher.write_i32(cart.speed);
            if let Some(pos) = cart.position {
                hasher.write_usize(pos.tile.0);
                hasher.write_i32(pos.progress);
                hasher.write_u8(u8::from(pos.is_reversed()));
            }
            if let Some(item) = cart.carried.as_ref() {
                hasher.write(item.tag().to_string().as_bytes());
            }
        }
        for tile in self.level.tiles() {
            hasher.write_u8(tile.trail.kind.to_byte());
            hasher.write_u8(u8::from(tile.gate_down));
            if let Some(pickup) = tile.pickup.as_ref() {
                hasher.write(pickup.tag().to_string().as_bytes());
            }
        }
        hasher.write_u32(self.darkness.unwrap_or(u32::MAX));
        hasher.finish()
    }
}

/// Pickup rules: a rock blocks everything, a second diamond is refused, gold
/// needs an axe, flags belong to their owner, and power-ups are refused while
/// holding dynamite or a collectible.
fn accepts(cart: &Cart, pickup: &Pickup) -> bool {
    match (pickup, cart.carried.as_ref()) {
        (_, Some(Carried::Collectible(Collectible::RockBlock))) => false,
        (Pickup::Collectible(Collectible::Diamond), Some(held)) => !held.is(PickupTag::Diamond),
        (Pickup::Collectible(Collectible::GoldBlock), held) => {
            held.is_some_and(|h| h.is(PickupTag::Axe))
        }
        (Pickup::Collectible(Collectible::Flag { owner }), _) => *owner == cart.owner,
        (Pickup::PowerUp(_), Some(Carried::PowerUp(PowerUp::Dynamite { .. })))
        | (Pickup::PowerUp(_), Some(Carried::Collectible(_))) => false,
        _ => true,
    }
}

/// Two distinct carts borrowed mutably at once.
fn pair_mut(carts: &mut [Cart], a: usize, b: usize) -> (&mut Cart, &mut Cart) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = carts.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = carts.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::tile::{Tile, TilePos, TileShape};

    fn column(len: i32) -> Level {
        Level::from_tiles((0..len).map(|y| Tile::new(TilePos::new(0, y, 0), TileShape::Flat)))
    }

    fn placed(field: &mut Playfield, y: i32, progress: i32) -> CartId {
        let tile = field.level.tile_at(0, y).expect("tile");
        field.add_cart_at(0, TrailPosition::new(tile, progress))
    }

    #[test]
    fn ranking_groups_equal_scores() {
        let mut field = Playfield::new(column(1));
        let a = field.add_cart(0);
        let b = field.add_cart(1);
        let c = field.add_cart(2);
        field.cart_mut(a).expect("a").score = 3;
        field.cart_mut(b).expect("b").score = 5;
        field.cart_mut(c).expect("c").score = 3;
        assert_eq!(field.ranking(), vec![vec![b], vec![a, c]]);
    }

    #[test]
    fn load_amounts_follow_the_ranking() {
        let mut field = Playfield::new(column(1));
        let a = field.add_cart(0);
        let b = field.add_cart(1);
        let c = field.add_cart(2);
        field.cart_mut(a).expect("a").score = 9;
        field.cart_mut(b).expect("b").score = 8;
        field.cart_mut(c).expect("c").score = 1;
        field.tick(&RngBundle::from_user_seed(1), &mut NullSink);
        let loads: Vec<u8> = [a, b, c]
            .iter()
            .map(|id| field.cart(*id).expect("cart").load_amount())
            .collect();
        assert_eq!(loads, vec![3, 2, 1]);
    }

    #[test]
    fn a_scoreless_cart_stays_empty() {
        let mut field = Playfield::new(column(1));
        let id = field.add_cart(0);
        field.tick(&RngBundle::from_user_seed(1), &mut NullSink);
        assert_eq!(field.cart(id).expect("cart").load_amount(), 0);
    }

    #[test]
    fn free_positions_keep_clearance() {
        let mut field = Playfield::new(column(3));
        let id = placed(&mut field, 1, 500);
        let middle = field.level.tile_at(0, 1).expect("middle");
        let top = field.level.tile_at(0, 0).expect("top");
        assert!(!field.is_free_position(&TrailPosition::new(middle, 0), None));
        assert!(field.is_free_position(&TrailPosition::new(middle, 0), Some(id)));
        assert!(field.is_free_position(&TrailPosition::new(top, 0), None));
        // 599 away is inside the 600 clearance.
        assert!(!field.is_free_position(&TrailPosition::new(top, 901), None));
    }

    #[test]
    fn spawning_uses_portals_until_every_cart_is_placed() {
        let level = Level::from_tiles([
            Tile::new(TilePos::new(0, 0, 0), TileShape::Portal),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
        ]);
        let portal = level.first_portal().expect("portal");
        let mut field = Playfield::new(level);
        field.add_cart(0);
        let rng = RngBundle::from_user_seed(3);
        assert!(field.spawn_next_cart(false, &mut *rng.placement()));
        assert_eq!(field.carts()[0].position.map(|p| p.tile), Some(portal));
        assert!(!field.spawn_next_cart(false, &mut *rng.placement()));
    }

    #[test]
    fn carts_collect_coins_and_refuse_gold_without_an_axe() {
        let mut field = Playfield::new(column(3));
        let id = placed(&mut field, 0, 900);
        let middle = field.level.tile_at(0, 1).expect("middle");
        let bottom = field.level.tile_at(0, 2).expect("bottom");
        field.level[middle].pickup = Some(Pickup::coin());
        field.level[bottom].pickup = Some(Pickup::Collectible(Collectible::GoldBlock));
        field.cart_mut(id).expect("cart").speed = 200;
        let rng = RngBundle::from_user_seed(1);
        let mut events = Vec::new();
        field.tick(&rng, &mut events);
        assert_eq!(field.cart(id).expect("cart").score, 1);
        assert!(field.level[middle].pickup.is_none());
        assert!(matches!(events.as_slice(), [GameEvent::CoinPickup { score: 1, .. }]));

        for _ in 0..8 {
            field.tick(&rng, &mut NullSink);
        }
        assert_eq!(field.cart(id).and_then(|c| c.position).map(|p| p.tile), Some(bottom));
        assert!(field.level[bottom].pickup.is_some());
        assert_eq!(field.pickup_count(PickupTag::GoldBlock), 1);
    }

    #[test]
    fn torch_starts_darkness_that_shuffles_and_ends() {
        let mut field = Playfield::new(column(6));
        let id = placed(&mut field, 0, 100);
        let top = field.level.tile_at(0, 0).expect("top");
        field.level[top].pickup = Some(Pickup::Torch);
        let rng = RngBundle::from_user_seed(9);
        let mut events = Vec::new();
        field.tick(&rng, &mut events);
        assert_eq!(field.darkness(), Some(DARKNESS_STEP));
        assert!(field.level[top].pickup.is_none());
        assert!(field.cart(id).and_then(|c| c.carried.as_ref()).is_none());

        for _ in 0..40 {
            field.tick(&rng, &mut events);
        }
        assert_eq!(field.darkness(), None);
        assert_eq!(events.iter().filter(|e| **e == GameEvent::DarknessStart).count(), 1);
        assert_eq!(events.iter().filter(|e| **e == GameEvent::DarknessShuffle).count(), 1);
    }

    #[test]
    fn mirror_spawns_a_twin_whose_score_drains_into_the_holder() {
        let mut field = Playfield::new(column(8));
        let holder = placed(&mut field, 0, 100);
        let top = field.level.tile_at(0, 0).expect("top");
        field.level[top].pickup = Some(Pickup::Modifier(Modifier::mirror()));
        let rng = RngBundle::from_user_seed(4);
        let mut events = Vec::new();
        field.tick(&rng, &mut events);

        let Some(GameEvent::TwinSpawned { twin, .. }) = events
            .iter()
            .find(|e| matches!(e, GameEvent::TwinSpawned { .. }))
            .cloned()
        else {
            panic!("no twin spawned: {events:?}");
        };
        assert_eq!(field.carts().len(), 2);
        assert_eq!(field.cart(twin).map(|c| c.owner), Some(0));

        field.cart_mut(twin).expect("twin").score = 4;
        field.tick(&rng, &mut NullSink);
        assert_eq!(field.cart(holder).map(|c| c.score), Some(4));
        assert_eq!(field.cart(twin).map(|c| c.score), Some(0));

        if let Some(Modifier::Mirror { ttl, .. }) =
            field.cart_mut(holder).and_then(|c| c.modifier.as_mut())
        {
            *ttl = 1;
        }
        let mut events = Vec::new();
        field.tick(&rng, &mut events);
        assert!(field.cart(twin).is_none());
        assert!(events.contains(&GameEvent::TwinRetired { twin }));
    }

    #[test]
    fn dynamite_on_a_cart_halves_the_score() {
        let mut field = Playfield::new(column(4));
        let id = placed(&mut field, 0, 100);
        assert!(field.spawn_dynamite_on_cart(id));
        assert!(!field.spawn_dynamite_on_cart(id));
        let cart = field.cart_mut(id).expect("cart");
        cart.score = 7;
        cart.carried = Some(Carried::PowerUp(PowerUp::Dynamite { life: 0.0 }));
        let rng = RngBundle::from_user_seed(2);
        let mut events = Vec::new();
        field.tick(&rng, &mut events);
        let cart = field.cart(id).expect("cart");
        assert_eq!(cart.score, 3);
        assert!(cart.carried.is_none());
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Explosion { cart: Some(c), lost: 4, .. } if *c == id
        )));
    }

    #[test]
    fn dynamite_on_a_tile_burns_down_and_disappears() {
        let mut field = Playfield::new(column(2));
        let bottom = field.level.tile_at(0, 1).expect("bottom");
        field.level[bottom].pickup = Some(Pickup::PowerUp(PowerUp::Dynamite { life: 0.001 }));
        let rng = RngBundle::from_user_seed(2);
        let mut events = Vec::new();
        field.tick(&rng, &mut events);
        assert!(field.level[bottom].pickup.is_none());
        assert_eq!(
            events,
            vec![GameEvent::Explosion {
                cart: None,
                tile: bottom,
                lost: 0
            }]
        );
    }

    #[test]
    fn closer_cart_keeps_a_shared_switch() {
        let mut field = Playfield::new(Level::from_tiles([
            Tile::new(TilePos::new(0, -2, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, -1, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 0, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(-1, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(1, 1, 0), TileShape::Flat),
        ]));
        let junction = field.level.tile_at(0, 1).expect("junction");
        let far = field.add_cart_at(
            0,
            TrailPosition::new(field.level.tile_at(0, -2).expect("far"), 0),
        );
        let near = field.add_cart_at(
            1,
            TrailPosition::new(field.level.tile_at(0, 0).expect("near"), 0),
        );
        assert_eq!(field.cart(far).and_then(|c| c.pending_switch), Some(junction));
        assert_eq!(field.cart(near).and_then(|c| c.pending_switch), Some(junction));
        let rng = RngBundle::from_user_seed(5);
        field.tick(&rng, &mut NullSink);
        assert_eq!(field.cart(near).and_then(|c| c.pending_switch), Some(junction));
        assert_eq!(field.cart(far).and_then(|c| c.pending_switch), None);
    }

    #[test]
    fn digest_tracks_state() {
        let mut field = Playfield::new(column(3));
        placed(&mut field, 0, 0);
        let before = field.digest();
        assert_eq!(before, field.clone().digest());
        field.tick(&RngBundle::from_user_seed(1), &mut NullSink);
        assert_ne!(before, field.digest());
    }
}
