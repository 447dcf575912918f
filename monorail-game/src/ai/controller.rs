//! Human and computer controllers plus the per-tick control loop.
use log::{debug, trace};
use rand::{Rng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ai::snapshot::{Forecast, NodeState, WorldSnapshot};
use crate::ai::tree::{PredictionTree, RootChange};
use crate::cart::{Cart, CartId};
use crate::config::TreeConfig;
use crate::constants::{AI_IDLE_PRESS_ODDS, AI_RANDOM_PRESS_ODDS};
use crate::direction::Direction;
use crate::events::EventSink;
use crate::level::Level;
use crate::pickups::Carried;
use crate::playfield::Playfield;

/// Buttons that went down since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    went_down: BTreeSet<u8>,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: u8) {
        self.went_down.insert(button);
    }

    #[must_use]
    pub fn went_down(&self, button: u8) -> bool {
        self.went_down.contains(&button)
    }

    pub fn clear(&mut self) {
        self.went_down.clear();
    }
}

/// What a controller may look at when deciding.
#[derive(Debug, Clone, Copy)]
pub struct ControlView<'a> {
    pub cart: &'a Cart,
    pub level: &'a Level,
    pub tree: Option<&'a PredictionTree>,
}

/// Decides, once per tick, whether its cart's button is pressed.
pub trait CartController: fmt::Debug {
    fn cart(&self) -> CartId;

    /// Computer controllers need prediction trees to be maintained.
    fn is_computer(&self) -> bool {
        false
    }

    fn wants_press(
        &mut self,
        view: &ControlView<'_>,
        input: &InputState,
        rng: &mut dyn RngCore,
    ) -> bool;
}

#[derive(Debug, Clone)]
pub struct HumanController {
    cart: CartId,
    button: u8,
}

impl HumanController {
    #[must_use]
    pub const fn new(cart: CartId, button: u8) -> Self {
        Self { cart, button }
    }
}

impl CartController for HumanController {
    fn cart(&self) -> CartId {
        self.cart
    }

    fn wants_press(
        &mut self,
        _view: &ControlView<'_>,
        input: &InputState,
        _rng: &mut dyn RngCore,
    ) -> bool {
        input.went_down(self.button)
    }
}

/// Follows its prediction tree with probability `iq`, otherwise presses at random.
#[derive(Debug, Clone)]
pub struct AiController {
    cart: CartId,
    iq: f32,
    best_dir: Option<Direction>,
}

impl AiController {
    #[must_use]
    pub const fn new(cart: CartId, iq: f32) -> Self {
        Self {
            cart,
            iq,
            best_dir: None,
        }
    }

    /// Exit recommended at the pending switch during the last decision.
    #[must_use]
    pub const fn best_dir(&self) -> Option<Direction> {
        self.best_dir
    }
}

impl CartController for AiController {
    fn cart(&self) -> CartId {
        self.cart
    }

    fn is_computer(&self) -> bool {
        true
    }

    fn wants_press(
        &mut self,
        view: &ControlView<'_>,
        _input: &InputState,
        rng: &mut dyn RngCore,
    ) -> bool {
        let Some(switch) = view.cart.pending_switch else {
            return false;
        };
        self.best_dir = view
            .tree
            .and_then(|tree| tree.advice(switch, view.cart.switch_dir));

        if rng.r#gen::<f32>() >= self.iq {
            return rng.gen_range(0..AI_RANDOM_PRESS_ODDS) == 0;
        }
        match self.best_dir {
            None => rng.gen_range(0..AI_IDLE_PRESS_ODDS) == 0,
            Some(dir) => {
                let tile = &view.level[switch];
                let on_track = dir == tile.in_direction() || dir == tile.out_direction();
                !on_track && rng.r#gen::<f32>() < self.iq
            }
        }
    }
}

/// Runs every controller and keeps one prediction tree per controlled cart.
#[derive(Debug)]
pub struct GroundControl {
    controllers: Vec<Box<dyn CartController>>,
    trees: BTreeMap<CartId, PredictionTree>,
    forecasts: Vec<Forecast>,
    tree_config: TreeConfig,
}

impl GroundControl {
    #[must_use]
    pub const fn new(tree_config: TreeConfig) -> Self {
        Self {
            controllers: Vec::new(),
            trees: BTreeMap::new(),
            forecasts: Vec::new(),
            tree_config,
        }
    }

    pub fn add_controller(&mut self, controller: Box<dyn CartController>) {
        self.trees
            .insert(controller.cart(), PredictionTree::new(self.tree_config.clone()));
        self.controllers.push(controller);
    }

    #[must_use]
    pub fn contains_ai(&self) -> bool {
        self.controllers.iter().any(|c| c.is_computer())
    }

    #[must_use]
    pub fn tree(&self, cart: CartId) -> Option<&PredictionTree> {
        self.trees.get(&cart)
    }

    /// Best paths captured at the end of the last tick.
    #[must_use]
    pub fn forecasts(&self) -> &[Forecast] {
        &self.forecasts
    }

    /// Let every controller act, then refresh the prediction trees.
    pub fn tick(
        &mut self,
        field: &mut Playfield,
        input: &InputState,
        rng: &mut dyn RngCore,
        sink: &mut dyn EventSink,
    ) {
        for controller in &mut self.controllers {
            let id = controller.cart();
            let press = {
                let Some(cart) = field.cart(id) else {
                    continue;
                };
                let view = ControlView {
                    cart,
                    level: &field.level,
                    tree: self.trees.get(&id),
                };
                controller.wants_press(&view, input, rng)
            };
            if press {
                trace!("{id} presses its button");
                field.keydown(id, sink);
            }
        }

        if self.contains_ai() {
            self.update_trees(field);
        }
    }

    /// Trees read only the forecasts of the previous tick.
    fn update_trees(&mut self, field: &Playfield) {
        let previous = std::mem::take(&mut self.forecasts);
        let mut next = Vec::with_capacity(self.trees.len());
        for (&id, tree) in &mut self.trees {
            let Some(cart) = field.cart(id) else {
                tree.clear();
                continue;
            };
            let Some(pos) = cart.position else {
                tree.clear();
                continue;
            };
            let root = NodeState {
                tile: pos.tile,
                entry: pos.in_direction(&field.level),
                cargo: cart.carried.as_ref().map(Carried::tag),
            };
            if tree.set_root(root) == RootChange::Rebuilt {
                debug!("{id} prediction tree rebuilt at tile {}", pos.tile);
            }
            let snapshot = WorldSnapshot::new(&field.level, id, cart.owner, &previous);
            tree.update(&snapshot);
            next.push(tree.forecast(id));
        }
        self.forecasts = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::pickups::Pickup;
    use crate::position::TrailPosition;
    use crate::rng::RngBundle;
    use crate::tile::{Tile, TilePos, TileShape};

    fn junction_field() -> (Playfield, CartId) {
        let level = Level::from_tiles([
            Tile::new(TilePos::new(0, 0, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 2, 0), TileShape::Flat),
            Tile::new(TilePos::new(-1, 2, 0), TileShape::Flat),
            Tile::new(TilePos::new(1, 2, 0), TileShape::Flat),
        ]);
        let start = level.tile_at(0, 0).expect("start");
        let mut field = Playfield::new(level);
        let id = field.add_cart_at(0, TrailPosition::new(start, 0));
        (field, id)
    }

    #[test]
    fn humans_press_on_their_button_edge() {
        let (mut field, id) = junction_field();
        let mut control = GroundControl::new(TreeConfig::default());
        control.add_controller(Box::new(HumanController::new(id, 3)));
        assert!(!control.contains_ai());
        let junction = field.level.tile_at(0, 2).expect("junction");
        let before = field.level[junction].trail.kind;

        let rng = RngBundle::from_user_seed(1);
        let mut input = InputState::new();
        control.tick(&mut field, &input, &mut *rng.ai(), &mut NullSink);
        assert_eq!(field.level[junction].trail.kind, before);

        input.press(3);
        let mut events = Vec::new();
        control.tick(&mut field, &input, &mut *rng.ai(), &mut events);
        assert_ne!(field.level[junction].trail.kind, before);
        assert_eq!(events.len(), 1);
        assert!(control.tree(id).is_some_and(PredictionTree::is_empty));
    }

    #[test]
    fn a_perfect_ai_steers_towards_the_coin() {
        let (mut field, id) = junction_field();
        let junction = field.level.tile_at(0, 2).expect("junction");
        let east = field.level.tile_at(1, 2).expect("east");
        field.level[east].pickup = Some(Pickup::coin());
        let cart = field.cart(id).cloned().expect("cart");
        assert_eq!(cart.pending_switch, Some(junction));
        cart.align_switch(&mut field.level);

        let mut control = GroundControl::new(TreeConfig::default());
        control.add_controller(Box::new(AiController::new(id, 1.0)));
        let rng = RngBundle::from_user_seed(7);
        let input = InputState::new();
        for _ in 0..3 {
            control.tick(&mut field, &input, &mut *rng.ai(), &mut NullSink);
        }
        let kind = field.level[junction].trail.kind;
        assert!(kind.connects(Direction::East), "{kind:?}");
        assert!(kind.connects(Direction::North));
        assert_eq!(control.forecasts().len(), 1);
        assert!(control.forecasts()[0].path.contains(&east));
    }
}
