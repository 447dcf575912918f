//! Computer opponents: world snapshots, prediction trees and controllers.
//!
//! Every computer cart keeps a [`PredictionTree`] rooted at the tile it is
//! on. Each tick the tree is rescored against a [`WorldSnapshot`], grown by a
//! bounded number of nodes and asked which exit of the pending switch leads
//! to the best predicted path.
pub mod controller;
pub mod snapshot;
pub mod tree;

pub use controller::{
    AiController, CartController, ControlView, GroundControl, HumanController, InputState,
};
pub use snapshot::{Forecast, NodeState, Successor, WorldSnapshot};
pub use tree::{PredictionTree, RootChange};
