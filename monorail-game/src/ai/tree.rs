//! Budgeted, incrementally extended prediction tree.
//!
//! Nodes live in an arena where every child sits at a higher index than its
//! parent, so best scores propagate in one reverse sweep. Node states are
//! immutable; reusing work means promoting an existing child to the root and
//! compacting its subtree, never editing states in place.
use log::{debug, trace};
use smallvec::SmallVec;
use std::collections::VecDeque;

use crate::ai::snapshot::{Forecast, NodeState, WorldSnapshot};
use crate::cart::CartId;
use crate::config::TreeConfig;
use crate::direction::Direction;
use crate::tile::TileId;

#[derive(Debug, Clone)]
struct Node {
    state: NodeState,
    /// Exit taken from the parent's tile to get here.
    via: Option<Direction>,
    generation: u32,
    score: i32,
    best: i32,
    /// `None` until expanded.
    children: Option<Vec<usize>>,
}

impl Node {
    const fn root(state: NodeState) -> Self {
        Self {
            state,
            via: None,
            generation: 0,
            score: 0,
            best: 0,
            children: None,
        }
    }
}

/// How [`PredictionTree::set_root`] reconciled the new root with the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootChange {
    Kept,
    /// A child matched and its subtree was reused.
    Promoted,
    Rebuilt,
}

#[derive(Debug, Clone)]
pub struct PredictionTree {
    nodes: Vec<Node>,
    frontier: VecDeque<usize>,
    config: TreeConfig,
}

impl PredictionTree {
    #[must_use]
    pub const fn new(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            frontier: VecDeque::new(),
            config,
        }
    }

    #[must_use]
    pub fn root_state(&self) -> Option<NodeState> {
        self.nodes.first().map(|n| n.state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Best achievable score from the root.
    #[must_use]
    pub fn best_score(&self) -> Option<i32> {
        self.nodes.first().map(|n| n.best)
    }

    /// Deepest generation currently in the tree.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.generation).max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.frontier.clear();
    }

    /// Re-root the tree at `state`, reusing a matching child subtree when possible.
    pub fn set_root(&mut self, state: NodeState) -> RootChange {
        let Some(root) = self.nodes.first() else {
            self.rebuild(state);
            return RootChange::Rebuilt;
        };
        if root.state == state {
            return RootChange::Kept;
        }
        let matching = root
            .children
            .iter()
            .flatten()
            .copied()
            .find(|&child| self.nodes[child].state == state);
        if let Some(child) = matching {
            self.promote(child);
            RootChange::Promoted
        } else {
            debug!(
                "prediction root diverged at tile {}, rebuilding",
                state.tile
            );
            self.rebuild(state);
            RootChange::Rebuilt
        }
    }

    fn rebuild(&mut self, state: NodeState) {
        self.nodes.clear();
        self.nodes.push(Node::root(state));
        self.frontier.clear();
        self.frontier.push_back(0);
    }

    /// Keep only the subtree under `new_root`, in breadth-first order.
    fn promote(&mut self, new_root: usize) {
        let base = self.nodes[new_root].generation;
        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([new_root]);
        while let Some(old) = queue.pop_front() {
            remap[old] = order.len();
            order.push(old);
            queue.extend(self.nodes[old].children.iter().flatten().copied());
        }

        let mut nodes = Vec::with_capacity(order.len());
        for &old in &order {
            let mut node = self.nodes[old].clone();
            node.generation -= base;
            node.children = node
                .children
                .map(|kids| kids.into_iter().map(|k| remap[k]).collect());
            nodes.push(node);
        }
        // The root is the present; only what lies ahead is scored.
        if let Some(root) = nodes.first_mut() {
            root.via = None;
            root.score = 0;
        }
        trace!(
            "promoted child subtree: kept {} of {} nodes",
            nodes.len(),
            self.nodes.len()
        );
        self.nodes = nodes;
        self.frontier = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.children.is_none())
            .map(|(idx, _)| idx)
            .collect();
    }

    /// Rescore every node, extend the frontier within budget and refresh best scores.
    pub fn update(&mut self, snapshot: &WorldSnapshot<'_>) {
        if self.nodes.is_empty() {
            return;
        }
        for idx in 1..self.nodes.len() {
            let node = &self.nodes[idx];
            let score = snapshot.score(&node.state, node.generation);
            self.nodes[idx].score = score;
        }
        self.expand(snapshot);
        self.propagate();
    }

    fn expand(&mut self, snapshot: &WorldSnapshot<'_>) {
        let budget = self.config.max_nodes_per_update;
        let mut created = 0;
        while let Some(&idx) = self.frontier.front() {
            let generation = self.nodes[idx].generation;
            if generation >= self.config.max_generation {
                // Stays a leaf until a promotion brings it closer to the root.
                self.frontier.pop_front();
                continue;
            }
            let successors = snapshot.successors(&self.nodes[idx].state);
            if created + successors.len() > budget
                || self.nodes.len() + successors.len() > self.config.max_tree_nodes
            {
                break;
            }
            self.frontier.pop_front();
            let mut children = Vec::with_capacity(successors.len());
            for successor in successors {
                let child = self.nodes.len();
                self.nodes.push(Node {
                    state: successor.state,
                    via: Some(successor.via),
                    generation: generation + 1,
                    score: snapshot.score(&successor.state, generation + 1),
                    best: 0,
                    children: None,
                });
                self.frontier.push_back(child);
                children.push(child);
                created += 1;
            }
            self.nodes[idx].children = Some(children);
        }
        if created > 0 {
            trace!("expanded {created} nodes, {} total", self.nodes.len());
        }
    }

    fn propagate(&mut self) {
        for idx in (0..self.nodes.len()).rev() {
            let best_child = self.nodes[idx]
                .children
                .iter()
                .flatten()
                .map(|&child| self.nodes[child].best)
                .max();
            let node = &mut self.nodes[idx];
            node.best = node.score + best_child.unwrap_or(0);
        }
    }

    /// Children sharing the highest best score, in arena order.
    fn best_children(&self, idx: usize) -> SmallVec<[usize; 4]> {
        let Some(children) = self.nodes[idx].children.as_ref() else {
            return SmallVec::new();
        };
        let Some(top) = children.iter().map(|&c| self.nodes[c].best).max() else {
            return SmallVec::new();
        };
        children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].best == top)
            .collect()
    }

    /// Exit the tree recommends at `switch` when entered from `from`.
    ///
    /// Follows the best path from the root until it reaches the switch, then
    /// answers only when exactly one child is strictly best.
    #[must_use]
    pub fn advice(&self, switch: TileId, from: Direction) -> Option<Direction> {
        let mut idx = 0;
        loop {
            let node = self.nodes.get(idx)?;
            if node.state.tile == switch && node.state.entry == from {
                break;
            }
            idx = *self.best_children(idx).first()?;
        }
        match self.best_children(idx).as_slice() {
            [only] => self.nodes[*only].via,
            _ => None,
        }
    }

    /// Tiles along the best path from the root.
    #[must_use]
    pub fn forecast(&self, cart: CartId) -> Forecast {
        let mut path = Vec::new();
        let mut idx = 0;
        while let Some(node) = self.nodes.get(idx) {
            path.push(node.state.tile);
            match self.best_children(idx).first() {
                Some(&next) => idx = next,
                None => break,
            }
        }
        Forecast { cart, path }
    }
}
