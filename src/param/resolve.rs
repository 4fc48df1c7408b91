//! Parameter tree resolution
//!
//! Resolution never fails and always terminates: dangling indices, empty
//! blends, missing references and cycles all fall back to a node's
//! `default_value`. Each fallback is
//! reported as a [`Recovery`] so callers and tests can tell the difference.

use super::interpolation::resolve_interpolation;
use super::node::{NodeIndex, OwnerKind, ParamReference, ParamTree, ReferenceOwner, ResolutionMode, ValueNode};
use super::source::ParameterSource;
use super::value::DynamicValue;
use crate::consts::{MAX_RESOLVE_DEPTH, MAX_RESOLVE_VISITS, NODE_INDEX_PRIME};
use crate::sim::state::{UnitId, UnitRegistry};

/// State of the pattern a resolution runs on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LivePattern {
    pub pattern_index: u32,
    pub shots_fired: u32,
    pub time_played: f32,
}

/// Everything a resolution may read
pub struct ResolveContext<'a> {
    /// Units, their memos and the deterministic RNG
    pub registry: &'a mut UnitRegistry,
    /// External global parameter table
    pub globals: &'a dyn ParameterSource,
    /// Unit the resolution runs on (nearest bullet of the owner)
    pub unit: Option<UnitId>,
    pub live: Option<LivePattern>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(registry: &'a mut UnitRegistry, globals: &'a dyn ParameterSource) -> Self {
        Self {
            registry,
            globals,
            unit: None,
            live: None,
        }
    }

    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_live(mut self, live: LivePattern) -> Self {
        self.live = Some(live);
        self
    }
}

/// A silent recovery performed while resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Index 0 or past the end of the tree
    DanglingIndex(NodeIndex),
    /// Blend node without children, used as Fixed
    EmptyBlend(NodeIndex),
    /// Referenced parameter missing or of another type
    MissingReference { node: NodeIndex, name: String },
    /// Gradient sampling on a value type that has no gradient form
    UnsupportedGradient(NodeIndex),
    /// Node reached again while resolving itself
    Cycle(NodeIndex),
    /// Recursion deeper than `MAX_RESOLVE_DEPTH`
    DepthExceeded(NodeIndex),
    /// More than `MAX_RESOLVE_VISITS` nodes visited in one resolution
    VisitsExceeded(NodeIndex),
}

/// Resolved value plus the recoveries that produced it
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    pub value: T,
    pub recoveries: Vec<Recovery>,
}

impl<T> Resolution<T> {
    pub fn recovered(&self) -> bool {
        !self.recoveries.is_empty()
    }
}

/// Resolve a node of a tree to a concrete value
pub fn resolve<T: DynamicValue>(
    tree: &ParamTree<T>,
    index: NodeIndex,
    operation_id: u32,
    owner: OwnerKind,
    ctx: &mut ResolveContext<'_>,
) -> T {
    resolve_detailed(tree, index, operation_id, owner, ctx).value
}

/// [`resolve`], also reporting every recovery
pub fn resolve_detailed<T: DynamicValue>(
    tree: &ParamTree<T>,
    index: NodeIndex,
    operation_id: u32,
    owner: OwnerKind,
    ctx: &mut ResolveContext<'_>,
) -> Resolution<T> {
    let mut resolver = Resolver {
        tree,
        operation_id,
        owner,
        path: Vec::new(),
        visits: 0,
        recoveries: Vec::new(),
    };
    let value = resolver.node(index, &tree.root().default_value, 0, ctx);
    for recovery in &resolver.recoveries {
        log::debug!("parameter resolution recovered: {recovery:?}");
    }
    Resolution {
        value,
        recoveries: resolver.recoveries,
    }
}

struct Resolver<'t, T> {
    tree: &'t ParamTree<T>,
    operation_id: u32,
    owner: OwnerKind,
    /// Nodes being resolved, root first
    path: Vec<NodeIndex>,
    visits: u32,
    recoveries: Vec<Recovery>,
}

impl<T: DynamicValue> Resolver<'_, T> {
    /// `fallback` is the default of the nearest valid node above `index`
    fn node(&mut self, index: NodeIndex, fallback: &T, depth: u32, ctx: &mut ResolveContext<'_>) -> T {
        let tree = self.tree;
        let Some(node) = tree.node(index) else {
            self.recoveries.push(Recovery::DanglingIndex(index));
            return fallback.clone();
        };
        if self.path.contains(&index) {
            self.recoveries.push(Recovery::Cycle(index));
            return node.default_value.clone();
        }
        if depth > MAX_RESOLVE_DEPTH {
            self.recoveries.push(Recovery::DepthExceeded(index));
            return node.default_value.clone();
        }
        if self.visits >= MAX_RESOLVE_VISITS {
            self.recoveries.push(Recovery::VisitsExceeded(index));
            return node.default_value.clone();
        }
        self.visits += 1;

        self.path.push(index);
        let value = self.mode(index, node, depth, ctx);
        self.path.pop();
        value
    }

    fn mode(&mut self, index: NodeIndex, node: &ValueNode<T>, depth: u32, ctx: &mut ResolveContext<'_>) -> T {
        match &node.mode {
            ResolutionMode::Fixed => node.default_value.clone(),

            ResolutionMode::EqualToReference(reference) => {
                match self.reference(reference, ctx) {
                    Some(value) => value,
                    None => {
                        self.recoveries.push(Recovery::MissingReference {
                            node: index,
                            name: reference.name.clone(),
                        });
                        node.default_value.clone()
                    }
                }
            }

            ResolutionMode::FromTo { from, to } => {
                let selector =
                    resolve_interpolation(&node.interpolation, self.node_operation(index), self.owner, ctx);
                let from = self.node(*from, &node.default_value, depth + 1, ctx);
                let to = self.node(*to, &node.default_value, depth + 1, ctx);
                T::lerp(&from, &to, selector)
            }

            ResolutionMode::Blend { children } => {
                if children.is_empty() {
                    self.recoveries.push(Recovery::EmptyBlend(index));
                    return node.default_value.clone();
                }
                let selector =
                    resolve_interpolation(&node.interpolation, self.node_operation(index), self.owner, ctx);
                let chosen = self.pick_blend_child(children, selector);
                self.node(chosen, &node.default_value, depth + 1, ctx)
            }

            ResolutionMode::FromGradient { gradient } => {
                let selector =
                    resolve_interpolation(&node.interpolation, self.node_operation(index), self.owner, ctx);
                match T::sample_gradient(gradient, selector) {
                    Some(value) => value,
                    None => {
                        self.recoveries.push(Recovery::UnsupportedGradient(index));
                        node.default_value.clone()
                    }
                }
            }
        }
    }

    /// Distinct operation id per node, so sibling random factors are independent
    fn node_operation(&self, index: NodeIndex) -> u32 {
        self.operation_id ^ index.0.wrapping_mul(NODE_INDEX_PRIME)
    }

    fn pick_blend_child(&self, children: &[NodeIndex], selector: f32) -> NodeIndex {
        let first = children[0];
        let last = children[children.len() - 1];
        if children.len() == 1 || selector <= 0.0 {
            return first;
        }
        if selector >= 1.0 {
            return last;
        }

        let weights: Vec<f32> = children
            .iter()
            .map(|&child| {
                self.tree
                    .node(child)
                    .map(|n| n.weight.max(0.0))
                    .filter(|w| w.is_finite())
                    .unwrap_or(0.0)
            })
            .collect();
        let total: f32 = weights.iter().sum();

        let mut cumulative = 0.0;
        for (i, &child) in children.iter().enumerate() {
            let share = if total > 0.0 {
                weights[i] / total
            } else {
                1.0 / children.len() as f32
            };
            cumulative += share;
            if cumulative >= selector {
                return child;
            }
        }
        last
    }

    fn reference(&self, reference: &ParamReference, ctx: &ResolveContext<'_>) -> Option<T> {
        match reference.owner {
            ReferenceOwner::Global => ctx.globals.lookup(&reference.name).and_then(T::from_payload),
            ReferenceOwner::Hierarchy => {
                let unit = ctx.registry.ancestor(ctx.unit?, reference.ancestor_distance)?;
                unit.custom.lookup(&reference.name).and_then(T::from_payload)
            }
        }
    }
}

impl<T: DynamicValue> ParamTree<T> {
    /// Resolve the root node
    pub fn resolve(&self, operation_id: u32, owner: OwnerKind, ctx: &mut ResolveContext<'_>) -> T {
        resolve(self, NodeIndex::ROOT, operation_id, owner, ctx)
    }
}

impl<T: DynamicValue> super::node::DynamicParam<T> {
    /// Resolve with the parameter's own operation id
    pub fn resolve(&self, owner: OwnerKind, ctx: &mut ResolveContext<'_>) -> T {
        self.tree.resolve(self.operation_id, owner, ctx)
    }
}
