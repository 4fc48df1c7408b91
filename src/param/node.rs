//! Parameter trees
//!
//! A parameter is a flat, append-only arena of [`ValueNode`]s addressed by
//! 1-based [`NodeIndex`]. Index 0 is never valid and index 1 is the root.
//! Nodes are never removed, so an index captured by an external reference
//! stays valid across edits.

use serde::{Deserialize, Serialize};

use super::interpolation::InterpolationSpec;
use super::value::DynamicValue;
use crate::curve::Gradient;
use crate::sim::reroll::RerollPolicy;

/// 1-based index of a node inside a [`ParamTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const INVALID: NodeIndex = NodeIndex(0);
    pub const ROOT: NodeIndex = NodeIndex(1);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Which kind of authored entity owns a parameter being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OwnerKind {
    #[default]
    Bullet,
    Shot,
    Pattern,
}

/// Where a referenced parameter lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceOwner {
    /// The external global parameter table
    Global,
    /// A custom parameter of an emission unit up the hierarchy
    Hierarchy,
}

/// Link to a named parameter held elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamReference {
    pub owner: ReferenceOwner,
    /// Steps up the emission hierarchy (hierarchy references only)
    #[serde(default)]
    pub ancestor_distance: u32,
    pub name: String,
}

impl ParamReference {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            owner: ReferenceOwner::Global,
            ancestor_distance: 0,
            name: name.into(),
        }
    }

    pub fn hierarchy(ancestor_distance: u32, name: impl Into<String>) -> Self {
        Self {
            owner: ReferenceOwner::Hierarchy,
            ancestor_distance,
            name: name.into(),
        }
    }
}

/// How a node turns into a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolutionMode {
    Fixed,
    FromTo { from: NodeIndex, to: NodeIndex },
    Blend { children: Vec<NodeIndex> },
    FromGradient { gradient: Gradient },
    EqualToReference(ParamReference),
}

/// One entry of a parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueNode<T> {
    pub mode: ResolutionMode,
    pub default_value: T,
    /// Share of a parent Blend (ignored elsewhere)
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub interpolation: InterpolationSpec,
}

fn default_weight() -> f32 {
    1.0
}

impl<T> ValueNode<T> {
    pub fn fixed(value: T) -> Self {
        Self {
            mode: ResolutionMode::Fixed,
            default_value: value,
            weight: default_weight(),
            interpolation: InterpolationSpec::default(),
        }
    }

    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationSpec) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Structural problem found by [`ParamTree::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeIssue {
    EmptyBlend { node: NodeIndex },
    DanglingChild { node: NodeIndex, child: NodeIndex },
    SelfReference { node: NodeIndex },
    /// `child` leads back to `node` through other nodes
    Cycle { node: NodeIndex, child: NodeIndex },
}

/// Authored tree that cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// No root node
    Empty,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::Empty => write!(f, "parameter tree has no root node"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Append-only arena of value nodes. Never empty: index 1 always exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParamTree<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ParamTree<T> {
    nodes: Vec<ValueNode<T>>,
}

/// Serialized form of a [`ParamTree`], checked before use
#[derive(Deserialize)]
struct RawParamTree<T> {
    nodes: Vec<ValueNode<T>>,
}

impl<T> TryFrom<RawParamTree<T>> for ParamTree<T> {
    type Error = TreeError;

    fn try_from(raw: RawParamTree<T>) -> Result<Self, Self::Error> {
        if raw.nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        Ok(Self { nodes: raw.nodes })
    }
}

impl<T> ParamTree<T> {
    /// Create a tree with its root node
    pub fn new(root: ValueNode<T>) -> Self {
        Self { nodes: vec![root] }
    }

    /// Append a node, returning its index
    pub fn push(&mut self, node: ValueNode<T>) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() as u32)
    }

    /// Look up a node; `None` for index 0 or out-of-range indices
    pub fn node(&self, index: NodeIndex) -> Option<&ValueNode<T>> {
        if !index.is_valid() {
            return None;
        }
        self.nodes.get(index.0 as usize - 1)
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut ValueNode<T>> {
        if !index.is_valid() {
            return None;
        }
        self.nodes.get_mut(index.0 as usize - 1)
    }

    pub fn root(&self) -> &ValueNode<T> {
        &self.nodes[0]
    }

    pub fn root_mut(&mut self) -> &mut ValueNode<T> {
        &mut self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree holds at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate `(index, node)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &ValueNode<T>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i as u32 + 1), node))
    }

    /// Report structural problems the resolver would silently recover from
    pub fn validate(&self) -> Vec<TreeIssue> {
        let mut issues = Vec::new();
        for (index, node) in self.iter() {
            if matches!(&node.mode, ResolutionMode::Blend { children } if children.is_empty()) {
                issues.push(TreeIssue::EmptyBlend { node: index });
            }
            for child in node.mode.children() {
                if child == index {
                    issues.push(TreeIssue::SelfReference { node: index });
                } else if self.node(child).is_none() {
                    issues.push(TreeIssue::DanglingChild { node: index, child });
                }
            }
        }
        self.find_cycles(&mut issues);
        issues
    }

    /// Depth-first walk from every node, reporting links back into the
    /// current path. Self links are reported separately.
    fn find_cycles(&self, issues: &mut Vec<TreeIssue>) {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        for (start, _) in self.iter() {
            if marks[start.0 as usize - 1] != Mark::New {
                continue;
            }
            // (node, its children, next child to visit)
            let mut stack = vec![(start, self.child_links(start), 0usize)];
            marks[start.0 as usize - 1] = Mark::OnPath;
            while let Some((node, children, next)) = stack.last_mut() {
                let node = *node;
                let Some(&child) = children.get(*next) else {
                    marks[node.0 as usize - 1] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *next += 1;
                if child == node || self.node(child).is_none() {
                    continue;
                }
                match marks[child.0 as usize - 1] {
                    Mark::OnPath => issues.push(TreeIssue::Cycle { node, child }),
                    Mark::Done => {}
                    Mark::New => {
                        marks[child.0 as usize - 1] = Mark::OnPath;
                        stack.push((child, self.child_links(child), 0));
                    }
                }
            }
        }
    }

    fn child_links(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.node(index).map(|node| node.mode.children()).unwrap_or_default()
    }
}

impl ResolutionMode {
    /// Nodes this mode resolves through, in order
    pub fn children(&self) -> Vec<NodeIndex> {
        match self {
            ResolutionMode::FromTo { from, to } => vec![*from, *to],
            ResolutionMode::Blend { children } => children.clone(),
            _ => Vec::new(),
        }
    }
}

impl<T: DynamicValue> ParamTree<T> {
    /// Tree made of a single Fixed root
    pub fn fixed(value: T) -> Self {
        Self::new(ValueNode::fixed(value))
    }

    /// Root interpolating between two fixed children
    pub fn from_to(from: T, to: T, interpolation: InterpolationSpec) -> Self {
        let mut tree = Self::fixed(from.clone());
        let a = tree.push(ValueNode::fixed(from));
        let b = tree.push(ValueNode::fixed(to));
        let root = tree.root_mut();
        root.mode = ResolutionMode::FromTo { from: a, to: b };
        root.interpolation = interpolation;
        tree
    }

    /// Root blending between weighted fixed children
    pub fn blend(
        default_value: T,
        children: impl IntoIterator<Item = (T, f32)>,
        interpolation: InterpolationSpec,
    ) -> Self {
        let mut tree = Self::fixed(default_value);
        let indices: Vec<NodeIndex> = children
            .into_iter()
            .map(|(value, weight)| tree.push(ValueNode::fixed(value).with_weight(weight)))
            .collect();
        let root = tree.root_mut();
        root.mode = ResolutionMode::Blend { children: indices };
        root.interpolation = interpolation;
        tree
    }

    /// Root reading a named parameter, with a fallback
    pub fn reference(default_value: T, reference: ParamReference) -> Self {
        Self::new(ValueNode::fixed(default_value).with_mode(ResolutionMode::EqualToReference(reference)))
    }
}

/// An authored dynamic parameter: a tree, the stable id of the expression
/// using it (the seed of its shared-random hash) and its reroll policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicParam<T> {
    pub tree: ParamTree<T>,
    #[serde(default)]
    pub operation_id: u32,
    #[serde(default)]
    pub reroll: RerollPolicy,
}

impl<T: DynamicValue> DynamicParam<T> {
    pub fn new(tree: ParamTree<T>, operation_id: u32) -> Self {
        Self {
            tree,
            operation_id,
            reroll: RerollPolicy::default(),
        }
    }

    pub fn fixed(value: T) -> Self {
        Self::new(ParamTree::fixed(value), 0)
    }

    pub fn with_reroll(mut self, reroll: RerollPolicy) -> Self {
        self.reroll = reroll;
        self
    }

    /// The root's fallback value
    pub fn default_value(&self) -> &T {
        &self.tree.root().default_value
    }
}

impl<T: DynamicValue> From<T> for DynamicParam<T> {
    fn from(value: T) -> Self {
        Self::fixed(value)
    }
}
