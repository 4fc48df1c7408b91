//! Dynamic parameters
//!
//! Authored values are trees of nodes that resolve to a concrete value each
//! time they are needed: fixed, interpolated, blended, sampled from a
//! gradient or read from another named parameter.

pub mod interpolation;
pub mod node;
pub mod resolve;
pub mod source;
pub mod value;

pub use interpolation::{
    BulletFacet, HierarchyFacet, HierarchyQuery, InterpolationFactor, InterpolationSpec,
    PatternFacet, RandomFactor, ShotFacet,
};
pub use node::{
    DynamicParam, NodeIndex, OwnerKind, ParamReference, ParamTree, ReferenceOwner,
    ResolutionMode, TreeError, TreeIssue, ValueNode,
};
pub use resolve::{LivePattern, Recovery, Resolution, ResolveContext, resolve, resolve_detailed};
pub use source::{ParameterSource, ParameterTable};
pub use value::{Color, DynamicValue, ObjectRef, Payload};
