//! Type substitution.
//!
//! A `Substitutor` maps *type slots* (a type variable or its stub type) to
//! replacement types. Substitutors compose: `Composed(left, right)` applies
//! `right` first and then `left` to the result, so
//! `compose(final, stubs_to_variables)` turns stub types into variables and
//! then variables into their final types.
//!
//! This module also hosts the structural mapper used for instantiating a
//! class's declared supertypes with concrete arguments.

use crate::env::TypeEnvironment;
use crate::types::{ClassId, ProjectionKind, TypeArg, TypeData, TypeFlags, TypeId, TypeVarId};
use indexmap::IndexMap;

/// The thing a substitutor replaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeSlot {
    Variable(TypeVarId),
    Stub(TypeVarId),
}

impl TypeSlot {
    pub fn var(self) -> TypeVarId {
        match self {
            TypeSlot::Variable(var) | TypeSlot::Stub(var) => var,
        }
    }

    /// The type this slot stands for.
    pub fn as_type(self, env: &TypeEnvironment) -> TypeId {
        match self {
            TypeSlot::Variable(var) => env.variable_type(var),
            TypeSlot::Stub(var) => env.stub_type(var),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Substitutor {
    #[default]
    Empty,
    ByConstructorMap(IndexMap<TypeSlot, TypeId>),
    /// `left ∘ right`: apply `right`, then `left`.
    Composed(Box<Substitutor>, Box<Substitutor>),
}

impl Substitutor {
    pub fn by_map(map: IndexMap<TypeSlot, TypeId>) -> Self {
        if map.is_empty() {
            Substitutor::Empty
        } else {
            Substitutor::ByConstructorMap(map)
        }
    }

    /// `left ∘ right`; empty operands are dropped.
    pub fn compose(left: Substitutor, right: Substitutor) -> Self {
        match (left.is_empty(), right.is_empty()) {
            (true, _) => right,
            (_, true) => left,
            _ => Substitutor::Composed(Box::new(left), Box::new(right)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Substitutor::Empty => true,
            Substitutor::ByConstructorMap(map) => map.is_empty(),
            Substitutor::Composed(left, right) => left.is_empty() && right.is_empty(),
        }
    }

    /// Apply the substitutor. Types without variables or stubs come back unchanged.
    pub fn substitute(&self, env: &TypeEnvironment, ty: TypeId) -> TypeId {
        match self {
            Substitutor::Empty => ty,
            Substitutor::ByConstructorMap(map) => {
                if !env
                    .interner
                    .flags(ty)
                    .intersects(TypeFlags::CONTAINS_VARIABLE | TypeFlags::CONTAINS_STUB)
                {
                    return ty;
                }
                map_type(env, ty, &|data| {
                    let slot = match data {
                        TypeData::Variable(var) => TypeSlot::Variable(var),
                        TypeData::Stub(var) => TypeSlot::Stub(var),
                        _ => return None,
                    };
                    map.get(&slot).map(|&ty| TypeArg::invariant(ty))
                })
            }
            Substitutor::Composed(left, right) => {
                let inner = right.substitute(env, ty);
                left.substitute(env, inner)
            }
        }
    }

    /// Replacement for a single slot, if this substitutor maps it.
    pub fn slot_value(&self, env: &TypeEnvironment, slot: TypeSlot) -> Option<TypeId> {
        let ty = slot.as_type(env);
        let substituted = self.substitute(env, ty);
        (substituted != ty).then_some(substituted)
    }
}

/// Replace `Param { class, i }` occurrences with `args[i]`, carrying the
/// argument's projection into the position it lands in.
pub fn substitute_params(env: &TypeEnvironment, ty: TypeId, class: ClassId, args: &[TypeArg]) -> TypeId {
    if !env.interner.flags(ty).contains(TypeFlags::CONTAINS_PARAM) {
        return ty;
    }
    map_type(env, ty, &|data| match data {
        TypeData::Param { class: owner, index } if owner == class => {
            Some(args.get(index as usize).copied().unwrap_or(TypeArg::STAR))
        }
        _ => None,
    })
}

/// Structural rewrite: `replace` may swap any sub-term for a projected type.
///
/// In argument position the replacement's projection merges with the
/// argument's own projection; elsewhere a non-invariant replacement becomes a
/// captured type.
pub fn map_type(env: &TypeEnvironment, ty: TypeId, replace: &dyn Fn(TypeData) -> Option<TypeArg>) -> TypeId {
    match map_in_position(env, ty, replace) {
        Some(arg) => as_standalone(env, arg),
        None => ty,
    }
}

/// Returns `None` when nothing below `ty` changed.
fn map_in_position(
    env: &TypeEnvironment,
    ty: TypeId,
    replace: &dyn Fn(TypeData) -> Option<TypeArg>,
) -> Option<TypeArg> {
    let data = env.interner.lookup(ty)?;
    if let Some(arg) = replace(data) {
        return Some(arg);
    }
    match data {
        TypeData::Class { class, args } => {
            let old_args = env.interner.type_args(args);
            let mut changed = false;
            let new_args: Vec<TypeArg> = old_args
                .iter()
                .map(|&arg| {
                    if arg.is_star() {
                        return arg;
                    }
                    match map_in_position(env, arg.ty, replace) {
                        Some(inner) => {
                            changed = true;
                            merge_projection(arg.projection, inner)
                        }
                        None => arg,
                    }
                })
                .collect();
            changed.then(|| TypeArg::invariant(env.interner.class_type(class, new_args)))
        }
        TypeData::Captured(captured) => {
            let inner = map_in_position(env, captured.ty, replace)?;
            let merged = merge_projection(captured.projection, inner);
            Some(TypeArg::invariant(if merged.is_star() {
                env.interner.captured(ProjectionKind::Star, TypeId::ANY)
            } else if merged.projection == ProjectionKind::Invariant {
                merged.ty
            } else {
                env.interner.captured(merged.projection, merged.ty)
            }))
        }
        TypeData::Intersection(list) => {
            let members = env.interner.type_list(list);
            let mut changed = false;
            let new_members: Vec<TypeId> = members
                .iter()
                .map(|&member| match map_in_position(env, member, replace) {
                    Some(inner) => {
                        changed = true;
                        as_standalone(env, inner)
                    }
                    None => member,
                })
                .collect();
            changed.then(|| TypeArg::invariant(env.interner.intersection(new_members)))
        }
        _ => None,
    }
}

fn merge_projection(outer: ProjectionKind, inner: TypeArg) -> TypeArg {
    let projection = match (outer, inner.projection) {
        (ProjectionKind::Star, _) | (_, ProjectionKind::Star) => return TypeArg::STAR,
        (ProjectionKind::Invariant, p) | (p, ProjectionKind::Invariant) => p,
        (a, b) if a == b => a,
        _ => return TypeArg::STAR,
    };
    TypeArg {
        projection,
        ty: inner.ty,
    }
}

fn as_standalone(env: &TypeEnvironment, arg: TypeArg) -> TypeId {
    match arg.projection {
        ProjectionKind::Invariant => arg.ty,
        ProjectionKind::Star => env.interner.captured(ProjectionKind::Star, TypeId::ANY),
        projection => env.interner.captured(projection, arg.ty),
    }
}

#[cfg(test)]
#[path = "../tests/substitution_tests.rs"]
mod tests;
