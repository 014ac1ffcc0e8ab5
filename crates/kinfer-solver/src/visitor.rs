//! Structural walks over interned types.
//!
//! Free functions in the style of a query layer: each takes the environment
//! and a `TypeId` and answers one question about the type's structure. The
//! `TypeFlags` cached by the interner short-circuit most walks.

use crate::env::TypeEnvironment;
use crate::types::{TypeData, TypeFlags, TypeId, TypeVarId};
use smallvec::SmallVec;

/// Direct children of a type, in argument order.
pub fn children(env: &TypeEnvironment, ty: TypeId) -> SmallVec<[TypeId; 4]> {
    match env.interner.lookup(ty) {
        Some(TypeData::Class { args, .. }) => {
            env.interner.type_args(args).iter().map(|arg| arg.ty).collect()
        }
        Some(TypeData::Captured(captured)) => SmallVec::from_slice(&[captured.ty]),
        Some(TypeData::Intersection(list)) => env.interner.type_list(list).iter().copied().collect(),
        _ => SmallVec::new(),
    }
}

/// Whether `ty` or any type nested inside it satisfies `predicate`.
pub fn contains_type_matching(
    env: &TypeEnvironment,
    ty: TypeId,
    predicate: &dyn Fn(TypeId) -> bool,
) -> bool {
    if predicate(ty) {
        return true;
    }
    children(env, ty)
        .into_iter()
        .any(|child| contains_type_matching(env, child, predicate))
}

/// Type variables occurring in `ty`, in first-occurrence order, without duplicates.
pub fn collect_type_variables(env: &TypeEnvironment, ty: TypeId) -> SmallVec<[TypeVarId; 4]> {
    let mut out = SmallVec::new();
    if env.interner.flags(ty).contains(TypeFlags::CONTAINS_VARIABLE) {
        collect_into(env, ty, &mut out, |data| match data {
            TypeData::Variable(var) => Some(var),
            _ => None,
        });
    }
    out
}

/// Variables whose stub types occur in `ty`.
pub fn collect_stub_variables(env: &TypeEnvironment, ty: TypeId) -> SmallVec<[TypeVarId; 4]> {
    let mut out = SmallVec::new();
    if env.interner.flags(ty).contains(TypeFlags::CONTAINS_STUB) {
        collect_into(env, ty, &mut out, |data| match data {
            TypeData::Stub(var) => Some(var),
            _ => None,
        });
    }
    out
}

fn collect_into(
    env: &TypeEnvironment,
    ty: TypeId,
    out: &mut SmallVec<[TypeVarId; 4]>,
    pick: fn(TypeData) -> Option<TypeVarId>,
) {
    if let Some(data) = env.interner.lookup(ty) {
        if let Some(var) = pick(data) {
            if !out.contains(&var) {
                out.push(var);
            }
            return;
        }
    }
    for child in children(env, ty) {
        collect_into(env, child, out, pick);
    }
}

pub fn contains_stub_type(env: &TypeEnvironment, ty: TypeId) -> bool {
    env.interner.flags(ty).contains(TypeFlags::CONTAINS_STUB)
}

pub fn contains_type_variable(env: &TypeEnvironment, ty: TypeId, var: TypeVarId) -> bool {
    env.interner.flags(ty).contains(TypeFlags::CONTAINS_VARIABLE)
        && collect_type_variables(env, ty).contains(&var)
}

/// Whether a recorded type still mentions inference placeholders and must
/// be rewritten once inference completes.
pub fn should_be_updated(env: &TypeEnvironment, ty: TypeId) -> bool {
    env.interner
        .flags(ty)
        .intersects(TypeFlags::CONTAINS_STUB | TypeFlags::CONTAINS_VARIABLE)
}

#[cfg(test)]
#[path = "../tests/visitor_tests.rs"]
mod tests;
