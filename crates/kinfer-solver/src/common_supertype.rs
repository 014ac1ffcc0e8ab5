//! Common supertype (least upper bound) and intersection of types.
//!
//! `common_supertype` follows the usual nominal recipe:
//!
//! 1. Error anywhere gives Error; `Nothing` is dropped.
//! 2. Types that are subtypes of another input are dropped.
//! 3. Otherwise every class that all inputs share as a supertype is
//!    collected, the less precise ones are removed, and each survivor is
//!    instantiated with merged arguments. Several survivors intersect.
//!
//! Argument merging per declared variance:
//! - `CS(Out<X>, Out<Y>) = Out<CS(X, Y)>`
//! - `CS(In<X>, In<Y>) = In<X & Y>`
//! - `CS(Inv<X>, Inv<Y>) = Inv<out CS(X, Y)>`, or `Inv<X>` when all equal
//!
//! Nesting deeper than the inputs themselves collapses to a star projection.

use crate::env::{ClassKind, TypeEnvironment};
use crate::hierarchy::{
    ClassSet, is_subclass, supertype_classes, supertype_classes_of_type, supertype_instance,
};
use crate::subtype::{NoConstraints, SubtypeChecker, are_equal_types, is_subtype_of};
use crate::types::{ClassId, ProjectionKind, TypeArg, TypeData, TypeId, Variance};
use kinfer_common::limits::MAX_COMMON_SUPERTYPE_DEPTH;
use smallvec::SmallVec;
use tracing::trace;

/// Least upper bound of `types`. An empty list gives `Nothing`.
pub fn common_supertype(env: &TypeEnvironment, types: &[TypeId]) -> TypeId {
    let max_depth = types
        .iter()
        .map(|&ty| env.interner.depth(ty))
        .max()
        .unwrap_or(0)
        .min(MAX_COMMON_SUPERTYPE_DEPTH);
    let result = stacker::maybe_grow(32 * 1024, 2 * 1024 * 1024, || {
        common_supertype_at(env, types, -(max_depth as i32))
    });
    trace!(inputs = types.len(), result = result.0, "common supertype");
    result
}

fn common_supertype_at(env: &TypeEnvironment, types: &[TypeId], depth: i32) -> TypeId {
    if types.iter().any(|ty| ty.is_error()) {
        return TypeId::ERROR;
    }
    let mut unique: SmallVec<[TypeId; 4]> = SmallVec::new();
    for &ty in types {
        if ty != TypeId::NOTHING && !unique.contains(&ty) {
            unique.push(ty);
        }
    }
    match unique.len() {
        0 => return TypeId::NOTHING,
        1 => return unique[0],
        _ => {}
    }
    if unique.contains(&TypeId::ANY) {
        return TypeId::ANY;
    }

    // Stub types are compatible with everything; the first non-stub wins.
    let non_stub: SmallVec<[TypeId; 4]> = unique
        .iter()
        .copied()
        .filter(|&ty| env.interner.as_stub(ty).is_none())
        .collect();
    if non_stub.is_empty() {
        return unique[0];
    }

    let explicit = filter_supertypes(env, &non_stub);
    if explicit.len() == 1 {
        return explicit[0];
    }

    if explicit
        .iter()
        .all(|&ty| matches!(env.interner.lookup(ty), Some(TypeData::IntegerLiteral(_))))
    {
        return numeric_common_supertype(env, &explicit);
    }

    let constructors = common_super_classes(env, &explicit);
    if constructors.is_empty() {
        return TypeId::ANY;
    }
    let instances: Vec<TypeId> = constructors
        .iter()
        .map(|&class| supertype_with_class(env, &explicit, class, depth))
        .collect();
    intersect_types(env, &instances).unwrap_or(TypeId::ANY)
}

/// Drop every type that is a subtype of another one in the list.
fn filter_supertypes(env: &TypeEnvironment, types: &[TypeId]) -> SmallVec<[TypeId; 4]> {
    let mut result: SmallVec<[TypeId; 4]> = types.iter().copied().collect();
    let mut index = 0;
    while index < result.len() {
        let candidate = result[index];
        let dominated = result
            .iter()
            .any(|&other| other != candidate && is_subtype_of(env, candidate, other));
        if dominated {
            result.remove(index);
        } else {
            index += 1;
        }
    }
    result
}

/// Classes that every type has as a supertype, without the ones implied by others.
fn common_super_classes(env: &TypeEnvironment, types: &[TypeId]) -> Vec<ClassId> {
    let mut common: ClassSet = supertype_classes_of_type(env, types[0]);
    for &ty in &types[1..] {
        let classes = supertype_classes_of_type(env, ty);
        common.retain(|class| classes.contains(class));
    }
    common
        .iter()
        .copied()
        .filter(|&target| {
            !common
                .iter()
                .any(|&other| other != target && supertype_classes(env, other).contains(&target))
        })
        .collect()
}

fn supertype_with_class(env: &TypeEnvironment, types: &[TypeId], class: ClassId, depth: i32) -> TypeId {
    let Some(info) = env.classes.get(class) else {
        return TypeId::ANY;
    };
    if info.type_params.is_empty() {
        return env.interner.class_type(class, Vec::new());
    }
    let instances: Vec<Vec<TypeArg>> = types
        .iter()
        .filter_map(|&ty| supertype_instance(env, ty, class))
        .collect();

    let mut arguments = Vec::with_capacity(info.type_params.len());
    for (index, param) in info.type_params.iter().enumerate() {
        let mut there_is_star = false;
        let mut projections: SmallVec<[TypeArg; 4]> = SmallVec::new();
        for instance in &instances {
            match instance.get(index) {
                Some(arg) if arg.is_star() => there_is_star = true,
                Some(&arg) => projections.push(arg),
                None => {}
            }
        }
        let argument = if there_is_star || projections.is_empty() || is_recursive(types, &projections, param.variance) {
            TypeArg::STAR
        } else {
            calculate_argument(env, param.variance, &projections, depth)
        };
        arguments.push(argument);
    }
    env.interner.class_type(class, arguments)
}

/// `CS(A, B)` where `A <: Inv<A>` and `B <: Inv<B>` would recurse forever.
fn is_recursive(types: &[TypeId], arguments: &[TypeArg], variance: Variance) -> bool {
    if variance == Variance::In {
        return false;
    }
    let mut argument_types: SmallVec<[TypeId; 4]> = SmallVec::new();
    for arg in arguments {
        if !argument_types.contains(&arg.ty) {
            argument_types.push(arg.ty);
        }
    }
    let mut originals: SmallVec<[TypeId; 4]> = SmallVec::new();
    for &ty in types {
        if !originals.contains(&ty) {
            originals.push(ty);
        }
    }
    argument_types.len() == originals.len() && argument_types.iter().all(|ty| originals.contains(ty))
}

fn calculate_argument(env: &TypeEnvironment, variance: Variance, arguments: &[TypeArg], depth: i32) -> TypeArg {
    if depth > 0 {
        return TypeArg::STAR;
    }

    if variance == Variance::Invariant
        && arguments.iter().all(|arg| arg.projection == ProjectionKind::Invariant)
    {
        let first = arguments[0];
        if arguments.iter().all(|arg| arg.ty == first.ty) {
            return first;
        }
    }

    let as_out = if variance != Variance::Invariant {
        variance == Variance::Out
    } else {
        let there_is_out = arguments.iter().any(|arg| arg.projection == ProjectionKind::Out);
        let there_is_in = arguments.iter().any(|arg| arg.projection == ProjectionKind::In);
        if there_is_out && there_is_in {
            return TypeArg::STAR;
        }
        there_is_out || !there_is_in
    };

    let argument_types: SmallVec<[TypeId; 4]> = arguments.iter().map(|arg| arg.ty).collect();
    if as_out {
        if variance != Variance::Invariant {
            return TypeArg::invariant(common_supertype_at(env, &argument_types, depth + 1));
        }
        let equal_to_each_other = argument_types
            .iter()
            .copied()
            .find(|&candidate| argument_types.iter().all(|&ty| are_equal_types(env, ty, candidate)));
        match equal_to_each_other {
            None => TypeArg::out(common_supertype_at(env, &argument_types, depth + 1)),
            Some(ty) => {
                let there_is_not_inv = arguments
                    .iter()
                    .any(|arg| arg.projection != ProjectionKind::Invariant);
                if there_is_not_inv {
                    TypeArg::out(ty)
                } else {
                    TypeArg::invariant(ty)
                }
            }
        }
    } else {
        let Some(intersection) = intersect_types(env, &argument_types) else {
            return TypeArg::STAR;
        };
        if variance != Variance::Invariant {
            TypeArg::invariant(intersection)
        } else {
            TypeArg::contravariant(intersection)
        }
    }
}

/// Default type for a group of integer literal types: the first of
/// Int, Long, Byte, Short that every literal fits, otherwise the common
/// supertype of each literal's own default.
pub fn numeric_common_supertype(env: &TypeEnvironment, literals: &[TypeId]) -> TypeId {
    let mut possible: Option<SmallVec<[TypeId; 4]>> = None;
    let mut defaults: SmallVec<[TypeId; 4]> = SmallVec::new();
    for &literal in literals {
        let candidates = match env.interner.lookup(literal) {
            Some(TypeData::IntegerLiteral(value)) => env.integer_literal_candidates(value),
            _ => SmallVec::from_slice(&[literal]),
        };
        if let Some(&first) = candidates.first() {
            defaults.push(first);
        }
        possible = Some(match possible {
            None => candidates,
            Some(previous) => previous
                .into_iter()
                .filter(|ty| candidates.contains(ty))
                .collect(),
        });
    }
    let b = &env.builtins;
    if let Some(possible) = possible {
        for preferred in [b.int_type, b.long_type, b.byte_type, b.short_type] {
            if possible.contains(&preferred) {
                return preferred;
            }
        }
    }
    common_supertype(env, &defaults)
}

/// Greatest lower bound of upper bounds.
///
/// Types implied by a more specific member are dropped. Returns `None` when
/// the members cannot have a common subtype: two unrelated non-interface
/// classes.
pub fn intersect_types(env: &TypeEnvironment, types: &[TypeId]) -> Option<TypeId> {
    if types.iter().any(|ty| ty.is_error()) {
        return Some(TypeId::ERROR);
    }
    let mut unique: SmallVec<[TypeId; 4]> = SmallVec::new();
    for &ty in types {
        if !unique.contains(&ty) {
            unique.push(ty);
        }
    }
    if unique.is_empty() {
        return None;
    }

    let mut checker = SubtypeChecker::new(env);
    let mut index = 0;
    while index < unique.len() {
        let candidate = unique[index];
        let implied = unique.iter().enumerate().any(|(other_index, &other)| {
            other_index != index
                && checker.is_subtype(other, candidate, &mut NoConstraints)
                && (!checker.is_subtype(candidate, other, &mut NoConstraints) || other_index < index)
        });
        if implied {
            unique.remove(index);
        } else {
            index += 1;
        }
    }
    if unique.len() == 1 {
        return Some(unique[0]);
    }

    let classes: SmallVec<[ClassId; 4]> = unique
        .iter()
        .filter_map(|&ty| env.interner.as_class(ty).map(|(class, _)| class))
        .filter(|&class| {
            env.classes
                .get(class)
                .is_some_and(|info| info.kind != ClassKind::Interface)
        })
        .collect();
    for (i, &a) in classes.iter().enumerate() {
        for &b in &classes[i + 1..] {
            if !is_subclass(env, a, b) && !is_subclass(env, b, a) {
                return None;
            }
        }
    }
    Some(env.interner.intersection(unique.into_vec()))
}

#[cfg(test)]
#[path = "../tests/common_supertype_tests.rs"]
mod tests;
