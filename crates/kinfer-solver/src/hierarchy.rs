//! Nominal class hierarchy queries.
//!
//! Supertypes are declared in terms of the class's own parameters
//! (`TypeData::Param`); walking up the hierarchy instantiates each declared
//! supertype with the arguments seen so far.

use crate::env::TypeEnvironment;
use crate::substitution::substitute_params;
use crate::types::{ClassId, TypeArg, TypeData, TypeId};
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet};

pub type ClassSet = IndexSet<ClassId, FxBuildHasher>;

/// Arguments of `target` as seen from `class<args>`, when `target` is
/// `class` itself or one of its transitive superclasses.
pub fn corresponding_supertype(
    env: &TypeEnvironment,
    class: ClassId,
    args: &[TypeArg],
    target: ClassId,
) -> Option<Vec<TypeArg>> {
    let mut visited = FxHashSet::default();
    find_supertype(env, class, args, target, &mut visited)
}

fn find_supertype(
    env: &TypeEnvironment,
    class: ClassId,
    args: &[TypeArg],
    target: ClassId,
    visited: &mut FxHashSet<ClassId>,
) -> Option<Vec<TypeArg>> {
    if class == target {
        return Some(args.to_vec());
    }
    if !visited.insert(class) {
        return None;
    }
    let info = env.classes.get(class)?;
    for &supertype in &info.supertypes {
        let instantiated = substitute_params(env, supertype, class, args);
        let Some((super_class, super_args)) = env.interner.as_class(instantiated) else {
            continue;
        };
        if let Some(found) = find_supertype(env, super_class, &super_args, target, visited) {
            return Some(found);
        }
    }
    None
}

/// `class` and all its transitive superclasses, nearest first.
pub fn supertype_classes(env: &TypeEnvironment, class: ClassId) -> ClassSet {
    let mut out = ClassSet::default();
    out.insert(class);
    let mut cursor = 0;
    while let Some(&current) = out.get_index(cursor) {
        cursor += 1;
        let Some(info) = env.classes.get(current) else {
            continue;
        };
        for &supertype in &info.supertypes {
            if let Some((super_class, _)) = env.interner.as_class(supertype) {
                out.insert(super_class);
            }
        }
    }
    out
}

pub fn is_subclass(env: &TypeEnvironment, sub: ClassId, sup: ClassId) -> bool {
    sub == sup || supertype_classes(env, sub).contains(&sup)
}

/// Classes a type is known to be a subtype of. `Any` is implicit and never listed.
pub fn supertype_classes_of_type(env: &TypeEnvironment, ty: TypeId) -> ClassSet {
    match env.interner.lookup(ty) {
        Some(TypeData::Class { class, .. }) => supertype_classes(env, class),
        Some(TypeData::IntegerLiteral(value)) => {
            let mut out = ClassSet::default();
            for candidate in env.integer_literal_candidates(value) {
                out.extend(supertype_classes_of_type(env, candidate));
            }
            out
        }
        Some(TypeData::Intersection(list)) => {
            let mut out = ClassSet::default();
            for &member in env.interner.type_list(list).iter() {
                out.extend(supertype_classes_of_type(env, member));
            }
            out
        }
        Some(TypeData::Captured(captured)) => supertype_classes_of_type(env, captured.upper()),
        _ => ClassSet::default(),
    }
}

/// The instance of `target` that `ty` is a subtype of, if any.
pub fn supertype_instance(env: &TypeEnvironment, ty: TypeId, target: ClassId) -> Option<Vec<TypeArg>> {
    match env.interner.lookup(ty)? {
        TypeData::Class { class, args } => {
            corresponding_supertype(env, class, &env.interner.type_args(args), target)
        }
        TypeData::IntegerLiteral(value) => env
            .integer_literal_candidates(value)
            .into_iter()
            .find_map(|candidate| supertype_instance(env, candidate, target)),
        TypeData::Intersection(list) => env
            .interner
            .type_list(list)
            .iter()
            .find_map(|&member| supertype_instance(env, member, target)),
        TypeData::Captured(captured) => supertype_instance(env, captured.upper(), target),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../tests/hierarchy_tests.rs"]
mod tests;
