//! Approximation of captured types by denotable ones.
//!
//! A type mentioning `Captured(out X)` or `Captured(in X)` has no source
//! spelling. Incorporation substitutes captured types into generic bounds and
//! then needs the nearest denotable supertype (the upper approximation) and
//! subtype (the lower approximation) of the result:
//!
//! - `Captured(out X)` lies between `Nothing` and `X`
//! - `Captured(in X)` lies between `X` and `Any`
//! - `Inv<Captured(out X)>` is approximated by `Inv<out X>` from above and
//!   has only `Nothing` below it

use crate::env::TypeEnvironment;
use crate::types::{CapturedType, ProjectionKind, TypeArg, TypeData, TypeFlags, TypeId, Variance};
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Approximation {
    pub upper: TypeId,
    pub lower: TypeId,
}

impl Approximation {
    fn exact(ty: TypeId) -> Self {
        Approximation { upper: ty, lower: ty }
    }
}

pub fn approximate_captured_types(env: &TypeEnvironment, ty: TypeId) -> Approximation {
    if !env.interner.flags(ty).contains(TypeFlags::CONTAINS_CAPTURED) {
        return Approximation::exact(ty);
    }
    match env.interner.lookup(ty) {
        Some(TypeData::Captured(captured)) => Approximation {
            upper: approximate_captured_types(env, captured.upper()).upper,
            lower: approximate_captured_types(env, captured.lower()).lower,
        },
        Some(TypeData::Class { class, args }) => {
            let Some(info) = env.classes.get(class) else {
                return Approximation::exact(ty);
            };
            let args = env.interner.type_args(args);
            let mut upper_args = Vec::with_capacity(args.len());
            let mut lower_args = Vec::with_capacity(args.len());
            let mut has_lower = true;
            for (index, &arg) in args.iter().enumerate() {
                let declared = info
                    .type_params
                    .get(index)
                    .map(|param| param.variance)
                    .unwrap_or(Variance::Invariant);
                let (upper, lower) = approximate_argument(env, declared, arg);
                upper_args.push(upper);
                match lower {
                    Some(lower) => lower_args.push(lower),
                    None => has_lower = false,
                }
            }
            Approximation {
                upper: env.interner.class_type(class, upper_args),
                lower: if has_lower {
                    env.interner.class_type(class, lower_args)
                } else {
                    TypeId::NOTHING
                },
            }
        }
        Some(TypeData::Intersection(list)) => {
            let members = env.interner.type_list(list);
            let approximations: SmallVec<[Approximation; 4]> = members
                .iter()
                .map(|&member| approximate_captured_types(env, member))
                .collect();
            Approximation {
                upper: env
                    .interner
                    .intersection(approximations.iter().map(|a| a.upper).collect()),
                lower: env
                    .interner
                    .intersection(approximations.iter().map(|a| a.lower).collect()),
            }
        }
        _ => Approximation::exact(ty),
    }
}

/// Upper and lower replacement for one argument. `None` as the lower
/// replacement means no class instance lies below the original.
fn approximate_argument(env: &TypeEnvironment, declared: Variance, arg: TypeArg) -> (TypeArg, Option<TypeArg>) {
    if arg.is_star() || !env.interner.flags(arg.ty).contains(TypeFlags::CONTAINS_CAPTURED) {
        return (arg, Some(arg));
    }
    let position = match arg.projection {
        ProjectionKind::Out => Variance::Out,
        ProjectionKind::In => Variance::In,
        ProjectionKind::Invariant | ProjectionKind::Star => declared,
    };
    let inner = approximate_captured_types(env, arg.ty);
    match position {
        Variance::Out => (
            TypeArg { projection: arg.projection, ty: inner.upper },
            Some(TypeArg { projection: arg.projection, ty: inner.lower }),
        ),
        Variance::In => (
            TypeArg { projection: arg.projection, ty: inner.lower },
            Some(TypeArg { projection: arg.projection, ty: inner.upper }),
        ),
        Variance::Invariant => {
            let upper = match env.interner.as_captured(arg.ty) {
                Some(CapturedType { projection: ProjectionKind::In, .. }) => TypeArg::contravariant(inner.lower),
                Some(CapturedType { projection: ProjectionKind::Star, .. }) => TypeArg::STAR,
                _ => TypeArg::out(inner.upper),
            };
            (upper, None)
        }
    }
}

#[cfg(test)]
#[path = "../tests/approximation_tests.rs"]
mod tests;
