//! Subtype checking, optionally in constraint mode.
//!
//! The checker answers `sub <: sup` over the nominal class table. When a
//! [`ConstraintSink`] reports one side as its own type variable, the checker
//! records a bound on that variable instead of failing:
//!
//! - `T <: X` records `X` as an UPPER bound of `T`
//! - `X <: T` records `X` as a LOWER bound of `T`
//!
//! Invariant argument positions use equality: when either argument is the
//! sink's own variable, the other argument becomes a single EXACT bound.
//! Any other pair of invariant arguments is checked in both directions.
//!
//! Recursive structure is guarded by a [`RecursionGuard`]: a pair that is
//! already being checked is assumed to hold (coinductive), and exceeding the
//! limits answers `false`.

use crate::bounds::BoundKind;
use crate::env::TypeEnvironment;
use crate::hierarchy::supertype_instance;
use crate::recursion::{RecursionGuard, RecursionResult};
use crate::types::{ClassId, ProjectionKind, TypeArg, TypeData, TypeId, TypeVarId, Variance};
use tracing::trace;

/// Receiver of bounds produced while checking in constraint mode.
pub trait ConstraintSink {
    /// Whether `var` is a not-fixed variable of the system being built.
    fn is_my_type_variable(&self, var: TypeVarId) -> bool;

    fn add_bound(&mut self, var: TypeVarId, ty: TypeId, kind: BoundKind);
}

/// Plain subtyping: no variable is ever "mine".
pub struct NoConstraints;

impl ConstraintSink for NoConstraints {
    fn is_my_type_variable(&self, _var: TypeVarId) -> bool {
        false
    }

    fn add_bound(&mut self, _var: TypeVarId, _ty: TypeId, _kind: BoundKind) {}
}

pub struct SubtypeChecker<'a> {
    env: &'a TypeEnvironment,
    guard: RecursionGuard<(TypeId, TypeId)>,
}

impl<'a> SubtypeChecker<'a> {
    pub fn new(env: &'a TypeEnvironment) -> Self {
        SubtypeChecker {
            env,
            guard: RecursionGuard::for_subtyping(),
        }
    }

    pub fn is_subtype(&mut self, sub: TypeId, sup: TypeId, sink: &mut dyn ConstraintSink) -> bool {
        stacker::maybe_grow(32 * 1024, 2 * 1024 * 1024, || self.check(sub, sup, sink))
    }

    /// Mutual subtyping.
    pub fn equal_types(&mut self, a: TypeId, b: TypeId, sink: &mut dyn ConstraintSink) -> bool {
        if a == b {
            return true;
        }
        self.is_subtype(a, b, sink) && self.is_subtype(b, a, sink)
    }

    fn my_variable(&self, ty: TypeId, sink: &dyn ConstraintSink) -> Option<TypeVarId> {
        self.env
            .interner
            .as_variable(ty)
            .filter(|&var| sink.is_my_type_variable(var))
    }

    fn check(&mut self, sub: TypeId, sup: TypeId, sink: &mut dyn ConstraintSink) -> bool {
        if sub == sup || sub.is_error() || sup.is_error() {
            return true;
        }

        let sub_var = self.my_variable(sub, sink);
        let sup_var = self.my_variable(sup, sink);
        if sub_var.is_some() || sup_var.is_some() {
            if let Some(var) = sup_var {
                trace!(var = var.0, ty = sub.0, "lower bound from subtyping");
                sink.add_bound(var, sub, BoundKind::Lower);
            }
            if let Some(var) = sub_var {
                trace!(var = var.0, ty = sup.0, "upper bound from subtyping");
                sink.add_bound(var, sup, BoundKind::Upper);
            }
            return true;
        }

        let (Some(sub_data), Some(sup_data)) =
            (self.env.interner.lookup(sub), self.env.interner.lookup(sup))
        else {
            return false;
        };

        // Captured(out T) <: X constrains T directly.
        if let TypeData::Captured(captured) = sub_data {
            if captured.projection == ProjectionKind::Out {
                if let Some(var) = self.my_variable(captured.ty, sink) {
                    sink.add_bound(var, sup, BoundKind::Upper);
                    return true;
                }
            }
        }

        if matches!(sub_data, TypeData::Stub(_)) || matches!(sup_data, TypeData::Stub(_)) {
            return true;
        }
        if sup == TypeId::ANY || sub == TypeId::NOTHING {
            return true;
        }

        match self.guard.enter((sub, sup)) {
            RecursionResult::Entered => {
                let result = self.check_structural(sub, sub_data, sup, sup_data, sink);
                self.guard.leave((sub, sup));
                result
            }
            RecursionResult::Cycle => true,
            RecursionResult::DepthExceeded | RecursionResult::IterationExceeded => false,
        }
    }

    fn check_structural(
        &mut self,
        sub: TypeId,
        sub_data: TypeData,
        sup: TypeId,
        sup_data: TypeData,
        sink: &mut dyn ConstraintSink,
    ) -> bool {
        if let TypeData::Intersection(list) = sup_data {
            let members = self.env.interner.type_list(list);
            return members.iter().all(|&member| self.check(sub, member, sink));
        }
        if let TypeData::Captured(captured) = sup_data {
            return match captured.projection {
                ProjectionKind::In | ProjectionKind::Invariant => self.check(sub, captured.ty, sink),
                ProjectionKind::Out | ProjectionKind::Star => false,
            };
        }

        match sub_data {
            TypeData::Captured(captured) => self.check(captured.upper(), sup, sink),
            TypeData::Intersection(list) => {
                let members = self.env.interner.type_list(list);
                members.iter().any(|&member| self.check(member, sup, sink))
            }
            TypeData::IntegerLiteral(value) => match sup_data {
                TypeData::IntegerLiteral(_) => false,
                _ => self
                    .env
                    .integer_literal_candidates(value)
                    .into_iter()
                    .any(|candidate| self.check(candidate, sup, sink)),
            },
            TypeData::Class { .. } => match sup_data {
                TypeData::Class { class, args } => {
                    let Some(sub_args) = supertype_instance(self.env, sub, class) else {
                        return false;
                    };
                    let sup_args = self.env.interner.type_args(args);
                    self.check_arguments(class, &sub_args, &sup_args, sink)
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn check_arguments(
        &mut self,
        class: ClassId,
        sub_args: &[TypeArg],
        sup_args: &[TypeArg],
        sink: &mut dyn ConstraintSink,
    ) -> bool {
        let Some(info) = self.env.classes.get(class) else {
            return false;
        };
        for (index, (&sub_arg, &sup_arg)) in sub_args.iter().zip(sup_args).enumerate() {
            if sup_arg.is_star() {
                continue;
            }
            let declared = info
                .type_params
                .get(index)
                .map(|param| param.variance)
                .unwrap_or(Variance::Invariant);
            let sub_ty = self.argument_as_type(sub_arg);
            let ok = match effective_variance(declared, sup_arg.projection) {
                Variance::Out => self.check(sub_ty, sup_arg.ty, sink),
                Variance::In => {
                    // A captured `out` argument has no usable lower bound.
                    let lower = match self.env.interner.as_captured(sub_ty) {
                        Some(captured) => captured.lower(),
                        None => sub_ty,
                    };
                    self.check(sup_arg.ty, lower, sink)
                }
                Variance::Invariant => self.check_equal(sub_ty, sup_arg.ty, sink),
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn check_equal(&mut self, a: TypeId, b: TypeId, sink: &mut dyn ConstraintSink) -> bool {
        if a == b || a.is_error() || b.is_error() {
            return true;
        }
        if let Some(var) = self.my_variable(a, sink) {
            trace!(var = var.0, ty = b.0, "exact bound from invariant argument");
            sink.add_bound(var, b, BoundKind::Exact);
            return true;
        }
        if let Some(var) = self.my_variable(b, sink) {
            trace!(var = var.0, ty = a.0, "exact bound from invariant argument");
            sink.add_bound(var, a, BoundKind::Exact);
            return true;
        }
        self.check(a, b, sink) && self.check(b, a, sink)
    }

    /// A projected argument of the subtype stands for a captured existential.
    fn argument_as_type(&self, arg: TypeArg) -> TypeId {
        match arg.projection {
            ProjectionKind::Invariant => arg.ty,
            projection => self.env.interner.captured(projection, arg.ty),
        }
    }
}

fn effective_variance(declared: Variance, projection: ProjectionKind) -> Variance {
    match projection {
        ProjectionKind::Out => Variance::Out,
        ProjectionKind::In => Variance::In,
        ProjectionKind::Invariant | ProjectionKind::Star => declared,
    }
}

/// `sub <: sup` without recording constraints.
pub fn is_subtype_of(env: &TypeEnvironment, sub: TypeId, sup: TypeId) -> bool {
    SubtypeChecker::new(env).is_subtype(sub, sup, &mut NoConstraints)
}

pub fn are_equal_types(env: &TypeEnvironment, a: TypeId, b: TypeId) -> bool {
    SubtypeChecker::new(env).equal_types(a, b, &mut NoConstraints)
}

#[cfg(test)]
#[path = "../tests/subtype_tests.rs"]
mod tests;
