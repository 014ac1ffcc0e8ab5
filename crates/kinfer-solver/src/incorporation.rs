//! Constraint injection and incorporation.
//!
//! New evidence enters a system as a subtype check in constraint mode. Every
//! bound the check produces goes through a worklist; each bound that is
//! actually appended is incorporated:
//!
//! 1. It is paired with every earlier bound of the same variable. A
//!    lower-ish and an upper-ish bound give `lower <: upper`.
//! 2. Bounds of other variables that mention this variable get a derived
//!    bound with this bound's type substituted in.
//! 3. A bare-variable constraining type registers the reversed bound on that
//!    variable, and nothing else is generated.
//! 4. For variables nested in this bound's type, their bounds are substituted
//!    into this one.
//!
//! Substitution in (2) and (4) replaces the variable by its EXACT type, or by
//! `Captured(out X)` / `Captured(in X)` for UPPER / LOWER bounds, and then
//! approximates the captured result to a denotable type.
//!
//! Termination comes from three guards: a derived bound never substitutes
//! through a variable it was already derived from, types deeper than the
//! initial constraints allow are dropped, and a hard step limit.

use crate::approximation::approximate_captured_types;
use crate::bounds::{Bound, BoundKind, ConstraintPosition, DerivedFrom};
use crate::env::TypeEnvironment;
use crate::errors::ConstraintSystemError;
use crate::subtype::{ConstraintSink, SubtypeChecker};
use crate::substitution::{Substitutor, TypeSlot};
use crate::system::{ConstraintStorage, ProperTypeCache};
use crate::types::{ProjectionKind, TypeFlags, TypeId, TypeVarId};
use crate::visitor::{collect_type_variables, contains_type_matching, contains_type_variable};
use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A bound waiting to be appended.
#[derive(Clone, Debug)]
struct PendingBound {
    var: TypeVarId,
    ty: TypeId,
    kind: BoundKind,
    position: ConstraintPosition,
    derived_from: DerivedFrom,
}

/// Collects the bounds a constraint-mode subtype check produces.
struct BoundCollector<'s> {
    storage: &'s ConstraintStorage,
    queue: &'s mut VecDeque<PendingBound>,
    position: &'s ConstraintPosition,
    derived_from: &'s DerivedFrom,
}

impl ConstraintSink for BoundCollector<'_> {
    fn is_my_type_variable(&self, var: TypeVarId) -> bool {
        self.storage.not_fixed_type_variables.contains_key(&var)
    }

    fn add_bound(&mut self, var: TypeVarId, ty: TypeId, kind: BoundKind) {
        self.queue.push_back(PendingBound {
            var,
            ty,
            kind,
            position: self.position.clone(),
            derived_from: self.derived_from.clone(),
        });
    }
}

pub(crate) struct ConstraintInjector<'a, 's> {
    env: &'a TypeEnvironment,
    storage: &'s mut ConstraintStorage,
    proper_types: &'s ProperTypeCache,
    queue: VecDeque<PendingBound>,
    steps: u32,
}

impl<'a, 's> ConstraintInjector<'a, 's> {
    pub(crate) fn new(
        env: &'a TypeEnvironment,
        storage: &'s mut ConstraintStorage,
        proper_types: &'s ProperTypeCache,
    ) -> Self {
        ConstraintInjector {
            env,
            storage,
            proper_types,
            queue: VecDeque::new(),
            steps: 0,
        }
    }

    /// `lower <: upper`, then incorporate everything it implies.
    pub(crate) fn add_subtype_constraint(&mut self, lower: TypeId, upper: TypeId, position: &ConstraintPosition) {
        self.check_subtype(lower, upper, position, &DerivedFrom::new());
        self.process_queue();
    }

    /// `var == ty` as a single EXACT bound, then incorporate it.
    pub(crate) fn add_exact_bound(&mut self, var: TypeVarId, ty: TypeId, position: &ConstraintPosition) {
        self.queue.push_back(PendingBound {
            var,
            ty,
            kind: BoundKind::Exact,
            position: position.clone(),
            derived_from: DerivedFrom::new(),
        });
        self.process_queue();
    }

    fn check_subtype(&mut self, lower: TypeId, upper: TypeId, position: &ConstraintPosition, derived_from: &DerivedFrom) {
        let env = self.env;
        let mut collector = BoundCollector {
            storage: &*self.storage,
            queue: &mut self.queue,
            position,
            derived_from,
        };
        let holds = SubtypeChecker::new(env).is_subtype(lower, upper, &mut collector);
        if !holds {
            debug!(lower = lower.0, upper = upper.0, "constraint failed");
            self.storage.errors.push(ConstraintSystemError::NewConstraintError {
                lower,
                upper,
                position: position.clone(),
            });
        }
    }

    fn process_queue(&mut self) {
        let limit = self.env.settings.max_incorporation_steps;
        while let Some(pending) = self.queue.pop_front() {
            self.steps += 1;
            if self.steps > limit {
                debug!(steps = limit, "incorporation step limit reached");
                let already_reported = self
                    .storage
                    .errors
                    .iter()
                    .any(|error| matches!(error, ConstraintSystemError::IncorporationLimitExceeded { .. }));
                if !already_reported {
                    self.storage
                        .errors
                        .push(ConstraintSystemError::IncorporationLimitExceeded { steps: limit });
                }
                self.queue.clear();
                return;
            }
            self.add_pending(pending);
        }
    }

    fn add_pending(&mut self, pending: PendingBound) {
        let PendingBound {
            var,
            ty,
            kind,
            position,
            derived_from,
        } = pending;

        if !self.storage.not_fixed_type_variables.contains_key(&var) {
            trace!(var = var.0, ty = ty.0, "bound on fixed variable ignored");
            return;
        }
        if ty.is_error() || self.env.interner.flags(ty).contains(TypeFlags::CONTAINS_ERROR) {
            self.storage
                .errors
                .push(ConstraintSystemError::ConstrainingTypeIsError { var, ty, position });
            return;
        }
        if self.should_skip(var, ty, kind, &position) {
            return;
        }

        let is_proper = self.proper_types.is_proper(self.env, &self.storage.all_type_variables, ty);
        let bound = Bound::new(var, ty, kind, position, is_proper).with_derived_from(derived_from);
        let Some(bounds) = self.storage.not_fixed_type_variables.get_mut(&var) else {
            return;
        };
        if !bounds.add_bound(bound.clone()) {
            return;
        }
        trace!(var = var.0, ty = ty.0, kind = ?kind, "incorporating bound");
        self.incorporate(&bound);
    }

    fn should_skip(&self, var: TypeVarId, ty: TypeId, kind: BoundKind, position: &ConstraintPosition) -> bool {
        if kind == BoundKind::Exact {
            return false;
        }
        if self.env.interner.as_variable(ty) == Some(var) {
            return true;
        }
        kind == BoundKind::Upper && ty == TypeId::ANY && matches!(position, ConstraintPosition::DeclaredUpperBound { .. })
    }

    fn incorporate(&mut self, bound: &Bound) {
        self.direct_with_variable(bound);
        self.inside_other_bounds(bound);

        if let Some(other) = self.my_variable(bound.constraining_type) {
            if other != bound.type_variable {
                let own_type = self.env.variable_type(bound.type_variable);
                trace!(var = other.0, from = bound.type_variable.0, "reciprocal bound");
                self.queue.push_back(PendingBound {
                    var: other,
                    ty: own_type,
                    kind: bound.kind.reverse(),
                    position: bound.position.clone(),
                    derived_from: bound.derived_from.clone(),
                });
            }
            return;
        }

        self.others_inside_this_bound(bound);
    }

    /// Pair the new bound with every earlier bound of the same variable.
    fn direct_with_variable(&mut self, new: &Bound) {
        let Some(bounds) = self.storage.not_fixed_type_variables.get(&new.type_variable) else {
            return;
        };
        let earlier: Vec<Bound> = bounds
            .bounds()
            .iter()
            .filter(|old| *old != new)
            .cloned()
            .collect();

        for old in &earlier {
            let position = ConstraintPosition::Compound(Box::new(old.position.clone()), Box::new(new.position.clone()));
            let derived_from = union_derived(&old.derived_from, &new.derived_from);
            // old <: var <: new
            if new.kind != BoundKind::Lower && old.kind != BoundKind::Upper {
                self.add_incorporated_subtype(old.constraining_type, new.constraining_type, &position, &derived_from);
            }
            // new <: var <: old
            if new.kind != BoundKind::Upper && old.kind != BoundKind::Lower {
                self.add_incorporated_subtype(new.constraining_type, old.constraining_type, &position, &derived_from);
            }
        }
    }

    /// Bounds of other variables whose type mentions the new bound's variable.
    fn inside_other_bounds(&mut self, new: &Bound) {
        let env = self.env;
        let var = new.type_variable;
        let mut users: Vec<Bound> = Vec::new();
        for (&other, bounds) in &self.storage.not_fixed_type_variables {
            if other == var {
                continue;
            }
            users.extend(
                bounds
                    .bounds()
                    .iter()
                    .filter(|bound| contains_type_variable(env, bound.constraining_type, var))
                    .cloned(),
            );
        }
        for base in &users {
            self.generate_new_bound(base.type_variable, base, var, new);
        }
    }

    /// Bounds of the variables nested in the new bound's type.
    fn others_inside_this_bound(&mut self, new: &Bound) {
        let nested = collect_type_variables(self.env, new.constraining_type);
        for other in nested {
            if other == new.type_variable {
                continue;
            }
            let Some(bounds) = self.storage.not_fixed_type_variables.get(&other) else {
                continue;
            };
            let other_bounds: Vec<Bound> = bounds.bounds().to_vec();
            for other_bound in &other_bounds {
                self.generate_new_bound(new.type_variable, new, other, other_bound);
            }
        }
    }

    fn generate_new_bound(&mut self, target: TypeVarId, base: &Bound, other: TypeVarId, other_bound: &Bound) {
        let env = self.env;
        let replacement = match other_bound.kind {
            BoundKind::Exact => other_bound.constraining_type,
            BoundKind::Upper => env.interner.captured(ProjectionKind::Out, other_bound.constraining_type),
            BoundKind::Lower => env.interner.captured(ProjectionKind::In, other_bound.constraining_type),
        };
        let mut map = IndexMap::new();
        map.insert(TypeSlot::Variable(other), replacement);
        let substituted = Substitutor::by_map(map).substitute(env, base.constraining_type);
        if substituted == base.constraining_type {
            return;
        }
        let approximation = approximate_captured_types(env, substituted);

        if base.kind != BoundKind::Upper && !self.is_trivial(approximation.lower, other_bound, true) {
            self.add_generated_bound(target, base, other, other_bound, approximation.lower, BoundKind::Lower);
        }
        if base.kind != BoundKind::Lower && !self.is_trivial(approximation.upper, other_bound, false) {
            self.add_generated_bound(target, base, other, other_bound, approximation.upper, BoundKind::Upper);
        }
    }

    /// `Nothing <: T` and `T <: Any` say nothing; neither does a generated
    /// type that only picked up `Nothing` from approximation.
    fn is_trivial(&self, generated: TypeId, other_bound: &Bound, is_lower: bool) -> bool {
        let env = self.env;
        if is_lower && generated == TypeId::NOTHING {
            return true;
        }
        if !is_lower && generated == TypeId::ANY {
            return true;
        }
        if contains_type_matching(env, other_bound.constraining_type, &|ty| ty == TypeId::NOTHING) {
            return false;
        }
        contains_type_matching(env, generated, &|ty| ty == TypeId::NOTHING)
    }

    fn add_generated_bound(
        &mut self,
        target: TypeVarId,
        base: &Bound,
        other: TypeVarId,
        other_bound: &Bound,
        ty: TypeId,
        kind: BoundKind,
    ) {
        if contains_type_variable(self.env, ty, target) {
            trace!(var = target.0, ty = ty.0, "derived bound mentions its own variable");
            return;
        }
        let mut derived_from = union_derived(&base.derived_from, &other_bound.derived_from);
        if derived_from.contains(&other) || derived_from.contains(&target) {
            trace!(var = target.0, through = other.0, "derivation cycle cut");
            return;
        }
        derived_from.push(other);
        if !self.is_allowed_depth(ty) {
            trace!(var = target.0, ty = ty.0, "derived bound too deep");
            return;
        }
        self.queue.push_back(PendingBound {
            var: target,
            ty,
            kind,
            position: ConstraintPosition::Compound(
                Box::new(base.position.clone()),
                Box::new(other_bound.position.clone()),
            ),
            derived_from,
        });
    }

    fn add_incorporated_subtype(
        &mut self,
        lower: TypeId,
        upper: TypeId,
        position: &ConstraintPosition,
        derived_from: &DerivedFrom,
    ) {
        if lower == upper {
            return;
        }
        if !self.is_allowed_depth(lower) || !self.is_allowed_depth(upper) {
            trace!(lower = lower.0, upper = upper.0, "incorporated constraint too deep");
            return;
        }
        self.check_subtype(lower, upper, position, derived_from);
    }

    fn is_allowed_depth(&self, ty: TypeId) -> bool {
        let allowed = self.storage.max_type_depth_from_initial_constraints
            + self.env.settings.allowed_depth_delta_for_incorporation;
        self.env.interner.depth(ty) <= allowed
    }

    fn my_variable(&self, ty: TypeId) -> Option<TypeVarId> {
        self.env
            .interner
            .as_variable(ty)
            .filter(|var| self.storage.not_fixed_type_variables.contains_key(var))
    }
}

fn union_derived(a: &DerivedFrom, b: &DerivedFrom) -> DerivedFrom {
    let mut result = a.clone();
    for &var in b {
        if !result.contains(&var) {
            result.push(var);
        }
    }
    result
}

#[cfg(test)]
#[path = "../tests/incorporation_tests.rs"]
mod tests;
