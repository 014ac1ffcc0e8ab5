//! Constraint system completion.
//!
//! Completion repeatedly picks the most ready not-fixed variable, computes its
//! result type from its bounds and fixes it. Fixing feeds the result back
//! through incorporation, which can make further variables ready.
//!
//! The calls being completed form the unit-of-work list: among variables of
//! equal readiness, those their callees mention are fixed first, in the order
//! the calls mention them.

use crate::atoms::{ResolvedAtom, ResolvedCallAtom};
use crate::bounds::ConstraintPosition;
use crate::errors::ConstraintSystemError;
use crate::system::{ConstraintSystem, VariableSet};
use crate::types::{TypeId, TypeVarId};
use crate::visitor::collect_type_variables;
use kinfer_common::limits::MAX_COMPLETION_ITERATIONS;
use tracing::{debug, trace, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompletionMode {
    /// Fix every variable, postponed ones last.
    Full,
    /// Fix only variables that are ready and not postponed.
    Partial,
}

/// How ready a variable is for fixation. Higher is fixed first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FixationReadiness {
    Forbidden,
    Postponed,
    WithoutProperConstraints,
    /// Has proper evidence, but some bounds still mention other variables.
    WithDependencies,
    Ready,
}

// =============================================================================
// VariableFixationFinder
// =============================================================================

pub struct VariableFixationFinder;

impl VariableFixationFinder {
    /// Whether `var` has at least one proper bound from a strong position.
    pub fn has_proper_constraint(system: &ConstraintSystem<'_>, var: TypeVarId) -> bool {
        system.bounds(var).is_some_and(|bounds| {
            bounds
                .bounds()
                .iter()
                .any(|bound| bound.is_proper && bound.position.is_strong())
        })
    }

    pub fn readiness(system: &ConstraintSystem<'_>, var: TypeVarId, mode: CompletionMode) -> FixationReadiness {
        let postponed = system.postponed_type_variables().contains(&var);
        let proper = Self::has_proper_constraint(system, var);
        match mode {
            CompletionMode::Partial if postponed || !proper => FixationReadiness::Forbidden,
            CompletionMode::Full if postponed => FixationReadiness::Postponed,
            _ if !proper => FixationReadiness::WithoutProperConstraints,
            _ => {
                let all_proper = system
                    .bounds(var)
                    .is_some_and(|bounds| bounds.bounds().iter().all(|bound| bound.is_proper));
                if all_proper {
                    FixationReadiness::Ready
                } else {
                    FixationReadiness::WithDependencies
                }
            }
        }
    }

    /// The most ready variable; ties go to the earliest registered one.
    pub fn find_first_variable_for_fixation(system: &ConstraintSystem<'_>, mode: CompletionMode) -> Option<TypeVarId> {
        let order: Vec<TypeVarId> = system.not_fixed_type_variables().collect();
        Self::find_first_in_order(system, mode, &order)
    }

    /// The most ready variable of `order`; ties go to the earliest in it.
    pub fn find_first_in_order(
        system: &ConstraintSystem<'_>,
        mode: CompletionMode,
        order: &[TypeVarId],
    ) -> Option<TypeVarId> {
        let mut best: Option<(FixationReadiness, TypeVarId)> = None;
        for &var in order {
            let readiness = Self::readiness(system, var, mode);
            trace!(var = var.0, ?readiness, "fixation readiness");
            if readiness == FixationReadiness::Forbidden {
                continue;
            }
            if best.is_none_or(|(current, _)| readiness > current) {
                best = Some((readiness, var));
            }
        }
        best.map(|(_, var)| var)
    }

    /// Not-fixed variables mentioned by the callees of `atoms` and their
    /// sub-calls, in order of mention, followed by the rest in registration
    /// order.
    pub fn ordered_type_variables(system: &ConstraintSystem<'_>, atoms: &[&ResolvedCallAtom]) -> Vec<TypeVarId> {
        let env = system.env();
        let not_fixed: VariableSet = system.not_fixed_type_variables().collect();
        let mut ordered = VariableSet::default();
        let mut mention = |call: &ResolvedCallAtom| {
            let callee = &call.callee;
            let types = [callee.dispatch_receiver_type, callee.extension_receiver_type, Some(callee.return_type)];
            for ty in types.into_iter().flatten() {
                for var in collect_type_variables(env, ty) {
                    if not_fixed.contains(&var) {
                        ordered.insert(var);
                    }
                }
            }
        };
        for &atom in atoms {
            mention(atom);
            for sub_atom in &atom.sub_atoms {
                sub_atom.walk(&mut |nested| {
                    if let ResolvedAtom::Call(call) | ResolvedAtom::SubCall(call) = nested {
                        mention(call);
                    }
                });
            }
        }
        ordered.extend(not_fixed);
        ordered.into_iter().collect()
    }
}

// =============================================================================
// ConstraintSystemCompleter
// =============================================================================

pub struct ConstraintSystemCompleter;

impl ConstraintSystemCompleter {
    /// Fix variables until none is eligible under `mode`. Returns how many
    /// were fixed.
    pub fn complete(system: &mut ConstraintSystem<'_>, mode: CompletionMode) -> u32 {
        Self::complete_calls(system, mode, &[])
    }

    /// [`complete`](Self::complete) with `atoms` as the unit-of-work list.
    pub fn complete_calls(system: &mut ConstraintSystem<'_>, mode: CompletionMode, atoms: &[&ResolvedCallAtom]) -> u32 {
        system.begin_completion();
        let mut fixed = 0u32;
        loop {
            let order = VariableFixationFinder::ordered_type_variables(system, atoms);
            let Some(var) = VariableFixationFinder::find_first_in_order(system, mode, &order) else {
                break;
            };
            if fixed >= MAX_COMPLETION_ITERATIONS {
                warn!(fixed, ?mode, "completion iteration limit reached");
                break;
            }
            let ty = Self::result_type(system, var);
            system.fix_variable(var, ty, ConstraintPosition::FixVariable { var });
            fixed += 1;
        }
        system.end_completion();
        debug!(fixed, ?mode, "constraint system completed");
        fixed
    }

    /// The type `var` is fixed to, recording why when it cannot be inferred.
    pub fn result_type(system: &mut ConstraintSystem<'_>, var: TypeVarId) -> TypeId {
        let values = system.values(var);
        match values.len() {
            1 => values[0],
            0 => {
                system.add_error(ConstraintSystemError::NotEnoughInformation { var });
                TypeId::ERROR
            }
            _ => {
                system.add_error(ConstraintSystemError::CannotInferType { var, candidates: values });
                TypeId::ERROR
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/completion_tests.rs"]
mod tests;
