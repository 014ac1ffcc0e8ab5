//! The mutable constraint system.
//!
//! A `ConstraintSystem` owns a [`ConstraintStorage`] snapshot and guards it
//! with a small state machine:
//!
//! ```text
//! Building ──prepare_transaction──▶ Transaction ──commit/rollback──▶ Building
//!    │
//!    ├──as_read_only_storage──▶ Freezed
//!    └──begin_completion─────▶ Completion
//! ```
//!
//! Each operation asserts the states it may run in. A violation is a broken
//! caller invariant and panics.

use crate::bounds::{Bound, ConstraintPosition, TypeBounds};
use crate::env::{TypeEnvironment, VariableAnnotations};
use crate::errors::ConstraintSystemError;
use crate::incorporation::ConstraintInjector;
use crate::subtype::{NoConstraints, SubtypeChecker};
use crate::substitution::{Substitutor, TypeSlot};
use crate::types::{TypeData, TypeFlags, TypeId, TypeVarId};
use crate::visitor::{collect_type_variables, contains_type_matching};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxBuildHasher, FxHashMap};
use std::cell::RefCell;
use tracing::{debug, trace};

pub type VariableMap<V> = IndexMap<TypeVarId, V, FxBuildHasher>;
pub type VariableSet = IndexSet<TypeVarId, FxBuildHasher>;

// =============================================================================
// Initial constraints
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InitialConstraintKind {
    /// `a :> b`
    Lower,
    /// `a <: b`
    Upper,
    /// `a == b`
    Equality,
}

/// A constraint as the caller stated it, before incorporation.
///
/// The log of initial constraints is what gets replayed when one system's
/// evidence is integrated into another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialConstraint {
    pub a: TypeId,
    pub b: TypeId,
    pub kind: InitialConstraintKind,
    pub position: ConstraintPosition,
}

impl InitialConstraint {
    /// Rewrite both sides. An unchanged constraint keeps its position;
    /// a changed one is marked as produced by builder inference.
    pub fn substitute(&self, env: &TypeEnvironment, substitutor: &Substitutor) -> InitialConstraint {
        let a = substitutor.substitute(env, self.a);
        let b = substitutor.substitute(env, self.b);
        if a == self.a && b == self.b {
            return self.clone();
        }
        let is_from_not_substituted_declared_upper_bound =
            b == self.b && matches!(self.position, ConstraintPosition::DeclaredUpperBound { .. });
        let keep_weak_position = is_from_not_substituted_declared_upper_bound
            && env
                .settings
                .language_features
                .forbid_inferring_postponed_type_variable_into_declared_upper_bound;
        let position = if keep_weak_position {
            self.position.clone()
        } else {
            ConstraintPosition::BuilderInferenceSubstitution {
                initial: Box::new(self.position.clone()),
                is_from_not_substituted_declared_upper_bound,
            }
        };
        InitialConstraint {
            a,
            b,
            kind: self.kind,
            position,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Everything a constraint system knows. Cloning it is a snapshot.
#[derive(Clone, Debug, Default)]
pub struct ConstraintStorage {
    pub all_type_variables: VariableSet,
    pub not_fixed_type_variables: VariableMap<TypeBounds>,
    /// Bounds of fixed variables, frozen at the time of fixing.
    pub fixed_type_bounds: VariableMap<TypeBounds>,
    pub fixed_type_variables: VariableMap<TypeId>,
    pub postponed_type_variables: VariableSet,
    pub initial_constraints: Vec<InitialConstraint>,
    pub errors: Vec<ConstraintSystemError>,
    pub max_type_depth_from_initial_constraints: u32,
    /// Only-input-types checks waiting for every variable to be fixed.
    pub postponed_input_type_checks: Vec<(TypeVarId, TypeId)>,
}

impl ConstraintStorage {
    pub fn is_empty(&self) -> bool {
        self.all_type_variables.is_empty() && self.initial_constraints.is_empty()
    }

    pub fn has_contradiction(&self) -> bool {
        self.errors.iter().any(ConstraintSystemError::is_contradiction)
    }

    pub fn bounds(&self, var: TypeVarId) -> Option<&TypeBounds> {
        self.not_fixed_type_variables
            .get(&var)
            .or_else(|| self.fixed_type_bounds.get(&var))
    }

    /// Substitutor mapping every fixed variable to its type.
    pub fn build_current_substitutor(&self) -> Substitutor {
        Substitutor::by_map(
            self.fixed_type_variables
                .iter()
                .map(|(&var, &ty)| (TypeSlot::Variable(var), ty))
                .collect(),
        )
    }

    /// Fixed variables to their types; not-fixed ones to `Error` when
    /// `not_fixed_to_error` is set, otherwise left alone.
    pub fn build_resulting_substitutor(&self, not_fixed_to_error: bool) -> Substitutor {
        let mut map: IndexMap<TypeSlot, TypeId> = self
            .fixed_type_variables
            .iter()
            .map(|(&var, &ty)| (TypeSlot::Variable(var), ty))
            .collect();
        if not_fixed_to_error {
            for &var in self.not_fixed_type_variables.keys() {
                map.insert(TypeSlot::Variable(var), TypeId::ERROR);
            }
        }
        Substitutor::by_map(map)
    }
}

/// Per-system memo of which types are proper.
///
/// A type is proper when it mentions no registered type variable and no
/// stub type. Registering a variable clears the memo.
#[derive(Debug, Default)]
pub struct ProperTypeCache {
    cache: RefCell<FxHashMap<TypeId, bool>>,
}

impl ProperTypeCache {
    pub fn is_proper(&self, env: &TypeEnvironment, variables: &VariableSet, ty: TypeId) -> bool {
        let flags = env.interner.flags(ty);
        if flags.contains(TypeFlags::CONTAINS_STUB) {
            return false;
        }
        if !flags.contains(TypeFlags::CONTAINS_VARIABLE) {
            return true;
        }
        if let Some(&proper) = self.cache.borrow().get(&ty) {
            return proper;
        }
        let proper = !collect_type_variables(env, ty)
            .iter()
            .any(|var| variables.contains(var));
        self.cache.borrow_mut().insert(ty, proper);
        proper
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl Clone for ProperTypeCache {
    fn clone(&self) -> Self {
        ProperTypeCache::default()
    }
}

// =============================================================================
// ConstraintSystem
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintSystemState {
    Building,
    Transaction,
    Freezed,
    Completion,
}

#[derive(Clone, Debug)]
struct TransactionSnapshot {
    storage: ConstraintStorage,
    state: ConstraintSystemState,
}

#[derive(Clone)]
pub struct ConstraintSystem<'a> {
    env: &'a TypeEnvironment,
    storage: ConstraintStorage,
    state: ConstraintSystemState,
    transactions: Vec<TransactionSnapshot>,
    proper_types: ProperTypeCache,
}

impl<'a> ConstraintSystem<'a> {
    pub fn new(env: &'a TypeEnvironment) -> Self {
        ConstraintSystem {
            env,
            storage: ConstraintStorage::default(),
            state: ConstraintSystemState::Building,
            transactions: Vec::new(),
            proper_types: ProperTypeCache::default(),
        }
    }

    pub fn env(&self) -> &'a TypeEnvironment {
        self.env
    }

    pub fn state(&self) -> ConstraintSystemState {
        self.state
    }

    fn check_state(&self, allowed: &[ConstraintSystemState]) {
        if !allowed.contains(&self.state) {
            panic!("State {:?} is not allowed. AllowedStates: {:?}", self.state, allowed);
        }
    }

    // ----- Variables -----

    pub fn register_variable(&mut self, var: TypeVarId) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        if !self.storage.all_type_variables.insert(var) {
            panic!("Type variable already registered: {}", self.env.variable_name(var));
        }
        self.storage.not_fixed_type_variables.insert(var, TypeBounds::new(var));
        self.proper_types.clear();
        trace!(var = var.0, "registered type variable");
    }

    pub fn register_variable_if_not_present(&mut self, var: TypeVarId) {
        if !self.is_registered(var) {
            self.register_variable(var);
        }
    }

    pub fn is_registered(&self, var: TypeVarId) -> bool {
        self.storage.all_type_variables.contains(&var)
    }

    pub fn mark_postponed_variable(&mut self, var: TypeVarId) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        self.storage.postponed_type_variables.insert(var);
    }

    pub fn unmark_postponed_variable(&mut self, var: TypeVarId) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        self.storage.postponed_type_variables.shift_remove(&var);
    }

    /// Whether `ty` is a not-fixed variable of this system.
    pub fn is_type_variable(&self, ty: TypeId) -> bool {
        self.env
            .interner
            .as_variable(ty)
            .is_some_and(|var| self.storage.not_fixed_type_variables.contains_key(&var))
    }

    // ----- Constraints -----

    pub fn add_subtype_constraint(&mut self, lower: TypeId, upper: TypeId, position: ConstraintPosition) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        self.storage.initial_constraints.push(InitialConstraint {
            a: lower,
            b: upper,
            kind: InitialConstraintKind::Upper,
            position: position.clone(),
        });
        self.update_allowed_type_depth(lower);
        self.update_allowed_type_depth(upper);

        let current = self.storage.build_current_substitutor();
        let lower = current.substitute(self.env, lower);
        let upper = current.substitute(self.env, upper);
        debug!(lower = lower.0, upper = upper.0, ?position, "subtype constraint");
        ConstraintInjector::new(self.env, &mut self.storage, &self.proper_types)
            .add_subtype_constraint(lower, upper, &position);
    }

    pub fn add_equality_constraint(&mut self, a: TypeId, b: TypeId, position: ConstraintPosition) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        self.storage.initial_constraints.push(InitialConstraint {
            a,
            b,
            kind: InitialConstraintKind::Equality,
            position: position.clone(),
        });
        self.add_equality_without_recording(a, b, position);
    }

    fn add_equality_without_recording(&mut self, a: TypeId, b: TypeId, position: ConstraintPosition) {
        let current = self.storage.build_current_substitutor();
        let a = current.substitute(self.env, a);
        let b = current.substitute(self.env, b);
        let (variable, equal_type) = match (self.my_variable(a), self.my_variable(b)) {
            (Some(var), _) => (Some(var), b),
            (None, Some(var)) => (Some(var), a),
            (None, None) => (None, b),
        };
        self.update_allowed_type_depth(equal_type);
        debug!(a = a.0, b = b.0, ?position, "equality constraint");
        let mut injector = ConstraintInjector::new(self.env, &mut self.storage, &self.proper_types);
        match variable {
            Some(var) => injector.add_exact_bound(var, equal_type, &position),
            None => {
                injector.add_subtype_constraint(a, b, &position);
                injector.add_subtype_constraint(b, a, &position);
            }
        }
    }

    /// Replay a recorded constraint.
    pub fn add_initial_constraint(&mut self, constraint: InitialConstraint) {
        match constraint.kind {
            InitialConstraintKind::Upper => self.add_subtype_constraint(constraint.a, constraint.b, constraint.position),
            InitialConstraintKind::Lower => self.add_subtype_constraint(constraint.b, constraint.a, constraint.position),
            InitialConstraintKind::Equality => {
                self.add_equality_constraint(constraint.a, constraint.b, constraint.position)
            }
        }
    }

    fn my_variable(&self, ty: TypeId) -> Option<TypeVarId> {
        self.env
            .interner
            .as_variable(ty)
            .filter(|var| self.storage.not_fixed_type_variables.contains_key(var))
    }

    fn update_allowed_type_depth(&mut self, ty: TypeId) {
        let depth = self.env.interner.depth(ty);
        let storage = &mut self.storage;
        storage.max_type_depth_from_initial_constraints = storage.max_type_depth_from_initial_constraints.max(depth);
    }

    // ----- Errors -----

    pub fn add_error(&mut self, error: ConstraintSystemError) {
        debug!(%error, "constraint system error");
        self.storage.errors.push(error);
    }

    pub fn errors(&self) -> &[ConstraintSystemError] {
        &self.storage.errors
    }

    pub fn has_contradiction(&self) -> bool {
        use ConstraintSystemState::*;
        self.check_state(&[Freezed, Building, Completion, Transaction]);
        self.storage.has_contradiction()
    }

    // ----- Transactions -----

    pub fn prepare_transaction(&mut self) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        self.transactions.push(TransactionSnapshot {
            storage: self.storage.clone(),
            state: self.state,
        });
        self.state = Transaction;
    }

    /// Keep everything added since the matching `prepare_transaction`.
    pub fn commit_transaction(&mut self) {
        self.check_state(&[ConstraintSystemState::Transaction]);
        let Some(snapshot) = self.transactions.pop() else {
            panic!("commit without an open transaction");
        };
        self.state = snapshot.state;
    }

    /// Drop everything added since the matching `prepare_transaction`.
    pub fn rollback_transaction(&mut self) {
        self.check_state(&[ConstraintSystemState::Transaction]);
        let Some(snapshot) = self.transactions.pop() else {
            panic!("rollback without an open transaction");
        };
        debug!(
            variables = self
                .storage
                .all_type_variables
                .len()
                .saturating_sub(snapshot.storage.all_type_variables.len()),
            "transaction rolled back"
        );
        self.storage = snapshot.storage;
        self.state = snapshot.state;
        self.proper_types.clear();
    }

    /// Run `body` in a transaction that is kept only if it returns `true`.
    pub fn run_transaction(&mut self, body: impl FnOnce(&mut Self) -> bool) -> bool {
        self.prepare_transaction();
        let keep = body(self);
        if keep {
            self.commit_transaction();
        } else {
            self.rollback_transaction();
        }
        keep
    }

    // ----- Merging -----

    /// Merge another system's storage into this one.
    pub fn add_other_system(&mut self, other: &ConstraintStorage) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Transaction]);
        if !other.all_type_variables.is_empty() {
            self.storage
                .all_type_variables
                .extend(other.all_type_variables.iter().copied());
            self.proper_types.clear();
        }
        for (&var, bounds) in &other.not_fixed_type_variables {
            let rebuilt = self.reproperize(bounds);
            self.storage.not_fixed_type_variables.insert(var, rebuilt);
        }
        for (&var, bounds) in &other.fixed_type_bounds {
            self.storage.fixed_type_bounds.insert(var, bounds.clone());
        }
        self.storage
            .initial_constraints
            .extend(other.initial_constraints.iter().cloned());
        self.storage.max_type_depth_from_initial_constraints = self
            .storage
            .max_type_depth_from_initial_constraints
            .max(other.max_type_depth_from_initial_constraints);
        self.storage.errors.extend(other.errors.iter().cloned());
        self.storage
            .fixed_type_variables
            .extend(other.fixed_type_variables.iter().map(|(&var, &ty)| (var, ty)));
        self.storage
            .postponed_type_variables
            .extend(other.postponed_type_variables.iter().copied());
        self.storage
            .postponed_input_type_checks
            .extend(other.postponed_input_type_checks.iter().copied());
    }

    /// Recompute properness of bounds against this system's variables.
    fn reproperize(&self, bounds: &TypeBounds) -> TypeBounds {
        let mut rebuilt = TypeBounds::new(bounds.type_variable());
        for bound in bounds.bounds() {
            let is_proper = self.is_proper_type(bound.constraining_type);
            rebuilt.add_bound(Bound {
                is_proper,
                ..bound.clone()
            });
        }
        rebuilt
    }

    // ----- Queries -----

    pub fn is_proper_type(&self, ty: TypeId) -> bool {
        self.proper_types
            .is_proper(self.env, &self.storage.all_type_variables, ty)
    }

    /// No not-fixed variable occurs in `ty` except postponed ones.
    pub fn contains_only_fixed_or_postponed_variables(&self, ty: TypeId) -> bool {
        collect_type_variables(self.env, ty).iter().all(|var| {
            !self.storage.not_fixed_type_variables.contains_key(var)
                || self.storage.postponed_type_variables.contains(var)
        })
    }

    /// Whether `ty` becomes proper once the current fixed variables are substituted.
    pub fn can_be_proper(&self, ty: TypeId) -> bool {
        let substituted = self.storage.build_current_substitutor().substitute(self.env, ty);
        !contains_type_matching(self.env, substituted, &|inner| {
            matches!(
                self.env.interner.lookup(inner),
                Some(TypeData::Variable(var)) if self.storage.not_fixed_type_variables.contains_key(&var)
            )
        })
    }

    pub fn bounds(&self, var: TypeVarId) -> Option<&TypeBounds> {
        self.storage.bounds(var)
    }

    /// Candidate solutions for a not-fixed variable.
    pub fn values(&mut self, var: TypeVarId) -> Vec<TypeId> {
        let env = self.env;
        match self.storage.not_fixed_type_variables.get_mut(&var) {
            Some(bounds) => bounds.values(env).to_vec(),
            None => Vec::new(),
        }
    }

    pub fn not_fixed_type_variables(&self) -> impl Iterator<Item = TypeVarId> + '_ {
        self.storage.not_fixed_type_variables.keys().copied()
    }

    pub fn postponed_type_variables(&self) -> &VariableSet {
        &self.storage.postponed_type_variables
    }

    pub fn fixed_type_variables(&self) -> &VariableMap<TypeId> {
        &self.storage.fixed_type_variables
    }

    // ----- Fixation -----

    /// Commit `ty` as the solution of `var`.
    pub fn fix_variable(&mut self, var: TypeVarId, ty: TypeId, position: ConstraintPosition) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion]);
        assert!(
            self.storage.not_fixed_type_variables.contains_key(&var),
            "Type variable {} is not a not-fixed variable of this system",
            self.env.variable_name(var)
        );
        // An unresolved variable was already reported; its error type would
        // only add a second, misleading error.
        if !ty.is_error() {
            let variable_type = self.env.variable_type(var);
            self.add_equality_constraint(variable_type, ty, position);
        }

        let Some(mut bounds) = self.storage.not_fixed_type_variables.shift_remove(&var) else {
            return;
        };
        bounds.mark_fixed();
        self.storage.fixed_type_bounds.insert(var, bounds);
        self.storage.fixed_type_variables.insert(var, ty);
        self.proper_types.clear();
        debug!(var = var.0, ty = ty.0, "fixed type variable");

        if self
            .env
            .variables
            .annotations(var)
            .contains(VariableAnnotations::ONLY_INPUT_TYPES)
        {
            self.storage.postponed_input_type_checks.push((var, ty));
        }
        if self.storage.not_fixed_type_variables.is_empty() {
            self.run_postponed_input_type_checks();
        }
    }

    fn run_postponed_input_type_checks(&mut self) {
        let checks = std::mem::take(&mut self.storage.postponed_input_type_checks);
        if checks.is_empty() {
            return;
        }
        let substitutor = self.storage.build_current_substitutor();
        let env = self.env;
        let mut checker = SubtypeChecker::new(env);
        for (var, ty) in checks {
            let Some(bounds) = self.storage.fixed_type_bounds.get(&var) else {
                continue;
            };
            let is_input = bounds.bounds().iter().any(|bound| {
                if matches!(
                    bound.position,
                    ConstraintPosition::DeclaredUpperBound { .. } | ConstraintPosition::FixVariable { .. }
                ) {
                    return false;
                }
                let input = substitutor.substitute(env, bound.constraining_type);
                match env.interner.lookup(input) {
                    Some(TypeData::IntegerLiteral(value)) => env.integer_literal_candidates(value).contains(&ty),
                    _ => checker.equal_types(input, ty, &mut NoConstraints),
                }
            });
            if !is_input {
                debug!(var = var.0, ty = ty.0, "only input types violated");
                self.storage
                    .errors
                    .push(ConstraintSystemError::OnlyInputTypes { var, ty });
            }
        }
    }

    /// Apply `substitutor` to every recorded fixed type.
    pub fn substitute_fixed_variables(&mut self, substitutor: &Substitutor) {
        let env = self.env;
        for ty in self.storage.fixed_type_variables.values_mut() {
            *ty = substitutor.substitute(env, *ty);
        }
    }

    // ----- Substitutors -----

    pub fn build_current_substitutor(&self) -> Substitutor {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Completion, Freezed, Transaction]);
        self.storage.build_current_substitutor()
    }

    pub fn build_resulting_substitutor(&self, not_fixed_to_error: bool) -> Substitutor {
        self.storage.build_resulting_substitutor(not_fixed_to_error)
    }

    pub fn not_fixed_to_stub_types_substitutor(&self) -> Substitutor {
        Substitutor::by_map(
            self.storage
                .not_fixed_type_variables
                .keys()
                .map(|&var| (TypeSlot::Variable(var), self.env.stub_type(var)))
                .collect(),
        )
    }

    // ----- Storage access -----

    pub fn current_storage(&self) -> &ConstraintStorage {
        use ConstraintSystemState::*;
        self.check_state(&[Freezed, Building, Completion, Transaction]);
        &self.storage
    }

    /// Freeze the system and expose its storage.
    pub fn as_read_only_storage(&mut self) -> &ConstraintStorage {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Freezed]);
        self.state = Freezed;
        &self.storage
    }

    pub fn begin_completion(&mut self) {
        use ConstraintSystemState::*;
        self.check_state(&[Building, Freezed, Completion]);
        self.state = Completion;
    }

    pub fn end_completion(&mut self) {
        self.check_state(&[ConstraintSystemState::Completion]);
        self.state = ConstraintSystemState::Building;
    }

    pub fn into_storage(self) -> ConstraintStorage {
        self.storage
    }
}

#[cfg(test)]
#[path = "../tests/system_tests.rs"]
mod tests;
