//! Bounds on type variables and the per-variable bound log.
//!
//! A [`TypeBounds`] is the append-only list of evidence about one variable.
//! Its candidate solutions (`values`) are a pure function of that list and are
//! memoized until the next append.
//!
//! # Candidate search
//!
//! Only proper bounds take part, and at least one of them must come from a
//! strong position. Candidates are tried in a fixed order and the first one
//! that satisfies every bound wins:
//!
//! 1. the best representative of the EXACT bounds
//! 2. the common supertype of the general LOWER bounds
//! 3. the numeric default of the integer literal LOWER bounds
//! 4. the common supertype of (2) and (3)
//! 5. the intersection of the UPPER bounds
//!
//! When none fits, the rejected candidates are returned together so the
//! caller can report an ambiguity.

use crate::atoms::CallId;
use crate::common_supertype::{common_supertype, intersect_types, numeric_common_supertype};
use crate::env::{TypeEnvironment, VariableAnnotations};
use crate::subtype::{NoConstraints, SubtypeChecker};
use crate::types::{TypeData, TypeFlags, TypeId, TypeVarId};
use kinfer_common::limits::DERIVED_FROM_INLINE;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace};

pub type DerivedFrom = SmallVec<[TypeVarId; DERIVED_FROM_INLINE]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BoundKind {
    /// `constraining type <: variable`
    Lower,
    /// `variable <: constraining type`
    Upper,
    /// `variable == constraining type`
    Exact,
}

impl BoundKind {
    /// Position in the chain `Lower <: Exact <: Upper` used when two bounds of
    /// the same variable are combined.
    pub fn chain_rank(self) -> u8 {
        match self {
            BoundKind::Lower => 0,
            BoundKind::Exact => 1,
            BoundKind::Upper => 2,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            BoundKind::Lower => BoundKind::Upper,
            BoundKind::Upper => BoundKind::Lower,
            BoundKind::Exact => BoundKind::Exact,
        }
    }
}

/// Where a constraint came from.
///
/// Positions are used for diagnostics and to tell strong evidence from weak
/// evidence: a declared upper bound alone never solves a variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintPosition {
    Argument { call: CallId },
    Receiver { call: CallId },
    ExpectedType,
    DeclaredUpperBound { var: TypeVarId },
    FixVariable { var: TypeVarId },
    /// Re-asserted fixed variable of a partially resolved call.
    BuilderInference,
    BuilderInferenceExpectedType { call: CallId },
    /// Bootstrap link between an outer session's variable and its stub type.
    InjectedAnotherStubType,
    /// A constraint rewritten while integrating a call into a common system.
    BuilderInferenceSubstitution {
        initial: Box<ConstraintPosition>,
        is_from_not_substituted_declared_upper_bound: bool,
    },
    /// Derived by incorporation from two other bounds.
    Compound(Box<ConstraintPosition>, Box<ConstraintPosition>),
}

impl ConstraintPosition {
    pub fn is_strong(&self) -> bool {
        match self {
            ConstraintPosition::DeclaredUpperBound { .. } => false,
            ConstraintPosition::BuilderInferenceSubstitution {
                is_from_not_substituted_declared_upper_bound,
                ..
            } => !is_from_not_substituted_declared_upper_bound,
            ConstraintPosition::Compound(a, b) => a.is_strong() || b.is_strong(),
            _ => true,
        }
    }

    pub fn is_from_builder_inference(&self) -> bool {
        match self {
            ConstraintPosition::BuilderInference
            | ConstraintPosition::BuilderInferenceExpectedType { .. }
            | ConstraintPosition::InjectedAnotherStubType
            | ConstraintPosition::BuilderInferenceSubstitution { .. } => true,
            ConstraintPosition::Compound(a, b) => {
                a.is_from_builder_inference() || b.is_from_builder_inference()
            }
            _ => false,
        }
    }

    /// Call the constraint is attributed to, if any.
    pub fn call(&self) -> Option<CallId> {
        match self {
            ConstraintPosition::Argument { call }
            | ConstraintPosition::Receiver { call }
            | ConstraintPosition::BuilderInferenceExpectedType { call } => Some(*call),
            ConstraintPosition::BuilderInferenceSubstitution { initial, .. } => initial.call(),
            ConstraintPosition::Compound(a, b) => a.call().or_else(|| b.call()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bound {
    pub type_variable: TypeVarId,
    pub constraining_type: TypeId,
    pub kind: BoundKind,
    pub position: ConstraintPosition,
    /// Variables substituted through to produce this bound.
    pub derived_from: DerivedFrom,
    /// Whether the constraining type mentions no type variable of the system.
    pub is_proper: bool,
}

impl Bound {
    pub fn new(
        type_variable: TypeVarId,
        constraining_type: TypeId,
        kind: BoundKind,
        position: ConstraintPosition,
        is_proper: bool,
    ) -> Self {
        Bound {
            type_variable,
            constraining_type,
            kind,
            position,
            derived_from: DerivedFrom::new(),
            is_proper,
        }
    }

    pub fn with_derived_from(mut self, derived_from: DerivedFrom) -> Self {
        self.derived_from = derived_from;
        self
    }

    /// Two bounds carry the same evidence when they agree on everything but
    /// the exact position and provenance.
    pub fn is_same_evidence(&self, other: &Bound) -> bool {
        self.type_variable == other.type_variable
            && self.constraining_type == other.constraining_type
            && self.kind == other.kind
            && self.position.is_strong() == other.position.is_strong()
    }
}

#[derive(Clone, Debug)]
pub struct TypeBounds {
    type_variable: TypeVarId,
    bounds: Vec<Bound>,
    values: Option<Vec<TypeId>>,
    fixed: bool,
}

impl TypeBounds {
    pub fn new(type_variable: TypeVarId) -> Self {
        TypeBounds {
            type_variable,
            bounds: Vec::new(),
            values: None,
            fixed: false,
        }
    }

    pub fn type_variable(&self) -> TypeVarId {
        self.type_variable
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Freeze the log once the variable has a committed solution.
    pub fn mark_fixed(&mut self) {
        self.fixed = true;
    }

    /// Append a bound. Returns `false` when the same evidence is already present.
    ///
    /// # Panics
    ///
    /// If the bound belongs to another variable, or this variable is fixed.
    pub fn add_bound(&mut self, bound: Bound) -> bool {
        assert_eq!(
            bound.type_variable, self.type_variable,
            "bound for variable {:?} added to the bounds of {:?}",
            bound.type_variable, self.type_variable
        );
        assert!(
            !self.fixed,
            "bound added to fixed type variable {:?}",
            self.type_variable
        );
        if self.bounds.iter().any(|existing| existing.is_same_evidence(&bound)) {
            return false;
        }
        trace!(
            var = self.type_variable.0,
            ty = bound.constraining_type.0,
            kind = ?bound.kind,
            "bound added"
        );
        self.bounds.push(bound);
        self.values = None;
        true
    }

    /// Bounds whose position satisfies `predicate`, as a new log.
    pub fn filter(&self, predicate: impl Fn(&ConstraintPosition) -> bool) -> TypeBounds {
        TypeBounds {
            type_variable: self.type_variable,
            bounds: self
                .bounds
                .iter()
                .filter(|bound| predicate(&bound.position))
                .cloned()
                .collect(),
            values: None,
            fixed: self.fixed,
        }
    }

    /// Candidate solutions, computed on first access after a change.
    pub fn values(&mut self, env: &TypeEnvironment) -> &[TypeId] {
        if self.values.is_none() {
            self.values = Some(self.compute_values(env));
        }
        self.values.as_deref().unwrap_or(&[])
    }

    /// The solution when the candidate search found exactly one.
    pub fn value(&mut self, env: &TypeEnvironment) -> Option<TypeId> {
        match self.values(env) {
            [single] => Some(*single),
            _ => None,
        }
    }

    pub fn compute_values(&self, env: &TypeEnvironment) -> Vec<TypeId> {
        let bounds: Vec<&Bound> = self.bounds.iter().filter(|bound| bound.is_proper).collect();
        if bounds.is_empty() {
            return Vec::new();
        }
        if !bounds.iter().any(|bound| bound.position.is_strong()) {
            return Vec::new();
        }

        let mut search = CandidateSearch {
            env,
            checker: SubtypeChecker::new(env),
            bounds: &bounds,
            only_input_types: env
                .variables
                .annotations(self.type_variable)
                .contains(VariableAnnotations::ONLY_INPUT_TYPES),
        };
        let mut values: Vec<TypeId> = Vec::new();

        let exact = filter_bounds(env, &bounds, BoundKind::Exact, Some(&mut values));
        if let Some(best) = search.single_best_representative(&exact) {
            if search.try_possible_answer(Some(best)) {
                return self.accept(best);
            }
        }
        push_all(&mut values, &exact);

        let lower = filter_bounds(env, &bounds, BoundKind::Lower, Some(&mut values));
        let (number_lower, general_lower): (Vec<TypeId>, Vec<TypeId>) = lower
            .iter()
            .partition(|&&ty| matches!(env.interner.lookup(ty), Some(TypeData::IntegerLiteral(_))));

        let super_of_lower = (!general_lower.is_empty()).then(|| common_supertype(env, &general_lower));
        if search.try_possible_answer(super_of_lower) {
            if let Some(answer) = super_of_lower {
                return self.accept(answer);
            }
        }
        push_all(&mut values, super_of_lower.as_slice());

        let super_of_numbers = (!number_lower.is_empty()).then(|| numeric_common_supertype(env, &number_lower));
        if search.try_possible_answer(super_of_numbers) {
            if let Some(answer) = super_of_numbers {
                return self.accept(answer);
            }
        }
        push_all(&mut values, super_of_numbers.as_slice());

        if let (Some(general), Some(numbers)) = (super_of_lower, super_of_numbers) {
            let super_of_all = common_supertype(env, &[general, numbers]);
            if search.try_possible_answer(Some(super_of_all)) {
                return self.accept(super_of_all);
            }
        }

        let upper = filter_bounds(env, &bounds, BoundKind::Upper, Some(&mut values));
        if !upper.is_empty() {
            if let Some(intersection) = intersect_types(env, &upper) {
                if search.try_possible_answer(Some(intersection)) {
                    return self.accept(intersection);
                }
            }
        }
        push_all(&mut values, &upper);

        if values.len() == 1 && search.only_input_types && !search.try_possible_answer(Some(values[0])) {
            debug!(var = self.type_variable.0, "only input types candidate rejected");
            return Vec::new();
        }
        debug!(
            var = self.type_variable.0,
            candidates = values.len(),
            "no single candidate fits every bound"
        );
        values
    }

    fn accept(&self, answer: TypeId) -> Vec<TypeId> {
        trace!(var = self.type_variable.0, ty = answer.0, "candidate accepted");
        vec![answer]
    }
}

fn push_all(values: &mut Vec<TypeId>, types: &[TypeId]) {
    for &ty in types {
        if !values.contains(&ty) {
            values.push(ty);
        }
    }
}

/// Constraining types of `kind`, deduplicated in order. Types containing
/// errors are diverted into `error_values` instead.
fn filter_bounds(
    env: &TypeEnvironment,
    bounds: &[&Bound],
    kind: BoundKind,
    mut error_values: Option<&mut Vec<TypeId>>,
) -> Vec<TypeId> {
    let mut result = Vec::new();
    for bound in bounds.iter().filter(|bound| bound.kind == kind) {
        let ty = bound.constraining_type;
        if env.interner.flags(ty).contains(TypeFlags::CONTAINS_ERROR) || ty.is_error() {
            if let Some(errors) = error_values.as_deref_mut() {
                push_all(errors, &[ty]);
            }
        } else if !result.contains(&ty) {
            result.push(ty);
        }
    }
    result
}

struct CandidateSearch<'a, 'b> {
    env: &'a TypeEnvironment,
    checker: SubtypeChecker<'a>,
    bounds: &'b [&'b Bound],
    only_input_types: bool,
}

impl CandidateSearch<'_, '_> {
    /// The one type every other exact type is equal to or a supertype of.
    fn single_best_representative(&mut self, types: &[TypeId]) -> Option<TypeId> {
        match types {
            [] => None,
            [single] => Some(*single),
            _ => types.iter().copied().find(|&candidate| {
                types
                    .iter()
                    .all(|&other| self.checker.is_subtype(candidate, other, &mut NoConstraints))
            }),
        }
    }

    fn try_possible_answer(&mut self, answer: Option<TypeId>) -> bool {
        let Some(answer) = answer else {
            return false;
        };
        let env = self.env;
        let is_captured = env.interner.as_captured(answer).is_some();
        if !env.is_denotable(answer) && !is_captured {
            trace!(ty = answer.0, "candidate rejected: not denotable");
            return false;
        }

        if self.only_input_types && !self.is_input_type(answer) {
            trace!(ty = answer.0, "candidate rejected: not an input type");
            return false;
        }

        for bound in self.bounds {
            let ty = bound.constraining_type;
            let holds = match bound.kind {
                BoundKind::Lower => self.checker.is_subtype(ty, answer, &mut NoConstraints),
                BoundKind::Upper => self.checker.is_subtype(answer, ty, &mut NoConstraints),
                BoundKind::Exact => self.checker.equal_types(ty, answer, &mut NoConstraints),
            };
            if !holds {
                trace!(ty = answer.0, bound = ty.0, kind = ?bound.kind, "candidate rejected by bound");
                return false;
            }
        }
        true
    }

    fn is_input_type(&mut self, answer: TypeId) -> bool {
        let env = self.env;
        let bounds = self.bounds;
        let mentioned = bounds.iter().any(|bound| {
            env.is_denotable(bound.constraining_type)
                && self
                    .checker
                    .equal_types(bound.constraining_type, answer, &mut NoConstraints)
        });
        if mentioned {
            return true;
        }
        bounds.iter().any(|bound| match env.interner.lookup(bound.constraining_type) {
            Some(TypeData::IntegerLiteral(value)) => env.integer_literal_candidates(value).contains(&answer),
            _ => false,
        })
    }
}

#[cfg(test)]
#[path = "../tests/bounds_tests.rs"]
mod tests;
