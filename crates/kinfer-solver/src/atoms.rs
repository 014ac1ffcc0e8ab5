//! Resolved atoms: the call-site facts the frontend hands to inference.
//!
//! A resolved call is a tree: the call itself, the calls passed as its
//! arguments, lambdas and callable references whose analysis may be postponed,
//! and plain expressions. The tree is a closed sum type and every traversal
//! goes through [`ResolvedAtom::children`].

use crate::env::TypeEnvironment;
use crate::substitution::Substitutor;
use crate::system::ConstraintStorage;
use crate::trace::{ResolvedCallRecord, TemporaryTrace, Trace, TraceFact, TraceKey};
use crate::types::TypeId;
use crate::visitor::{contains_stub_type, should_be_updated};
use kinfer_common::{Atom, Diagnostic};
use serde::Serialize;
use smallvec::{SmallVec, smallvec};
use tracing::trace;

/// Frontend handle of a call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallId(pub u32);

/// Frontend handle of a syntax element (expression, declaration, lambda).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub u32);

// =============================================================================
// Callee descriptors
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CalleeKind {
    Function,
    LocalVariable,
    /// Synthetic descriptor standing for an `object` used as a value.
    ObjectValue,
    Property,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalleeDescriptor {
    pub name: Atom,
    pub kind: CalleeKind,
    pub has_builder_inference_annotation: bool,
    pub dispatch_receiver_type: Option<TypeId>,
    pub extension_receiver_type: Option<TypeId>,
    pub return_type: TypeId,
}

impl CalleeDescriptor {
    pub fn new(name: Atom, kind: CalleeKind, return_type: TypeId) -> Self {
        CalleeDescriptor {
            name,
            kind,
            has_builder_inference_annotation: false,
            dispatch_receiver_type: None,
            extension_receiver_type: None,
            return_type,
        }
    }

    pub fn with_dispatch_receiver(mut self, ty: TypeId) -> Self {
        self.dispatch_receiver_type = Some(ty);
        self
    }

    pub fn with_extension_receiver(mut self, ty: TypeId) -> Self {
        self.extension_receiver_type = Some(ty);
        self
    }

    pub fn with_builder_inference_annotation(mut self) -> Self {
        self.has_builder_inference_annotation = true;
        self
    }

    pub fn is_extension(&self) -> bool {
        self.extension_receiver_type.is_some()
    }

    pub fn any_receiver_contains_stub(&self, env: &TypeEnvironment) -> bool {
        self.dispatch_receiver_type
            .into_iter()
            .chain(self.extension_receiver_type)
            .any(|ty| contains_stub_type(env, ty))
    }

    /// Whether a call resolved to this descriptor may stay inside a builder
    /// inference lambda.
    pub fn is_applicable_for_builder_inference(&self, env: &TypeEnvironment) -> bool {
        if env.settings.language_features.unrestricted_builder_inference {
            return true;
        }
        if let Some(receiver) = self.extension_receiver_type {
            if !self.has_builder_inference_annotation {
                return !contains_stub_type(env, receiver);
            }
        }
        !contains_stub_type(env, self.return_type)
    }

    pub fn substitute(&self, env: &TypeEnvironment, substitutor: &Substitutor) -> CalleeDescriptor {
        CalleeDescriptor {
            dispatch_receiver_type: self.dispatch_receiver_type.map(|ty| substitutor.substitute(env, ty)),
            extension_receiver_type: self.extension_receiver_type.map(|ty| substitutor.substitute(env, ty)),
            return_type: substitutor.substitute(env, self.return_type),
            ..self.clone()
        }
    }
}

// =============================================================================
// Atoms
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCallAtom {
    pub call: CallId,
    pub element: ElementId,
    pub callee: CalleeDescriptor,
    /// Stable type of the dispatch receiver argument.
    pub dispatch_receiver: Option<TypeId>,
    /// Stable type of the extension receiver argument.
    pub extension_receiver: Option<TypeId>,
    pub sub_atoms: Vec<ResolvedAtom>,
}

impl ResolvedCallAtom {
    pub fn new(call: CallId, element: ElementId, callee: CalleeDescriptor) -> Self {
        ResolvedCallAtom {
            call,
            element,
            callee,
            dispatch_receiver: None,
            extension_receiver: None,
            sub_atoms: Vec::new(),
        }
    }

    /// A call takes part in builder inference when a receiver it is invoked
    /// on flows from a stub type, or when one of its argument calls does.
    pub fn is_suitable_for_builder_inference(&self, env: &TypeEnvironment) -> bool {
        let sub_call_suitable = self.sub_atoms.iter().any(|atom| match atom {
            ResolvedAtom::SubCall(call) => call.is_suitable_for_builder_inference(env),
            _ => false,
        });
        if sub_call_suitable {
            return true;
        }
        if self.dispatch_receiver.is_some_and(|ty| contains_stub_type(env, ty)) {
            return true;
        }
        if self.extension_receiver.is_some_and(|ty| contains_stub_type(env, ty)) {
            return self.callee.has_builder_inference_annotation;
        }
        false
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LambdaAtom {
    pub element: ElementId,
    pub analyzed: bool,
    /// Atoms produced by the lambda body.
    pub sub_atoms: Vec<ResolvedAtom>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallableReferenceAtom {
    pub element: ElementId,
    pub analyzed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedAtom {
    Call(ResolvedCallAtom),
    SubCall(ResolvedCallAtom),
    Lambda(LambdaAtom),
    CallableReference(CallableReferenceAtom),
    Expression { element: ElementId },
}

impl ResolvedAtom {
    pub fn element(&self) -> ElementId {
        match self {
            ResolvedAtom::Call(call) | ResolvedAtom::SubCall(call) => call.element,
            ResolvedAtom::Lambda(lambda) => lambda.element,
            ResolvedAtom::CallableReference(reference) => reference.element,
            ResolvedAtom::Expression { element } => *element,
        }
    }

    pub fn children(&self) -> &[ResolvedAtom] {
        match self {
            ResolvedAtom::Call(call) | ResolvedAtom::SubCall(call) => &call.sub_atoms,
            ResolvedAtom::Lambda(lambda) => &lambda.sub_atoms,
            ResolvedAtom::CallableReference(_) | ResolvedAtom::Expression { .. } => &[],
        }
    }

    /// A lambda or callable reference that has not been analyzed yet.
    pub fn is_unanalyzed_postponed(&self) -> bool {
        match self {
            ResolvedAtom::Lambda(lambda) => !lambda.analyzed,
            ResolvedAtom::CallableReference(reference) => !reference.analyzed,
            _ => false,
        }
    }

    pub fn has_postponed(&self) -> bool {
        self.is_unanalyzed_postponed() || self.children().iter().any(ResolvedAtom::has_postponed)
    }

    /// Pre-order traversal.
    pub fn walk(&self, visit: &mut dyn FnMut(&ResolvedAtom)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

// =============================================================================
// Call info
// =============================================================================

/// A call captured by a builder inference session.
#[derive(Debug)]
pub struct CallInfo {
    pub call: CallId,
    /// Element ids from the outermost enclosing element down to the call.
    pub element_path: SmallVec<[ElementId; 4]>,
    pub is_lhs_of_double_colon: bool,
    pub atom: ResolvedCallAtom,
    pub storage: ConstraintStorage,
    pub trace: TemporaryTrace,
    pub diagnostics: Vec<Diagnostic>,
}

impl CallInfo {
    pub fn new(atom: ResolvedCallAtom, storage: ConstraintStorage) -> Self {
        CallInfo {
            call: atom.call,
            element_path: smallvec![atom.element],
            is_lhs_of_double_colon: false,
            atom,
            storage,
            trace: TemporaryTrace::new("call"),
            diagnostics: Vec::new(),
        }
    }

    /// Set the chain of enclosing elements; the call element is appended.
    pub fn with_enclosing_elements(mut self, enclosing: &[ElementId]) -> Self {
        let mut path: SmallVec<[ElementId; 4]> = enclosing.iter().copied().collect();
        path.push(self.atom.element);
        self.element_path = path;
        self
    }

    pub fn in_lhs_of_double_colon(mut self) -> Self {
        self.is_lhs_of_double_colon = true;
        self
    }

    pub fn element(&self) -> ElementId {
        self.atom.element
    }

    /// Whether the call element is `element` or lies inside it.
    pub fn is_contained_in(&self, element: ElementId) -> bool {
        self.element_path.contains(&element)
    }
}

// =============================================================================
// Atom completion
// =============================================================================

/// Writes the final types of completed atoms into a trace.
pub struct ResolvedAtomCompleter<'a> {
    env: &'a TypeEnvironment,
    substitutor: &'a Substitutor,
}

impl<'a> ResolvedAtomCompleter<'a> {
    pub fn new(env: &'a TypeEnvironment, substitutor: &'a Substitutor) -> Self {
        ResolvedAtomCompleter { env, substitutor }
    }

    /// Complete `atom` and everything below it, children first.
    pub fn complete_all(&self, atom: &ResolvedAtom, trace: &mut dyn Trace) {
        for child in atom.children() {
            self.complete_all(child, trace);
        }
        match atom {
            ResolvedAtom::Call(call) | ResolvedAtom::SubCall(call) => {
                self.complete_resolved_call(call, Vec::new(), trace);
            }
            ResolvedAtom::Lambda(lambda) => {
                self.update_recorded_type(trace, TraceKey::LambdaReturnType(lambda.element));
                self.update_recorded_type(trace, TraceKey::LambdaReceiverType(lambda.element));
                self.update_recorded_type(trace, TraceKey::ExpressionType(lambda.element));
            }
            ResolvedAtom::CallableReference(reference) => {
                self.update_recorded_type(trace, TraceKey::ExpressionType(reference.element));
            }
            ResolvedAtom::Expression { element } => {
                self.update_recorded_type(trace, TraceKey::ExpressionType(*element));
            }
        }
    }

    /// Record the resolved call and its result type.
    pub fn complete_resolved_call(
        &self,
        call: &ResolvedCallAtom,
        diagnostics: Vec<Diagnostic>,
        trace: &mut dyn Trace,
    ) -> ResolvedCallRecord {
        let return_type = self.substitutor.substitute(self.env, call.callee.return_type);
        let record = ResolvedCallRecord {
            call: call.call,
            callee: call.callee.name,
            substitutor: self.substitutor.clone(),
            return_type,
            diagnostics,
        };
        trace!(call = call.call.0, return_type = return_type.0, "resolved call completed");
        trace.record(TraceKey::ResolvedCall(call.call), TraceFact::ResolvedCall(record.clone()));
        trace.record_type(TraceKey::ExpressionType(call.element), return_type);
        record
    }

    /// Substitute a recorded type that still mentions variables or stubs.
    pub fn update_recorded_type(&self, trace: &mut dyn Trace, key: TraceKey) {
        let Some(ty) = trace.get_type(key) else {
            return;
        };
        if should_be_updated(self.env, ty) {
            trace.record_type(key, self.substitutor.substitute(self.env, ty));
        }
    }
}

#[cfg(test)]
#[path = "../tests/atoms_tests.rs"]
mod tests;
