//! Binding traces.
//!
//! A trace is the key to fact store that resolution writes its results into:
//! expression types, declared variable types, lambda signatures and resolved
//! calls. A [`TemporaryTrace`] buffers the writes of one speculative call and
//! pushes them into a parent trace only when the call is committed.

use crate::atoms::{CallId, ElementId};
use crate::substitution::Substitutor;
use crate::types::TypeId;
use indexmap::IndexMap;
use kinfer_common::{Atom, Diagnostic};
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TraceKey {
    ExpressionType(ElementId),
    VariableType(ElementId),
    LambdaReturnType(ElementId),
    LambdaReceiverType(ElementId),
    ResolvedCall(CallId),
    DoubleColonTarget(ElementId),
}

/// A fully completed call as recorded in a trace.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCallRecord {
    pub call: CallId,
    pub callee: Atom,
    /// Maps the callee's type variables to their inferred types.
    pub substitutor: Substitutor,
    pub return_type: TypeId,
    pub diagnostics: Vec<Diagnostic>,
}

/// The shape of a `::` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DoubleColonExpression {
    /// `receiver::member`
    CallableReference { target_call: Option<CallId> },
    /// `Receiver::class`
    ClassLiteral { target_call: Option<CallId> },
    /// Any other `::` form the frontend may produce.
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceFact {
    Type(TypeId),
    ResolvedCall(ResolvedCallRecord),
    DoubleColon(DoubleColonExpression),
}

type FactMap = IndexMap<TraceKey, TraceFact, FxBuildHasher>;

/// Read/write access shared by permanent and temporary traces.
pub trait Trace {
    fn record(&mut self, key: TraceKey, fact: TraceFact);

    fn get(&self, key: TraceKey) -> Option<&TraceFact>;

    fn record_type(&mut self, key: TraceKey, ty: TypeId) {
        self.record(key, TraceFact::Type(ty));
    }

    fn get_type(&self, key: TraceKey) -> Option<TypeId> {
        match self.get(key) {
            Some(TraceFact::Type(ty)) => Some(*ty),
            _ => None,
        }
    }

    fn resolved_call(&self, call: CallId) -> Option<&ResolvedCallRecord> {
        match self.get(TraceKey::ResolvedCall(call)) {
            Some(TraceFact::ResolvedCall(record)) => Some(record),
            _ => None,
        }
    }

    fn double_colon(&self, element: ElementId) -> Option<&DoubleColonExpression> {
        match self.get(TraceKey::DoubleColonTarget(element)) {
            Some(TraceFact::DoubleColon(expression)) => Some(expression),
            _ => None,
        }
    }
}

// =============================================================================
// BindingTrace
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct BindingTrace {
    facts: FactMap,
}

impl BindingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = TraceKey> + '_ {
        self.facts.keys().copied()
    }
}

impl Trace for BindingTrace {
    fn record(&mut self, key: TraceKey, fact: TraceFact) {
        trace!(?key, "trace record");
        self.facts.insert(key, fact);
    }

    fn get(&self, key: TraceKey) -> Option<&TraceFact> {
        self.facts.get(&key)
    }
}

// =============================================================================
// TemporaryTrace
// =============================================================================

/// Buffered writes of one call. Dropping an uncommitted trace discards them.
#[derive(Debug, Default)]
pub struct TemporaryTrace {
    name: &'static str,
    facts: FactMap,
}

impl TemporaryTrace {
    pub fn new(name: &'static str) -> Self {
        TemporaryTrace {
            name,
            facts: FactMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Push every buffered fact into `parent`, in write order.
    pub fn commit(&mut self, parent: &mut dyn Trace) {
        let facts = std::mem::take(&mut self.facts);
        debug!(trace = self.name, facts = facts.len(), "temporary trace committed");
        for (key, fact) in facts {
            parent.record(key, fact);
        }
    }
}

impl Trace for TemporaryTrace {
    fn record(&mut self, key: TraceKey, fact: TraceFact) {
        self.facts.insert(key, fact);
    }

    fn get(&self, key: TraceKey) -> Option<&TraceFact> {
        self.facts.get(&key)
    }
}

impl Drop for TemporaryTrace {
    fn drop(&mut self) {
        if !self.facts.is_empty() {
            debug!(trace = self.name, facts = self.facts.len(), "temporary trace discarded");
        }
    }
}

#[cfg(test)]
#[path = "../tests/trace_tests.rs"]
mod tests;
