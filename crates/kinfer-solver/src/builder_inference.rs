//! Builder inference sessions.
//!
//! When a lambda argument's receiver type depends on type variables that can
//! only be inferred from the lambda body (`buildList { add(1) }`), the body is
//! analyzed against *stub types* standing in for those variables. Calls on
//! stub-typed receivers are captured by a [`BuilderInferenceSession`] instead
//! of being finalized.
//!
//! Once the outer call is ready to infer its postponed variables the session:
//!
//! 1. builds a common constraint system from the outer storage and every
//!    captured call's storage, mapping stub types back to their variables
//! 2. completes that system
//! 3. if it is the outermost builder session, rewrites every captured call,
//!    expression and lambda with the result, then does the same for nested
//!    sessions with the outer substitution applied first
//!
//! Sessions live in a [`SessionArena`] and refer to each other by
//! [`SessionId`]. Ancestry is an immutable [`SessionChain`] handed to a
//! session when it is created.

use crate::atoms::{CallInfo, CalleeKind, ElementId, ResolvedAtom, ResolvedAtomCompleter, ResolvedCallAtom};
use crate::bounds::ConstraintPosition;
use crate::completion::{CompletionMode, ConstraintSystemCompleter, VariableFixationFinder};
use crate::env::TypeEnvironment;
use crate::errors::ConstraintSystemError;
use crate::reporter::DiagnosticsReporter;
use crate::substitution::{Substitutor, TypeSlot};
use crate::system::{ConstraintStorage, ConstraintSystem, InitialConstraintKind, VariableMap};
use crate::trace::{DoubleColonExpression, ResolvedCallRecord, Trace, TraceFact, TraceKey};
use crate::types::{TypeId, TypeVarId};
use crate::visitor::should_be_updated;
use indexmap::IndexMap;
use kinfer_common::{Atom, Diagnostic};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Builder,
    /// Groups the builder sessions started while resolving a property delegate.
    Delegate,
}

// =============================================================================
// SessionChain
// =============================================================================

#[derive(Debug)]
struct ChainLink {
    id: SessionId,
    kind: SessionKind,
    parent: SessionChain,
}

/// Immutable list of enclosing sessions, innermost first.
#[derive(Clone, Debug, Default)]
pub struct SessionChain(Option<Arc<ChainLink>>);

impl SessionChain {
    /// The chain outside of any session.
    pub fn root() -> Self {
        SessionChain(None)
    }

    pub fn push(&self, id: SessionId, kind: SessionKind) -> SessionChain {
        SessionChain(Some(Arc::new(ChainLink {
            id,
            kind,
            parent: self.clone(),
        })))
    }

    pub fn head(&self) -> Option<(SessionId, SessionKind)> {
        self.0.as_ref().map(|link| (link.id, link.kind))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SessionId, SessionKind)> + '_ {
        let mut current = self.0.as_deref();
        std::iter::from_fn(move || {
            let link = current?;
            current = link.parent.0.as_deref();
            Some((link.id, link.kind))
        })
    }

    pub fn nearest(&self, kind: SessionKind) -> Option<SessionId> {
        self.iter().find(|&(_, k)| k == kind).map(|(id, _)| id)
    }

    /// Every enclosing session of `kind`, innermost first.
    pub fn all_of_kind(&self, kind: SessionKind) -> Vec<SessionId> {
        self.iter().filter(|&(_, k)| k == kind).map(|(id, _)| id).collect()
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// An expression whose recorded types a session rewrites.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CapturedExpression {
    Lambda(ElementId),
    VariableDeclaration(ElementId),
    DoubleColon(ElementId),
    Other(ElementId),
}

impl CapturedExpression {
    pub fn element(self) -> ElementId {
        match self {
            CapturedExpression::Lambda(element)
            | CapturedExpression::VariableDeclaration(element)
            | CapturedExpression::DoubleColon(element)
            | CapturedExpression::Other(element) => element,
        }
    }
}

pub struct BuilderInferenceSession<'a> {
    id: SessionId,
    parent: SessionChain,
    lambda_argument: ElementId,
    lambda: Option<ResolvedAtom>,
    /// Postponed variable to its stub type, in registration order.
    stubs_for_postponed_variables: VariableMap<TypeId>,
    common_system: ConstraintSystem<'a>,
    common_calls: Vec<CallInfo>,
    common_partially_resolved_calls: Vec<CallInfo>,
    common_expressions: Vec<CapturedExpression>,
    nested: Vec<SessionId>,
    inapplicable_calls: Vec<(crate::atoms::CallId, Atom)>,
}

impl<'a> BuilderInferenceSession<'a> {
    fn new(
        env: &'a TypeEnvironment,
        id: SessionId,
        parent: SessionChain,
        lambda_argument: ElementId,
        postponed_variables: &[TypeVarId],
    ) -> Self {
        let mut common_system = ConstraintSystem::new(env);
        let mut stubs_for_postponed_variables = VariableMap::default();
        for &var in postponed_variables {
            common_system.register_variable(var);
            stubs_for_postponed_variables.insert(var, env.stub_type(var));
        }
        BuilderInferenceSession {
            id,
            parent,
            lambda_argument,
            lambda: None,
            stubs_for_postponed_variables,
            common_system,
            common_calls: Vec::new(),
            common_partially_resolved_calls: Vec::new(),
            common_expressions: Vec::new(),
            nested: Vec::new(),
            inapplicable_calls: Vec::new(),
        }
    }

    fn env(&self) -> &'a TypeEnvironment {
        self.common_system.env()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn lambda_argument(&self) -> ElementId {
        self.lambda_argument
    }

    pub fn common_system(&self) -> &ConstraintSystem<'a> {
        &self.common_system
    }

    pub fn common_calls(&self) -> &[CallInfo] {
        &self.common_calls
    }

    pub fn common_partially_resolved_calls(&self) -> &[CallInfo] {
        &self.common_partially_resolved_calls
    }

    /// Whether the candidate's own system should be completed now instead
    /// of deferring to the session.
    pub fn should_run_completion(&self, system: &ConstraintSystem<'_>, call: &ResolvedCallAtom) -> bool {
        if system.has_contradiction() {
            return true;
        }
        if !call.is_suitable_for_builder_inference(self.env()) {
            return true;
        }
        let every_variable_ready = system.not_fixed_type_variables().all(|var| {
            system.postponed_type_variables().contains(&var)
                || VariableFixationFinder::has_proper_constraint(system, var)
        });
        every_variable_ready || call.sub_atoms.iter().any(ResolvedAtom::has_postponed)
    }

    /// Capture a completed call. A call that is not captured is handed back
    /// so the caller can finalize it right away.
    pub fn add_completed_call_info(&mut self, info: CallInfo) -> Option<CallInfo> {
        if self.skip_call(&info) {
            trace!(call = info.call.0, "call skipped by builder inference");
            return Some(info);
        }
        let env = self.env();
        let resulting = info
            .atom
            .callee
            .substitute(env, &info.storage.build_current_substitutor());
        let check_call = resulting.kind == CalleeKind::LocalVariable || resulting.any_receiver_contains_stub(env);
        if check_call && !resulting.is_applicable_for_builder_inference(env) {
            debug!(call = info.call.0, "inapplicable call inside builder inference lambda");
            self.inapplicable_calls.push((info.call, resulting.name));
        }
        self.common_calls.push(info);
        None
    }

    pub fn add_partially_resolved_call_info(&mut self, info: CallInfo) {
        self.common_partially_resolved_calls.push(info);
    }

    pub fn add_expression(&mut self, expression: CapturedExpression) {
        self.common_expressions.push(expression);
    }

    pub fn has_inapplicable_call(&self) -> bool {
        !self.inapplicable_calls.is_empty()
    }

    /// Whether the call should only get placeholder types for now.
    pub fn write_only_stubs(&self, info: &CallInfo) -> bool {
        !self.skip_call(info) && !self.are_postponed_variables_inferred()
    }

    /// Calls that cannot contribute to inference: object values, and calls
    /// on the left of `::` whose temporary trace is never committed.
    pub fn skip_call(&self, info: &CallInfo) -> bool {
        info.atom.callee.kind == CalleeKind::ObjectValue || info.is_lhs_of_double_colon
    }

    /// Forget the captured calls that lie inside `element`.
    pub fn clear_calls_info_by_containing_element(&mut self, element: ElementId) {
        let before = self.common_calls.len();
        self.common_calls.retain(|info| !info.is_contained_in(element));
        debug!(
            element = element.0,
            removed = before - self.common_calls.len(),
            "cleared captured calls"
        );
    }

    pub fn get_current_substitutor(&self) -> Substitutor {
        self.common_system.build_current_substitutor()
    }

    pub fn get_used_stub_types(&self) -> Vec<TypeId> {
        self.stubs_for_postponed_variables.values().copied().collect()
    }

    pub fn are_postponed_variables_inferred(&self) -> bool {
        self.common_system.not_fixed_type_variables().next().is_none()
    }

    pub fn nested_sessions(&self) -> &[SessionId] {
        &self.nested
    }

    pub fn parent_chain(&self) -> &SessionChain {
        &self.parent
    }

    pub fn add_expected_type_constraint(
        &mut self,
        call: crate::atoms::CallId,
        a: TypeId,
        b: TypeId,
        non_fixed_to_variables: &Substitutor,
    ) {
        let env = self.env();
        let current = self.common_system.build_current_substitutor();
        let lower = current.substitute(env, non_fixed_to_variables.substitute(env, a));
        let upper = current.substitute(env, non_fixed_to_variables.substitute(env, b));
        self.common_system.add_subtype_constraint(
            lower,
            upper,
            ConstraintPosition::BuilderInferenceExpectedType { call },
        );
    }

    /// Integrate the outer storage and every captured call into the common
    /// system. Returns whether the result carries no constraint at all.
    fn initialize_common_system(
        &mut self,
        initial_storage: &ConstraintStorage,
        parent_stubs: &[(TypeVarId, TypeId)],
        non_fixed_to_variables: &Substitutor,
    ) -> bool {
        for &(var, stub) in parent_stubs {
            let variable_type = self.env().variable_type(var);
            self.common_system.register_variable_if_not_present(var);
            self.common_system
                .add_subtype_constraint(variable_type, stub, ConstraintPosition::InjectedAnotherStubType);
        }

        integrate_constraints(&mut self.common_system, initial_storage, non_fixed_to_variables, false);
        for info in &self.common_calls {
            integrate_constraints(&mut self.common_system, &info.storage, non_fixed_to_variables, false);
        }
        for info in &self.common_partially_resolved_calls {
            integrate_constraints(&mut self.common_system, &info.storage, non_fixed_to_variables, true);
        }

        let system = &self.common_system;
        system
            .not_fixed_type_variables()
            .all(|var| system.bounds(var).is_none_or(|bounds| bounds.is_empty()))
    }
}

/// Replay `storage`'s constraints into `common`, with stub types mapped back
/// to their variables.
fn integrate_constraints(
    common: &mut ConstraintSystem<'_>,
    storage: &ConstraintStorage,
    non_fixed_to_variables: &Substitutor,
    integrate_fixed_variables: bool,
) {
    let env = common.env();
    for &var in storage.not_fixed_type_variables.keys() {
        common.register_variable_if_not_present(var);
    }

    let call_substitutor = storage.build_resulting_substitutor(false);
    for initial in &storage.initial_constraints {
        if initial.position == ConstraintPosition::BuilderInference {
            continue;
        }
        let substituted = initial.substitute(env, &call_substitutor);
        let lower = non_fixed_to_variables.substitute(env, substituted.a);
        let upper = non_fixed_to_variables.substitute(env, substituted.b);
        if common.is_proper_type(lower) && common.is_proper_type(upper) {
            continue;
        }
        match initial.kind {
            InitialConstraintKind::Lower => panic!("LOWER constraint shouldn't be used, please use UPPER"),
            InitialConstraintKind::Upper => common.add_subtype_constraint(lower, upper, substituted.position),
            InitialConstraintKind::Equality => {
                common.add_subtype_constraint(lower, upper, substituted.position.clone());
                common.add_subtype_constraint(upper, lower, substituted.position);
            }
        }
    }

    if integrate_fixed_variables {
        for (&var, &ty) in &storage.fixed_type_variables {
            common.register_variable_if_not_present(var);
            common.add_equality_constraint(env.variable_type(var), ty, ConstraintPosition::BuilderInference);
        }
    }
}

/// Groups nested builder sessions started under a property delegate.
#[derive(Clone, Debug)]
pub struct DelegateInferenceSession {
    id: SessionId,
    parent: SessionChain,
    nested: Vec<SessionId>,
}

impl DelegateInferenceSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn parent_chain(&self) -> &SessionChain {
        &self.parent
    }

    pub fn nested_sessions(&self) -> &[SessionId] {
        &self.nested
    }
}

pub enum InferenceSession<'a> {
    Builder(BuilderInferenceSession<'a>),
    Delegate(DelegateInferenceSession),
}

impl InferenceSession<'_> {
    fn kind(&self) -> SessionKind {
        match self {
            InferenceSession::Builder(_) => SessionKind::Builder,
            InferenceSession::Delegate(_) => SessionKind::Delegate,
        }
    }

    fn parent(&self) -> &SessionChain {
        match self {
            InferenceSession::Builder(session) => &session.parent,
            InferenceSession::Delegate(session) => &session.parent,
        }
    }

    fn nested_mut(&mut self) -> &mut Vec<SessionId> {
        match self {
            InferenceSession::Builder(session) => &mut session.nested,
            InferenceSession::Delegate(session) => &mut session.nested,
        }
    }
}

// =============================================================================
// SessionArena
// =============================================================================

pub struct SessionArena<'a> {
    env: &'a TypeEnvironment,
    sessions: Vec<InferenceSession<'a>>,
}

impl<'a> SessionArena<'a> {
    pub fn new(env: &'a TypeEnvironment) -> Self {
        SessionArena {
            env,
            sessions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start a builder session for `lambda_argument`, whose body will be
    /// analyzed against stub types of `postponed_variables`.
    pub fn new_builder_session(
        &mut self,
        parent: &SessionChain,
        lambda_argument: ElementId,
        postponed_variables: &[TypeVarId],
    ) -> SessionId {
        let id = self.next_id();
        let session = BuilderInferenceSession::new(self.env, id, parent.clone(), lambda_argument, postponed_variables);
        self.insert(parent, InferenceSession::Builder(session));
        debug!(
            session = id.0,
            lambda = lambda_argument.0,
            variables = postponed_variables.len(),
            "builder inference session started"
        );
        id
    }

    pub fn new_delegate_session(&mut self, parent: &SessionChain) -> SessionId {
        let id = self.next_id();
        let session = DelegateInferenceSession {
            id,
            parent: parent.clone(),
            nested: Vec::new(),
        };
        self.insert(parent, InferenceSession::Delegate(session));
        id
    }

    fn next_id(&self) -> SessionId {
        SessionId(self.sessions.len() as u32)
    }

    fn insert(&mut self, parent: &SessionChain, session: InferenceSession<'a>) {
        let id = self.next_id();
        if let Some((parent_id, _)) = parent.head() {
            self.session_mut(parent_id).nested_mut().push(id);
        }
        self.sessions.push(session);
    }

    fn session(&self, id: SessionId) -> &InferenceSession<'a> {
        &self.sessions[id.0 as usize]
    }

    fn session_mut(&mut self, id: SessionId) -> &mut InferenceSession<'a> {
        &mut self.sessions[id.0 as usize]
    }

    /// The chain a session's children are created with.
    pub fn chain_of(&self, id: SessionId) -> SessionChain {
        let session = self.session(id);
        session.parent().push(id, session.kind())
    }

    pub fn builder(&self, id: SessionId) -> &BuilderInferenceSession<'a> {
        match self.session(id) {
            InferenceSession::Builder(session) => session,
            InferenceSession::Delegate(_) => panic!("session {id:?} is not a builder inference session"),
        }
    }

    pub fn builder_mut(&mut self, id: SessionId) -> &mut BuilderInferenceSession<'a> {
        match self.session_mut(id) {
            InferenceSession::Builder(session) => session,
            InferenceSession::Delegate(_) => panic!("session {id:?} is not a builder inference session"),
        }
    }

    pub fn delegate(&self, id: SessionId) -> Option<&DelegateInferenceSession> {
        match self.session(id) {
            InferenceSession::Delegate(session) => Some(session),
            InferenceSession::Builder(_) => None,
        }
    }

    pub fn find_parent_builder_session(&self, id: SessionId) -> Option<SessionId> {
        self.session(id).parent().nearest(SessionKind::Builder)
    }

    /// Enclosing builder sessions, innermost first.
    pub fn find_all_parent_builder_sessions(&self, id: SessionId) -> Vec<SessionId> {
        self.session(id).parent().all_of_kind(SessionKind::Builder)
    }

    pub fn is_top_level_builder_inference_call(&self, id: SessionId) -> bool {
        self.find_parent_builder_session(id).is_none()
    }

    /// Directly nested builder sessions, looking through delegate sessions.
    pub fn nested_builder_sessions(&self, id: SessionId) -> Vec<SessionId> {
        let nested = match self.session(id) {
            InferenceSession::Builder(session) => &session.nested,
            InferenceSession::Delegate(session) => &session.nested,
        };
        let mut result = Vec::new();
        for &child in nested {
            match self.session(child) {
                InferenceSession::Builder(_) => result.push(child),
                InferenceSession::Delegate(_) => result.extend(self.nested_builder_sessions(child)),
            }
        }
        result
    }

    /// Stub types of `id` and of every enclosing builder session, mapped to
    /// their variables.
    pub fn non_fixed_type_to_variable_map(&self, id: SessionId) -> IndexMap<TypeSlot, TypeId> {
        let mut bindings = IndexMap::new();
        for &var in self.builder(id).stubs_for_postponed_variables.keys() {
            bindings.insert(TypeSlot::Stub(var), self.env.variable_type(var));
        }
        if let Some(parent) = self.find_parent_builder_session(id) {
            bindings.extend(self.non_fixed_type_to_variable_map(parent));
        }
        bindings
    }

    pub fn non_fixed_type_to_variable_substitutor(&self, id: SessionId) -> Substitutor {
        Substitutor::by_map(self.non_fixed_type_to_variable_map(id))
    }

    /// Stub types to the types the common system inferred so far.
    pub fn get_not_fixed_to_inferred_types_substitutor(&self, id: SessionId) -> Substitutor {
        Substitutor::compose(
            self.builder(id).get_current_substitutor(),
            self.non_fixed_type_to_variable_substitutor(id),
        )
    }

    pub fn add_expected_type_constraint(&mut self, id: SessionId, call: crate::atoms::CallId, a: TypeId, b: TypeId) {
        let non_fixed = self.non_fixed_type_to_variable_substitutor(id);
        self.builder_mut(id).add_expected_type_constraint(call, a, b, &non_fixed);
    }

    /// Infer the session's postponed variables from everything it captured.
    ///
    /// Returns `None` when the session had nothing to contribute and the
    /// decision is left to the enclosing session.
    pub fn infer_postponed_variables(
        &mut self,
        id: SessionId,
        lambda: ResolvedAtom,
        builder: &mut ConstraintSystem<'_>,
        mode: CompletionMode,
        trace: &mut dyn Trace,
        reporter: &mut dyn DiagnosticsReporter,
    ) -> Option<VariableMap<TypeId>> {
        let initial_storage = builder.current_storage().clone();
        let non_fixed_to_variables = self.non_fixed_type_to_variable_substitutor(id);
        let parent_stubs: Vec<(TypeVarId, TypeId)> = self
            .find_all_parent_builder_sessions(id)
            .into_iter()
            .flat_map(|parent| {
                self.builder(parent)
                    .stubs_for_postponed_variables
                    .iter()
                    .map(|(&var, &stub)| (var, stub))
                    .collect::<Vec<_>>()
            })
            .collect();
        let top_level = self.is_top_level_builder_inference_call(id);

        let session = self.builder_mut(id);
        session.lambda = Some(lambda);
        let effectively_empty =
            session.initialize_common_system(&initial_storage, &parent_stubs, &non_fixed_to_variables);
        debug!(
            session = id.0,
            calls = session.common_calls.len(),
            partial_calls = session.common_partially_resolved_calls.len(),
            effectively_empty,
            "common system initialized"
        );

        if effectively_empty {
            if top_level {
                let resulting = Self::resulting_substitutor(&initial_storage, self.builder(id));
                self.update_all_calls(id, resulting, trace, reporter);
            }
            return None;
        }

        let atoms: Vec<&ResolvedCallAtom> = session
            .common_partially_resolved_calls
            .iter()
            .map(|info| &info.atom)
            .collect();
        ConstraintSystemCompleter::complete_calls(&mut session.common_system, mode, &atoms);
        let resulting = Self::resulting_substitutor(&initial_storage, self.builder(id));

        if mode == CompletionMode::Full {
            builder.substitute_fixed_variables(&Substitutor::compose(
                resulting.clone(),
                non_fixed_to_variables,
            ));
        }

        if top_level {
            self.update_all_calls(id, resulting, trace, reporter);
        }

        Some(self.builder(id).common_system.fixed_type_variables().clone())
    }

    fn resulting_substitutor(initial_storage: &ConstraintStorage, session: &BuilderInferenceSession<'_>) -> Substitutor {
        Substitutor::compose(
            initial_storage.build_resulting_substitutor(false),
            session.common_system.build_current_substitutor(),
        )
    }

    /// Rewrite this session's captured work with `substitutor`, then every
    /// nested session with the outer substitution applied first.
    pub fn update_all_calls(
        &mut self,
        id: SessionId,
        substitutor: Substitutor,
        trace: &mut dyn Trace,
        reporter: &mut dyn DiagnosticsReporter,
    ) {
        self.update_calls(id, &substitutor, trace, reporter);

        for nested in self.nested_builder_sessions(id) {
            let nested_substitutor =
                Substitutor::compose(self.builder(nested).get_current_substitutor(), substitutor.clone());
            self.update_all_calls(nested, nested_substitutor, trace, reporter);
        }
    }

    fn update_calls(
        &mut self,
        id: SessionId,
        substitutor: &Substitutor,
        trace: &mut dyn Trace,
        reporter: &mut dyn DiagnosticsReporter,
    ) {
        let env = self.env;
        let non_fixed_to_variables = self.non_fixed_type_to_variable_map(id);
        let non_fixed_types_to_result: IndexMap<TypeSlot, TypeId> = non_fixed_to_variables
            .iter()
            .map(|(&slot, &ty)| (slot, substitutor.substitute(env, ty)))
            .collect();
        let to_result = Substitutor::compose(substitutor.clone(), Substitutor::by_map(non_fixed_to_variables));

        let session = self.builder_mut(id);
        let errors = session.common_system.errors().to_vec();
        debug!(
            session = id.0,
            calls = session.common_calls.len(),
            expressions = session.common_expressions.len(),
            errors = errors.len(),
            "updating captured calls"
        );

        for &expression in &session.common_expressions {
            update_expression_descriptor_and_type(env, expression, &to_result, trace);
        }

        for info in &mut session.common_calls {
            let call_substitutor = resulting_call_substitutor(env, &info.storage, &to_result, &non_fixed_types_to_result);
            let completer = ResolvedAtomCompleter::new(env, &call_substitutor);
            let record = complete_call(info, &completer, trace);
            report_errors(env, info, &record, &errors, reporter, trace);
        }

        let completer = ResolvedAtomCompleter::new(env, &to_result);
        for info in &mut session.common_partially_resolved_calls {
            let record = complete_call(info, &completer, trace);
            report_errors(env, info, &record, &errors, reporter, trace);
        }

        for (call, name) in &session.inapplicable_calls {
            reporter.report_inapplicable_builder_call(*call, &env.names.resolve(*name));
        }

        if let Some(lambda) = &session.lambda {
            completer.complete_all(lambda, trace);
        }
    }
}

// =============================================================================
// Rewriting
// =============================================================================

/// The call's own fixed variables with stub types resolved, plus the
/// session's stub types mapped to their results.
fn resulting_call_substitutor(
    env: &TypeEnvironment,
    storage: &ConstraintStorage,
    to_result: &Substitutor,
    non_fixed_types_to_result: &IndexMap<TypeSlot, TypeId>,
) -> Substitutor {
    let mut map: IndexMap<TypeSlot, TypeId> = storage
        .fixed_type_variables
        .iter()
        .map(|(&var, &ty)| (TypeSlot::Variable(var), to_result.substitute(env, ty)))
        .collect();
    map.extend(non_fixed_types_to_result.iter().map(|(&slot, &ty)| (slot, ty)));
    Substitutor::by_map(map)
}

/// Finalize one captured call: its buffered trace goes to `trace` first, so
/// the completed types recorded afterwards win.
fn complete_call(info: &mut CallInfo, completer: &ResolvedAtomCompleter<'_>, trace: &mut dyn Trace) -> ResolvedCallRecord {
    info.trace.commit(trace);
    for atom in &info.atom.sub_atoms {
        completer.complete_all(atom, trace);
    }
    completer.complete_resolved_call(&info.atom, info.diagnostics.clone(), trace)
}

fn update_expression_descriptor_and_type(
    env: &TypeEnvironment,
    expression: CapturedExpression,
    substitutor: &Substitutor,
    trace: &mut dyn Trace,
) {
    let element = expression.element();
    if let Some(ty) = trace.get_type(TraceKey::ExpressionType(element)) {
        trace.record_type(TraceKey::ExpressionType(element), substitutor.substitute(env, ty));
    }

    match expression {
        CapturedExpression::Lambda(element) => {
            update_descriptor_type(env, TraceKey::LambdaReturnType(element), substitutor, trace);
            update_descriptor_type(env, TraceKey::LambdaReceiverType(element), substitutor, trace);
        }
        CapturedExpression::VariableDeclaration(element) => {
            update_descriptor_type(env, TraceKey::VariableType(element), substitutor, trace);
        }
        CapturedExpression::DoubleColon(element) => {
            complete_double_colon_expression(env, element, substitutor, trace);
        }
        CapturedExpression::Other(_) => {}
    }
}

fn update_descriptor_type(env: &TypeEnvironment, key: TraceKey, substitutor: &Substitutor, trace: &mut dyn Trace) {
    if let Some(ty) = trace.get_type(key) {
        if should_be_updated(env, ty) {
            trace.record_type(key, substitutor.substitute(env, ty));
        }
    }
}

fn complete_double_colon_expression(
    env: &TypeEnvironment,
    element: ElementId,
    substitutor: &Substitutor,
    trace: &mut dyn Trace,
) {
    let target_call = match trace.double_colon(element) {
        None => return,
        Some(DoubleColonExpression::CallableReference { target_call })
        | Some(DoubleColonExpression::ClassLiteral { target_call }) => *target_call,
        Some(DoubleColonExpression::Other) => panic!("Unsupported double colon expression"),
    };
    let Some(call) = target_call else {
        return;
    };
    let Some(record) = trace.resolved_call(call) else {
        return;
    };
    if !should_be_updated(env, record.return_type) {
        return;
    }
    let mut record = record.clone();
    record.return_type = substitutor.substitute(env, record.return_type);
    record.substitutor = Substitutor::compose(substitutor.clone(), record.substitutor);
    trace!(call = call.0, "double colon target rewritten");
    trace.record(TraceKey::ResolvedCall(call), TraceFact::ResolvedCall(record));
}

fn report_errors(
    env: &TypeEnvironment,
    info: &CallInfo,
    record: &ResolvedCallRecord,
    errors: &[ConstraintSystemError],
    reporter: &mut dyn DiagnosticsReporter,
    trace: &mut dyn Trace,
) {
    let diagnostics: Vec<Diagnostic> = errors
        .iter()
        .map(|error| error.to_diagnostic(env, Some(info.call.0)))
        .collect();
    reporter.report_call_diagnostic(trace, info.call, record, &info.atom.callee, diagnostics);
}

#[cfg(test)]
#[path = "../tests/builder_inference_tests.rs"]
mod tests;
