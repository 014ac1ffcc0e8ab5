use super::*;
use crate::atoms::{CallId, CalleeDescriptor, LambdaAtom};
use crate::bounds::BoundKind;
use crate::env::{VariableAnnotations, VariableOrigin};
use crate::reporter::CollectingReporter;
use crate::trace::BindingTrace;
use kinfer_common::diagnostics::diagnostic_codes;

fn new_var(env: &TypeEnvironment, name: &str) -> TypeVarId {
    kinfer_common::tracing_config::init_tracing();
    env.new_type_variable(name, VariableOrigin::Synthetic, VariableAnnotations::empty())
}

/// The system of the call taking the builder lambda, with `var` postponed.
fn outer_system<'a>(env: &'a TypeEnvironment, vars: &[TypeVarId]) -> ConstraintSystem<'a> {
    let mut system = ConstraintSystem::new(env);
    for &var in vars {
        system.register_variable(var);
        system.mark_postponed_variable(var);
    }
    system
}

fn lambda_atom(element: u32) -> ResolvedAtom {
    ResolvedAtom::Lambda(LambdaAtom {
        element: ElementId(element),
        analyzed: true,
        sub_atoms: Vec::new(),
    })
}

/// `receiver.name(argument)` where the argument flows into `parameter`.
fn member_call(
    env: &TypeEnvironment,
    call: u32,
    name: &str,
    receiver: TypeId,
    argument: TypeId,
    parameter: TypeId,
) -> CallInfo {
    let callee = CalleeDescriptor::new(env.names.intern(name), CalleeKind::Function, TypeId::UNIT)
        .with_dispatch_receiver(receiver);
    let mut atom = ResolvedCallAtom::new(CallId(call), ElementId(call * 10), callee);
    atom.dispatch_receiver = Some(receiver);

    let mut system = ConstraintSystem::new(env);
    system.add_subtype_constraint(argument, parameter, ConstraintPosition::Argument { call: CallId(call) });
    CallInfo::new(atom, system.into_storage())
}

#[test]
fn test_build_list_infers_element_from_added_literal() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let session = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    let stub_e = env.stub_type(e);
    let add = member_call(
        &env,
        2,
        "add",
        env.mutable_list_of(stub_e),
        env.interner.integer_literal(10),
        stub_e,
    );
    assert!(arena.builder_mut(session).add_completed_call_info(add).is_none());

    let mut trace = BindingTrace::new();
    let mut reporter = CollectingReporter::new();
    let inferred = arena.infer_postponed_variables(
        session,
        lambda_atom(1),
        &mut builder,
        CompletionMode::Full,
        &mut trace,
        &mut reporter,
    );

    let inferred = inferred.expect("session had constraints");
    assert_eq!(inferred.get(&e), Some(&env.builtins.int_type));
    assert!(arena.builder(session).are_postponed_variables_inferred());
    assert_eq!(reporter.finalized_calls, vec![CallId(2)]);
    assert!(reporter.reported.is_empty());
    assert_eq!(trace.resolved_call(CallId(2)).map(|record| record.return_type), Some(TypeId::UNIT));
}

#[test]
fn test_session_without_constraints_defers_to_caller() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let session = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    let mut trace = BindingTrace::new();
    trace.record_type(TraceKey::LambdaReturnType(ElementId(1)), TypeId::UNIT);
    let mut reporter = CollectingReporter::new();
    let inferred = arena.infer_postponed_variables(
        session,
        lambda_atom(1),
        &mut builder,
        CompletionMode::Full,
        &mut trace,
        &mut reporter,
    );

    assert!(inferred.is_none());
    assert!(!arena.builder(session).are_postponed_variables_inferred());
    assert!(reporter.finalized_calls.is_empty());
}

#[test]
fn test_nested_session_sees_outer_result_first() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let e1 = new_var(&env, "E1");
    let e2 = new_var(&env, "E2");
    let stub_e1 = env.stub_type(e1);
    let stub_e2 = env.stub_type(e2);

    let mut arena = SessionArena::new(&env);
    let outer = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e1]);
    let inner = arena.new_builder_session(&arena.chain_of(outer), ElementId(2), &[e2]);
    assert_eq!(arena.nested_builder_sessions(outer), vec![inner]);
    assert_eq!(arena.find_parent_builder_session(inner), Some(outer));

    // Inner lambda: `outerList.add(1)` and `innerList.add("x")`.
    let inner_calls = [
        member_call(&env, 3, "add", env.mutable_list_of(stub_e1), b.int_type, stub_e1),
        member_call(&env, 4, "add", env.mutable_list_of(stub_e2), b.string_type, stub_e2),
    ];
    for info in inner_calls {
        assert!(arena.builder_mut(inner).add_completed_call_info(info).is_none());
    }
    arena.builder_mut(inner).add_expression(CapturedExpression::Other(ElementId(40)));
    arena.builder_mut(inner).add_expression(CapturedExpression::Other(ElementId(41)));

    let mut trace = BindingTrace::new();
    trace.record_type(TraceKey::ExpressionType(ElementId(40)), env.list_of(stub_e1));
    trace.record_type(TraceKey::ExpressionType(ElementId(41)), env.list_of(stub_e2));
    let mut reporter = CollectingReporter::new();

    let mut inner_builder = outer_system(&env, &[e2]);
    let inner_result = arena
        .infer_postponed_variables(
            inner,
            lambda_atom(2),
            &mut inner_builder,
            CompletionMode::Full,
            &mut trace,
            &mut reporter,
        )
        .expect("inner session had constraints");
    assert_eq!(inner_result.get(&e2), Some(&b.string_type));
    // Not top level: nothing is rewritten yet.
    assert!(reporter.finalized_calls.is_empty());
    assert_eq!(trace.get_type(TraceKey::ExpressionType(ElementId(40))), Some(env.list_of(stub_e1)));

    // Outer lambda: `outerList.add(number)`.
    let outer_call = member_call(&env, 5, "add", env.mutable_list_of(stub_e1), b.number_type, stub_e1);
    assert!(arena.builder_mut(outer).add_completed_call_info(outer_call).is_none());

    let mut outer_builder = outer_system(&env, &[e1]);
    let outer_result = arena
        .infer_postponed_variables(
            outer,
            lambda_atom(1),
            &mut outer_builder,
            CompletionMode::Full,
            &mut trace,
            &mut reporter,
        )
        .expect("outer session had constraints");

    assert_eq!(outer_result.get(&e1), Some(&b.number_type));
    assert_eq!(reporter.finalized_calls, vec![CallId(5), CallId(3), CallId(4)]);
    assert_eq!(
        trace.get_type(TraceKey::ExpressionType(ElementId(40))),
        Some(env.list_of(b.number_type))
    );
    assert_eq!(
        trace.get_type(TraceKey::ExpressionType(ElementId(41))),
        Some(env.list_of(b.string_type))
    );
}

#[test]
fn test_should_run_completion() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let t = new_var(&env, "T");
    let mut arena = SessionArena::new(&env);
    let session = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);
    let session = arena.builder(session);

    let receiver = env.mutable_list_of(env.stub_type(e));
    let callee = CalleeDescriptor::new(env.names.intern("get"), CalleeKind::Function, env.variable_type(t));
    let mut call = ResolvedCallAtom::new(CallId(2), ElementId(20), callee);

    // Nothing mentions a stub type: completes on its own.
    let mut system = ConstraintSystem::new(&env);
    system.register_variable(t);
    assert!(session.should_run_completion(&system, &call));

    // A stub receiver and a variable without proper constraints: deferred.
    call.dispatch_receiver = Some(receiver);
    assert!(!session.should_run_completion(&system, &call));

    system.add_subtype_constraint(env.builtins.int_type, env.variable_type(t), ConstraintPosition::ExpectedType);
    assert!(session.should_run_completion(&system, &call));
}

#[test]
fn test_skipped_calls_are_handed_back() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);
    let session = arena.builder_mut(id);

    let object = CalleeDescriptor::new(env.names.intern("Companion"), CalleeKind::ObjectValue, TypeId::UNIT);
    let info = CallInfo::new(ResolvedCallAtom::new(CallId(2), ElementId(20), object), ConstraintStorage::default());
    assert!(session.skip_call(&info));
    assert!(!session.write_only_stubs(&info));
    assert!(session.add_completed_call_info(info).is_some());

    let callee = CalleeDescriptor::new(env.names.intern("list"), CalleeKind::Function, TypeId::UNIT);
    let lhs = CallInfo::new(ResolvedCallAtom::new(CallId(3), ElementId(30), callee.clone()), ConstraintStorage::default())
        .in_lhs_of_double_colon();
    assert!(session.add_completed_call_info(lhs).is_some());

    let regular = CallInfo::new(ResolvedCallAtom::new(CallId(4), ElementId(40), callee), ConstraintStorage::default());
    assert!(session.write_only_stubs(&regular));
    assert!(session.add_completed_call_info(regular).is_none());
    assert_eq!(session.common_calls().len(), 1);
}

#[test]
fn test_clear_calls_by_containing_element() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);
    let session = arena.builder_mut(id);

    let callee = CalleeDescriptor::new(env.names.intern("add"), CalleeKind::Function, TypeId::UNIT);
    for (call, enclosing) in [(2, 7), (3, 8)] {
        let info = CallInfo::new(
            ResolvedCallAtom::new(CallId(call), ElementId(call * 10), callee.clone()),
            ConstraintStorage::default(),
        )
        .with_enclosing_elements(&[ElementId(1), ElementId(enclosing)]);
        session.add_completed_call_info(info);
    }

    session.clear_calls_info_by_containing_element(ElementId(7));
    let remaining: Vec<CallId> = session.common_calls().iter().map(|info| info.call).collect();
    assert_eq!(remaining, vec![CallId(3)]);
}

#[test]
fn test_inapplicable_call_is_reported_on_update() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let stub_e = env.stub_type(e);
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    let add = member_call(&env, 2, "add", env.mutable_list_of(stub_e), env.builtins.int_type, stub_e);
    arena.builder_mut(id).add_completed_call_info(add);

    // `list.first()` returns the stub type itself.
    let callee = CalleeDescriptor::new(env.names.intern("first"), CalleeKind::Function, stub_e)
        .with_extension_receiver(env.list_of(stub_e));
    let mut atom = ResolvedCallAtom::new(CallId(3), ElementId(30), callee);
    atom.extension_receiver = Some(env.list_of(stub_e));
    arena
        .builder_mut(id)
        .add_completed_call_info(CallInfo::new(atom, ConstraintStorage::default()));
    assert!(arena.builder(id).has_inapplicable_call());

    let mut trace = BindingTrace::new();
    let mut reporter = CollectingReporter::new();
    arena.infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter);

    assert!(reporter.has_code(diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL));
    assert_eq!(
        reporter.diagnostics_for(CallId(3)).map(|d| d.message_text.as_str()).collect::<Vec<_>>(),
        vec!["Call 'first' is not allowed inside a builder inference lambda"]
    );
}

#[test]
fn test_delegate_sessions_are_transparent() {
    let env = TypeEnvironment::default();
    let e1 = new_var(&env, "E1");
    let e2 = new_var(&env, "E2");
    let mut arena = SessionArena::new(&env);
    let outer = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e1]);
    let delegate = arena.new_delegate_session(&arena.chain_of(outer));
    let inner = arena.new_builder_session(&arena.chain_of(delegate), ElementId(2), &[e2]);

    assert_eq!(arena.len(), 3);
    assert_eq!(arena.nested_builder_sessions(outer), vec![inner]);
    assert_eq!(arena.delegate(delegate).map(|d| d.nested_sessions().to_vec()), Some(vec![inner]));
    assert_eq!(arena.find_all_parent_builder_sessions(inner), vec![outer]);
    assert!(arena.is_top_level_builder_inference_call(outer));
    assert!(!arena.is_top_level_builder_inference_call(inner));

    let map = arena.non_fixed_type_to_variable_map(inner);
    assert_eq!(map.get(&TypeSlot::Stub(e2)), Some(&env.variable_type(e2)));
    assert_eq!(map.get(&TypeSlot::Stub(e1)), Some(&env.variable_type(e1)));
    assert_eq!(arena.builder(inner).get_used_stub_types(), vec![env.stub_type(e2)]);
}

#[test]
fn test_session_chain_folds() {
    let chain = SessionChain::root()
        .push(SessionId(0), SessionKind::Builder)
        .push(SessionId(1), SessionKind::Delegate)
        .push(SessionId(2), SessionKind::Builder);

    assert_eq!(chain.head(), Some((SessionId(2), SessionKind::Builder)));
    assert_eq!(chain.nearest(SessionKind::Delegate), Some(SessionId(1)));
    assert_eq!(chain.all_of_kind(SessionKind::Builder), vec![SessionId(2), SessionId(0)]);
    assert!(SessionChain::root().is_root());
    assert_eq!(SessionChain::root().nearest(SessionKind::Builder), None);
}

#[test]
fn test_expected_type_constraint_maps_stubs_to_variables() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    arena.add_expected_type_constraint(id, CallId(2), env.builtins.string_type, env.stub_type(e));

    let bounds = arena.builder(id).common_system().bounds(e).expect("registered");
    assert_eq!(bounds.len(), 1);
    assert_eq!(bounds.bounds()[0].constraining_type, env.builtins.string_type);
    assert_eq!(
        bounds.bounds()[0].position,
        ConstraintPosition::BuilderInferenceExpectedType { call: CallId(2) }
    );
}

#[test]
#[should_panic(expected = "LOWER constraint shouldn't be used, please use UPPER")]
fn test_integrating_lower_initial_constraint_panics() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut common = ConstraintSystem::new(&env);
    common.register_variable(e);

    let mut storage = ConstraintStorage::default();
    storage.initial_constraints.push(crate::system::InitialConstraint {
        a: env.stub_type(e),
        b: env.builtins.int_type,
        kind: InitialConstraintKind::Lower,
        position: ConstraintPosition::ExpectedType,
    });
    let mut map = IndexMap::new();
    map.insert(TypeSlot::Stub(e), env.variable_type(e));
    integrate_constraints(&mut common, &storage, &Substitutor::by_map(map), false);
}

#[test]
fn test_contradiction_with_outer_constraint_is_reported() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let e = new_var(&env, "E");
    let stub_e = env.stub_type(e);

    // `buildList<E>(...)` where the result must be a `List<String>`.
    let mut builder = outer_system(&env, &[e]);
    builder.add_subtype_constraint(
        env.variable_type(e),
        b.string_type,
        ConstraintPosition::Argument { call: CallId(1) },
    );

    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);
    let add = member_call(&env, 2, "add", env.mutable_list_of(stub_e), b.int_type, stub_e);
    assert!(arena.builder_mut(id).add_completed_call_info(add).is_none());

    let mut trace = BindingTrace::new();
    let mut reporter = CollectingReporter::new();
    arena.infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter);

    assert!(arena.builder(id).common_system().has_contradiction());
    assert_eq!(reporter.finalized_calls, vec![CallId(2)]);
    let codes: Vec<u32> = reporter.diagnostics_for(CallId(2)).map(|d| d.code).collect();
    assert!(codes.contains(&diagnostic_codes::TYPE_MISMATCH_IN_CONSTRAINT));
}

#[test]
fn test_every_finalized_call_sees_the_common_errors() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let e = new_var(&env, "E");
    let stub_e = env.stub_type(e);
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    for (call, argument) in [(2, b.int_type), (3, b.string_type)] {
        let add = member_call(&env, call, "add", env.mutable_list_of(stub_e), argument, stub_e);
        arena.builder_mut(id).add_completed_call_info(add);
    }
    builder.add_subtype_constraint(
        env.variable_type(e),
        b.number_type,
        ConstraintPosition::Argument { call: CallId(1) },
    );

    let mut trace = BindingTrace::new();
    let mut reporter = CollectingReporter::new();
    arena.infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter);

    let errors = arena.builder(id).common_system().errors().len();
    assert!(errors > 0);
    assert_eq!(reporter.diagnostics_for(CallId(2)).count(), errors);
    assert_eq!(reporter.diagnostics_for(CallId(3)).count(), errors);
}

#[test]
fn test_partially_resolved_call_is_integrated_with_its_fixed_variables() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let e = new_var(&env, "E");
    let t = new_var(&env, "T");
    let stub_e = env.stub_type(e);
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    // `consume<T>(list) { ... }` resolved with `T := Int` while its own
    // lambda still waits.
    let mut system = ConstraintSystem::new(&env);
    system.register_variable(t);
    system.add_subtype_constraint(env.variable_type(t), stub_e, ConstraintPosition::Argument { call: CallId(3) });
    system.fix_variable(t, b.int_type, ConstraintPosition::FixVariable { var: t });
    let callee = CalleeDescriptor::new(env.names.intern("consume"), CalleeKind::Function, env.variable_type(t));
    let mut atom = ResolvedCallAtom::new(CallId(3), ElementId(30), callee);
    atom.sub_atoms.push(ResolvedAtom::Lambda(LambdaAtom {
        element: ElementId(31),
        analyzed: true,
        sub_atoms: Vec::new(),
    }));
    arena
        .builder_mut(id)
        .add_partially_resolved_call_info(CallInfo::new(atom, system.into_storage()));
    assert_eq!(arena.builder(id).common_partially_resolved_calls().len(), 1);

    let mut trace = BindingTrace::new();
    trace.record_type(TraceKey::LambdaReturnType(ElementId(31)), env.list_of(stub_e));
    let mut reporter = CollectingReporter::new();
    let inferred = arena
        .infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter)
        .expect("session had constraints");

    assert_eq!(inferred.get(&e), Some(&b.int_type));
    assert_eq!(inferred.get(&t), Some(&b.int_type));
    let reasserted = arena.builder(id).common_system().bounds(t).is_some_and(|bounds| {
        bounds.bounds().iter().any(|bound| {
            bound.kind == BoundKind::Exact
                && bound.constraining_type == b.int_type
                && bound.position == ConstraintPosition::BuilderInference
        })
    });
    assert!(reasserted);

    assert_eq!(reporter.finalized_calls, vec![CallId(3)]);
    assert_eq!(trace.resolved_call(CallId(3)).map(|record| record.return_type), Some(b.int_type));
    assert_eq!(
        trace.get_type(TraceKey::LambdaReturnType(ElementId(31))),
        Some(env.list_of(b.int_type))
    );
}

#[test]
fn test_captured_declarations_are_rewritten() {
    let env = TypeEnvironment::default();
    let b = &env.builtins;
    let e = new_var(&env, "E");
    let stub_e = env.stub_type(e);
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);

    let add = member_call(&env, 2, "add", env.mutable_list_of(stub_e), b.int_type, stub_e);
    arena.builder_mut(id).add_completed_call_info(add);
    for expression in [
        CapturedExpression::Lambda(ElementId(50)),
        CapturedExpression::VariableDeclaration(ElementId(51)),
        CapturedExpression::DoubleColon(ElementId(52)),
        CapturedExpression::DoubleColon(ElementId(53)),
    ] {
        arena.builder_mut(id).add_expression(expression);
    }

    let mut trace = BindingTrace::new();
    trace.record_type(TraceKey::LambdaReturnType(ElementId(50)), env.list_of(stub_e));
    trace.record_type(TraceKey::LambdaReceiverType(ElementId(50)), env.mutable_list_of(stub_e));
    trace.record_type(TraceKey::VariableType(ElementId(51)), stub_e);
    // `this::get` resolved to call 9, and `List::class` with no target.
    trace.record(
        TraceKey::DoubleColonTarget(ElementId(52)),
        TraceFact::DoubleColon(DoubleColonExpression::CallableReference {
            target_call: Some(CallId(9)),
        }),
    );
    trace.record(
        TraceKey::DoubleColonTarget(ElementId(53)),
        TraceFact::DoubleColon(DoubleColonExpression::ClassLiteral { target_call: None }),
    );
    trace.record(
        TraceKey::ResolvedCall(CallId(9)),
        TraceFact::ResolvedCall(ResolvedCallRecord {
            call: CallId(9),
            callee: env.names.intern("get"),
            substitutor: Substitutor::default(),
            return_type: stub_e,
            diagnostics: Vec::new(),
        }),
    );

    let mut reporter = CollectingReporter::new();
    arena.infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter);

    assert_eq!(
        trace.get_type(TraceKey::LambdaReturnType(ElementId(50))),
        Some(env.list_of(b.int_type))
    );
    assert_eq!(
        trace.get_type(TraceKey::LambdaReceiverType(ElementId(50))),
        Some(env.mutable_list_of(b.int_type))
    );
    assert_eq!(trace.get_type(TraceKey::VariableType(ElementId(51))), Some(b.int_type));
    let target = trace.resolved_call(CallId(9)).expect("target call recorded");
    assert_eq!(target.return_type, b.int_type);
    assert_eq!(target.substitutor.substitute(&env, stub_e), b.int_type);
}

#[test]
#[should_panic(expected = "Unsupported double colon expression")]
fn test_unknown_double_colon_form_panics() {
    let env = TypeEnvironment::default();
    let e = new_var(&env, "E");
    let mut builder = outer_system(&env, &[e]);
    let mut arena = SessionArena::new(&env);
    let id = arena.new_builder_session(&SessionChain::root(), ElementId(1), &[e]);
    arena.builder_mut(id).add_expression(CapturedExpression::DoubleColon(ElementId(52)));

    let mut trace = BindingTrace::new();
    trace.record(
        TraceKey::DoubleColonTarget(ElementId(52)),
        TraceFact::DoubleColon(DoubleColonExpression::Other),
    );
    let mut reporter = CollectingReporter::new();
    arena.infer_postponed_variables(id, lambda_atom(1), &mut builder, CompletionMode::Full, &mut trace, &mut reporter);
}
