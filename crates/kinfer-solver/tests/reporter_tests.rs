use super::*;
use crate::atoms::CalleeKind;
use crate::substitution::Substitutor;
use crate::trace::BindingTrace;
use crate::types::TypeId;
use kinfer_common::{Atom, DiagnosticCategory};

#[test]
fn test_collecting_reporter_keeps_call_attribution() {
    let mut reporter = CollectingReporter::new();
    let mut trace = BindingTrace::new();
    let record = ResolvedCallRecord {
        call: CallId(2),
        callee: Atom(1),
        substitutor: Substitutor::Empty,
        return_type: TypeId::UNIT,
        diagnostics: Vec::new(),
    };
    let descriptor = CalleeDescriptor::new(Atom(1), CalleeKind::Function, TypeId::UNIT);
    let diagnostic = Diagnostic::error(Some(2), "boom", 1);

    reporter.report_call_diagnostic(&mut trace, CallId(2), &record, &descriptor, vec![diagnostic.clone()]);
    reporter.report_call_diagnostic(&mut trace, CallId(3), &record, &descriptor, Vec::new());

    assert_eq!(reporter.finalized_calls, vec![CallId(2), CallId(3)]);
    assert_eq!(reporter.diagnostics_for(CallId(2)).collect::<Vec<_>>(), vec![&diagnostic]);
    assert_eq!(reporter.diagnostics_for(CallId(3)).count(), 0);
}

#[test]
fn test_inapplicable_call_is_a_warning() {
    let mut reporter = CollectingReporter::new();
    reporter.report_inapplicable_builder_call(CallId(9), "addAll");

    assert!(reporter.has_code(diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL));
    let diagnostic = &reporter.reported[0].diagnostic;
    assert_eq!(diagnostic.category, DiagnosticCategory::Warning);
    assert_eq!(
        diagnostic.message_text,
        "Call 'addAll' is not allowed inside a builder inference lambda"
    );
}
