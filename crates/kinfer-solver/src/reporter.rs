//! The seam through which finalized calls surface their diagnostics.

use crate::atoms::{CallId, CalleeDescriptor};
use crate::trace::{ResolvedCallRecord, Trace};
use kinfer_common::Diagnostic;
use kinfer_common::diagnostics::diagnostic_codes;
use tracing::debug;

pub trait DiagnosticsReporter {
    /// Called once per finalized call with the diagnostics of its system.
    fn report_call_diagnostic(
        &mut self,
        trace: &mut dyn Trace,
        call: CallId,
        resolved_call: &ResolvedCallRecord,
        descriptor: &CalleeDescriptor,
        diagnostics: Vec<Diagnostic>,
    );

    /// A call inside a builder inference lambda resolved to a descriptor
    /// that is not allowed there.
    fn report_inapplicable_builder_call(&mut self, call: CallId, callee_name: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportedDiagnostic {
    pub call: CallId,
    pub diagnostic: Diagnostic,
}

/// Keeps everything in memory, in report order.
#[derive(Clone, Debug, Default)]
pub struct CollectingReporter {
    pub reported: Vec<ReportedDiagnostic>,
    /// Calls that were finalized, including those without diagnostics.
    pub finalized_calls: Vec<CallId>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics_for(&self, call: CallId) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.reported
            .iter()
            .filter(move |reported| reported.call == call)
            .map(|reported| &reported.diagnostic)
    }

    pub fn has_code(&self, code: u32) -> bool {
        self.reported.iter().any(|reported| reported.diagnostic.code == code)
    }
}

impl DiagnosticsReporter for CollectingReporter {
    fn report_call_diagnostic(
        &mut self,
        _trace: &mut dyn Trace,
        call: CallId,
        _resolved_call: &ResolvedCallRecord,
        _descriptor: &CalleeDescriptor,
        diagnostics: Vec<Diagnostic>,
    ) {
        self.finalized_calls.push(call);
        self.reported
            .extend(diagnostics.into_iter().map(|diagnostic| ReportedDiagnostic { call, diagnostic }));
    }

    fn report_inapplicable_builder_call(&mut self, call: CallId, callee_name: &str) {
        debug!(call = call.0, callee_name, "inapplicable builder inference call");
        self.reported.push(ReportedDiagnostic {
            call,
            diagnostic: Diagnostic::from_code(
                Some(call.0),
                diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL,
                &[callee_name],
            ),
        });
    }
}

#[cfg(test)]
#[path = "../tests/reporter_tests.rs"]
mod tests;
