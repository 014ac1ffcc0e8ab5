//! Diagnostics emitted by the inference engine.
//!
//! The engine never prints; it produces `Diagnostic` values that a frontend
//! attaches to source spans. Spans are outside this crate, so a diagnostic
//! only names the call it belongs to.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

pub mod diagnostic_codes {
    pub const TYPE_MISMATCH_IN_CONSTRAINT: u32 = 1001;
    pub const CANNOT_INFER_TYPE_PARAMETER: u32 = 1002;
    pub const ONLY_INPUT_TYPES_VIOLATION: u32 = 1003;
    pub const BUILDER_INFERENCE_INAPPLICABLE_CALL: u32 = 1004;
    pub const CONSTRAINING_TYPE_IS_ERROR: u32 = 1005;
    pub const INCORPORATION_LIMIT_EXCEEDED: u32 = 1006;
    pub const AMBIGUOUS_TYPE_INFERENCE: u32 = 1007;
}

pub const DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: diagnostic_codes::TYPE_MISMATCH_IN_CONSTRAINT,
        category: DiagnosticCategory::Error,
        message: "Type mismatch: inferred type is {0} but {1} was expected",
    },
    DiagnosticMessage {
        code: diagnostic_codes::CANNOT_INFER_TYPE_PARAMETER,
        category: DiagnosticCategory::Error,
        message: "Not enough information to infer type variable {0}",
    },
    DiagnosticMessage {
        code: diagnostic_codes::ONLY_INPUT_TYPES_VIOLATION,
        category: DiagnosticCategory::Error,
        message: "Type inference failed. The value of the type parameter {0} should be mentioned in input types",
    },
    DiagnosticMessage {
        code: diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL,
        category: DiagnosticCategory::Warning,
        message: "Call '{0}' is not allowed inside a builder inference lambda",
    },
    DiagnosticMessage {
        code: diagnostic_codes::CONSTRAINING_TYPE_IS_ERROR,
        category: DiagnosticCategory::Error,
        message: "Constraint on {0} refers to an unresolved type",
    },
    DiagnosticMessage {
        code: diagnostic_codes::INCORPORATION_LIMIT_EXCEEDED,
        category: DiagnosticCategory::Error,
        message: "Type inference is too complex: constraint incorporation exceeded {0} steps",
    },
    DiagnosticMessage {
        code: diagnostic_codes::AMBIGUOUS_TYPE_INFERENCE,
        category: DiagnosticCategory::Error,
        message: "Type inference failed for {0}: ambiguous candidates {1}",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRelatedInformation {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Frontend call id the diagnostic is attached to, if any.
    pub call: Option<u32>,
    pub message_text: String,
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    pub fn error(call: Option<u32>, message: impl Into<String>, code: u32) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            code,
            call,
            message_text: message.into(),
            related_information: Vec::new(),
        }
    }

    /// Build a diagnostic from the message table, formatting `{n}` placeholders.
    pub fn from_code(call: Option<u32>, code: u32, args: &[&str]) -> Self {
        let (category, template) = DIAGNOSTIC_MESSAGES
            .iter()
            .find(|m| m.code == code)
            .map(|m| (m.category, m.message))
            .unwrap_or((DiagnosticCategory::Error, "{0}"));
        Self {
            category,
            code,
            call,
            message_text: format_message(template, args),
            related_information: Vec::new(),
        }
    }

    pub fn with_related(mut self, message: impl Into<String>) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            category: DiagnosticCategory::Message,
            code: 0,
            message_text: message.into(),
        });
        self
    }
}

pub fn get_message_template(code: u32) -> Option<&'static str> {
    DIAGNOSTIC_MESSAGES
        .iter()
        .find(|m| m.code == code)
        .map(|m| m.message)
}

pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

#[cfg(test)]
#[path = "tests/diagnostics_tests.rs"]
mod tests;
