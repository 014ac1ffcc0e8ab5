use super::*;

#[test]
fn test_format_message_replaces_placeholders() {
    let text = format_message("expected {0} but got {1}", &["Int", "String"]);
    assert_eq!(text, "expected Int but got String");
}

#[test]
fn test_from_code_uses_table_category() {
    let diag = Diagnostic::from_code(
        Some(7),
        diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL,
        &["add"],
    );
    assert_eq!(diag.category, DiagnosticCategory::Warning);
    assert_eq!(diag.call, Some(7));
    assert_eq!(
        diag.message_text,
        "Call 'add' is not allowed inside a builder inference lambda"
    );
}

#[test]
fn test_every_code_has_a_template() {
    for code in [
        diagnostic_codes::TYPE_MISMATCH_IN_CONSTRAINT,
        diagnostic_codes::CANNOT_INFER_TYPE_PARAMETER,
        diagnostic_codes::ONLY_INPUT_TYPES_VIOLATION,
        diagnostic_codes::BUILDER_INFERENCE_INAPPLICABLE_CALL,
        diagnostic_codes::CONSTRAINING_TYPE_IS_ERROR,
        diagnostic_codes::INCORPORATION_LIMIT_EXCEEDED,
        diagnostic_codes::AMBIGUOUS_TYPE_INFERENCE,
    ] {
        assert!(get_message_template(code).is_some(), "missing template for {code}");
    }
}

#[test]
fn test_with_related_appends_message() {
    let diag = Diagnostic::error(None, "boom", 1).with_related("see here");
    assert_eq!(diag.related_information.len(), 1);
    assert_eq!(diag.related_information[0].message_text, "see here");
}
