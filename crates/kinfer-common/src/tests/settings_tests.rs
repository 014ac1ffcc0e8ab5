use super::*;

#[test]
fn test_defaults_match_limits() {
    let settings = InferenceSettings::default();
    assert_eq!(settings.max_incorporation_steps, limits::MAX_INCORPORATION_STEPS);
    assert!(!settings.language_features.unrestricted_builder_inference);
    assert!(
        settings
            .language_features
            .forbid_inferring_postponed_type_variable_into_declared_upper_bound
    );
}

#[test]
fn test_from_json_partial_document() {
    let settings = InferenceSettings::from_json(
        r#"{ "languageFeatures": { "unrestrictedBuilderInference": true }, "maxIncorporationSteps": 50 }"#,
    )
    .unwrap();
    assert!(settings.language_features.unrestricted_builder_inference);
    assert_eq!(settings.max_incorporation_steps, 50);
    assert_eq!(settings.max_type_depth, limits::MAX_TYPE_DEPTH);
}

#[test]
fn test_from_json_empty_object_is_default() {
    let settings = InferenceSettings::from_json("{}").unwrap();
    assert_eq!(settings, InferenceSettings::default());
}

#[test]
fn test_from_json_rejects_wrong_types() {
    let err = InferenceSettings::from_json(r#"{ "maxTypeDepth": "deep" }"#).unwrap_err();
    assert!(err.to_string().starts_with("invalid inference settings"));
}
