//! Property tests for infrastructure variable validation and rendering.

use proptest::prelude::*;

use kb_deploy::{
    validate_domain, validate_environment, validate_project_name, validate_var, DeployVars,
    Environment, DEFAULT_PROJECT_NAME,
};

use crate::common::generators::{
    invalid_api_domain, invalid_environment, invalid_project_name, valid_api_domain,
    valid_environment, valid_project_name, valid_region,
};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Every generated valid project name passes validation.
    #[test]
    fn property_valid_project_names_accepted(name in valid_project_name()) {
        prop_assert!(validate_project_name(&name).is_ok(), "rejected valid name '{}'", name);
        prop_assert!(validate_var("project_name", &name).is_ok());
    }

    /// PROPERTY: Every generated invalid project name is rejected.
    #[test]
    fn property_invalid_project_names_rejected(name in invalid_project_name()) {
        prop_assert!(validate_project_name(&name).is_err(), "accepted invalid name '{}'", name);
    }

    /// PROPERTY: Environment validation agrees with the enum parser.
    #[test]
    fn property_environment_validation_agrees_with_parser(
        valid in valid_environment(),
        invalid in invalid_environment(),
    ) {
        prop_assert!(validate_environment(&valid).is_ok());
        prop_assert!(Environment::parse(&valid).is_ok());
        prop_assert!(validate_environment(&invalid).is_err());
        prop_assert!(Environment::parse(&invalid).is_err());
    }

    /// PROPERTY: Generated valid domains pass, generated invalid ones fail.
    #[test]
    fn property_domain_validation(
        valid in valid_api_domain(),
        invalid in invalid_api_domain(),
    ) {
        prop_assert!(validate_domain(&valid).is_ok(), "rejected valid domain '{}'", valid);
        prop_assert!(validate_domain(&invalid).is_err(), "accepted invalid domain '{}'", invalid);
    }

    /// PROPERTY: A fully valid variable record validates and renders one
    /// `-var=` argument per provided field, with values intact.
    #[test]
    fn property_valid_record_validates_and_renders(
        project_name in valid_project_name(),
        region in valid_region(),
        domain in valid_api_domain(),
    ) {
        let vars = DeployVars {
            project_name: Some(project_name.clone()),
            aws_region: Some(region.clone()),
            api_gateway_domain: Some(domain.clone()),
            api_gateway_stage: Some("prod".to_string()),
            cloudfront_price_class: Some("PriceClass_100".to_string()),
            tags: [("TestRun".to_string(), "property-test".to_string())].into(),
        };

        prop_assert!(vars.validate().is_ok());

        let args = vars.var_args();
        prop_assert_eq!(args.len(), 6);
        prop_assert!(args.contains(&format!("-var=project_name={}", project_name)), "missing project_name var");
        prop_assert!(args.contains(&format!("-var=aws_region={}", region)), "missing aws_region var");
        prop_assert!(args.contains(&format!("-var=api_gateway_domain={}", domain)), "missing api_gateway_domain var");

        // Every argument parses back as -var=name=value.
        for arg in &args {
            let rest = arg.strip_prefix("-var=");
            prop_assert!(rest.is_some(), "malformed argument '{}'", arg);
            prop_assert!(rest.unwrap().contains('='), "malformed argument '{}'", arg);
        }
    }

    /// PROPERTY: Records with invalid values never validate, regardless of
    /// the other fields.
    #[test]
    fn property_invalid_record_rejected(
        bad_name in invalid_project_name(),
        domain in valid_api_domain(),
    ) {
        let vars = DeployVars {
            project_name: Some(bad_name),
            api_gateway_domain: Some(domain),
            ..DeployVars::default()
        };
        prop_assert!(vars.validate().is_err());
        prop_assert!(vars.validate_provided().is_err());
    }

    /// PROPERTY: Validation never panics on arbitrary input.
    #[test]
    fn property_validation_never_panics(s in "(?s).{0,256}") {
        let _ = validate_project_name(&s);
        let _ = validate_environment(&s);
        let _ = validate_domain(&s);
        let _ = validate_var("project_name", &s);
        let _ = Environment::parse(&s);
    }
}

#[test]
fn omitted_variables_fall_back_to_documented_defaults() {
    // The defaults live in the terraform definition; the crate's constants
    // must agree with them and themselves be valid.
    assert_eq!(DEFAULT_PROJECT_NAME, "kb-engine");
    assert!(validate_project_name(DEFAULT_PROJECT_NAME).is_ok());
    assert_eq!(Environment::default(), Environment::Dev);

    // A record omitting optional variables renders no arguments for them,
    // leaving terraform to apply its defaults.
    let vars = DeployVars {
        api_gateway_domain: Some("api.example.com".to_string()),
        ..DeployVars::default()
    };
    assert!(vars.validate().is_ok());
    assert_eq!(vars.var_args(), vec!["-var=api_gateway_domain=api.example.com"]);
}
