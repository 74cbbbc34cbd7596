//! Proptest strategies for infrastructure variable values.
//!
//! Each field gets its own strategy so record-level generators compose
//! from them; the invalid strategies mirror the rejection cases the
//! terraform validation expressions must catch.

use proptest::prelude::*;

/// Valid project names: 3-20 chars, lowercase/digit/hyphen, no edge hyphen.
pub fn valid_project_name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9][a-z0-9-]{1,18}[a-z0-9]").unwrap()
}

/// Names that violate the project-name rules, one violation per branch.
pub fn invalid_project_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        proptest::string::string_regex("[a-z0-9]{1,2}").unwrap(),
        proptest::string::string_regex("[a-z0-9]{21,32}").unwrap(),
        proptest::string::string_regex("[A-Z]{3,12}").unwrap(),
        proptest::string::string_regex("[a-z]{2,8}_[a-z]{2,8}").unwrap(),
        proptest::string::string_regex("-[a-z0-9]{2,12}").unwrap(),
        proptest::string::string_regex("[a-z0-9]{2,12}-").unwrap(),
    ]
}

pub fn valid_environment() -> impl Strategy<Value = String> {
    proptest::sample::select(vec!["dev", "staging", "prod"]).prop_map(String::from)
}

pub fn invalid_environment() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,12}")
        .unwrap()
        .prop_filter("must not be a recognized environment", |s| {
            !matches!(s.as_str(), "dev" | "staging" | "prod")
        })
}

pub fn valid_region() -> impl Strategy<Value = String> {
    proptest::sample::select(vec![
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-central-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-northeast-1",
    ])
    .prop_map(String::from)
}

/// Valid API domains: generated subdomain on a fixed base domain.
pub fn valid_api_domain() -> impl Strategy<Value = String> {
    let subdomain = proptest::string::string_regex("[a-z0-9][a-z0-9-]{1,8}[a-z0-9]").unwrap();
    let base = proptest::sample::select(vec!["example.com", "test.org", "api.local"]);
    (subdomain, base).prop_map(|(sub, base)| format!("{}.{}", sub, base))
}

pub fn invalid_api_domain() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        // Bare label: no dot at all.
        proptest::string::string_regex("[a-z0-9-]{3,16}")
            .unwrap()
            .prop_filter("single label", |s| !s.contains('.')),
        // Empty label from doubled dots.
        Just("invalid..domain.com".to_string()),
        // Hyphen at a label edge.
        proptest::string::string_regex("-[a-z0-9]{2,8}\\.example\\.com").unwrap(),
    ]
}
