//! Full-chain validation scenarios

use std::collections::HashMap;
use std::sync::Arc;

use pipecfg_artifact::{Blake3Cipher, EntityPath, SecretCipher};
use pipecfg_model::{ConfigGraph, Environment, EnvironmentVariable, Keyed, Pipeline};
use pipecfg_test_utils::{add_task, diamond, elastic_profile, fetch, graph_with, simple_pipeline};
use pipecfg_validation::{copy_errors, PropertyMetadata, StaticPluginMetadata, ValidatorChain};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn cipher() -> Blake3Cipher {
    Blake3Cipher::from_secret(b"chain-tests")
}

fn chain_with(plugins: StaticPluginMetadata) -> ValidatorChain {
    ValidatorChain::standard(Arc::new(cipher()), Arc::new(plugins))
}

fn chain() -> ValidatorChain {
    chain_with(StaticPluginMetadata::new())
}

fn downest_fetch_path() -> EntityPath {
    "pipelines/downest/stages/stage/jobs/job".parse().unwrap()
}

#[test]
fn fetch_through_ancestors_up_to_pinned_stage() {
    let mut graph = diamond();
    let task = fetch(Some("uppest_stream/upstream/downstream"), "uppest-stage2", "uppest-job2");
    add_task(&mut graph, "downest", "stage", "job", task);

    let validated = chain().validate(&graph);
    assert!(validated.is_valid(), "{:?}", validated.report.messages());
}

#[test]
fn fetch_through_ancestors_past_pinned_stage() {
    let mut graph = diamond();
    let task = fetch(Some("uppest_stream/upstream/downstream"), "uppest-stage3", "uppest-job3");
    let task_path = task.path_in(&downest_fetch_path()).unwrap();
    add_task(&mut graph, "downest", "stage", "job", task);

    let report = chain().validate(&graph).report;
    assert_eq!(
        report.on(&task_path, "stage"),
        Some(
            "\"downest :: stage :: job\" tries to fetch artifact from stage \"uppest_stream :: uppest-stage3\" \
             which does not complete before \"downest\" pipeline's dependencies."
        )
    );
    assert_eq!(report.error_count(), 1);
}

#[test]
fn errors_land_on_submitted_copy_by_key() {
    let mut submitted = graph_with(vec![simple_pipeline("alpha"), simple_pipeline("beta")]);
    submitted.pipeline_groups[0].pipelines[1].label_template = "no-token".into();

    // the copy the user sees lists pipelines in another order
    let mut shown = submitted.clone();
    shown.pipeline_groups[0].pipelines.reverse();

    let validated = chain().validate(&submitted);
    let copied = copy_errors(&validated, &shown);
    let beta = EntityPath::of(Pipeline::COLLECTION, "beta");
    assert!(copied.on(&beta, "labelTemplate").is_some());
    assert!(copied.errors_for(&EntityPath::of(Pipeline::COLLECTION, "alpha")).is_none());
    assert_eq!(copied.error_count(), validated.report.error_count());
}

#[test]
fn variable_errors_follow_names_across_reordering() {
    let mut region = EnvironmentVariable::plain("REGION", "eu");
    region.encrypted_value = Some("c2VjcmV0".into());
    let mut uat = Environment::named("uat");
    uat.environment_variables = vec![region, EnvironmentVariable::plain("TIER", "web")];
    let submitted = ConfigGraph {
        environments: vec![uat],
        ..ConfigGraph::default()
    };

    let mut shown = submitted.clone();
    shown.environments[0].environment_variables.reverse();

    let validated = chain().validate(&submitted);
    let copied = copy_errors(&validated, &shown);
    let scope = EntityPath::of(Environment::COLLECTION, "uat");
    let region_path = shown.environments[0].environment_variables[1].path_in(&scope).unwrap();
    let tier_path = shown.environments[0].environment_variables[0].path_in(&scope).unwrap();

    assert_eq!(
        copied.on(&region_path, "value"),
        Some("You may only specify `value` or `encrypted_value`, not both!")
    );
    assert_eq!(
        copied.errors_for(&region_path).unwrap().all_on("value"),
        validated.report.errors_for(&region_path).unwrap().all_on("value")
    );
    assert!(copied.errors_for(&tier_path).is_none());
    assert_eq!(copied.error_count(), validated.report.error_count());
}

#[test]
fn secure_values_encrypted_with_json_metadata() {
    let metadata: HashMap<String, Vec<PropertyMetadata>> = serde_json::from_str(
        r#"{ "docker": [
               { "key": "Image", "required": true },
               { "key": "Token", "secure": true }
           ] }"#,
    )
    .unwrap();
    let mut profile = elastic_profile("builder", "docker");
    profile.properties.push(pipecfg_model::ConfigProperty::plain("Token", "s3cret"));
    let graph = ConfigGraph {
        elastic_profiles: vec![profile],
        ..ConfigGraph::default()
    };

    let validated = chain_with(StaticPluginMetadata::from_map(metadata)).validate(&graph);
    assert!(validated.is_valid(), "{:?}", validated.report.messages());

    let token = &validated.graph.elastic_profiles[0].properties[1];
    assert_eq!(token.value, None);
    let encrypted = token.encrypted_value.as_deref().unwrap();
    assert_eq!(cipher().decrypt(encrypted).unwrap(), "s3cret");
    // the submitted graph keeps its plain value
    assert_eq!(graph.elastic_profiles[0].properties[1].value.as_deref(), Some("s3cret"));
}

proptest! {
    #[test]
    fn prop_case_variants_collide_once(name in "[a-z][a-z0-9_]{0,12}") {
        let upper = name.to_uppercase();
        let graph = graph_with(vec![simple_pipeline(&name), simple_pipeline(&upper)]);
        let report = chain().validate(&graph).report;

        let path = EntityPath::of(Pipeline::COLLECTION, name.clone());
        let errors = report.errors_for(&path).unwrap();
        prop_assert_eq!(errors.all_on("name").len(), 1);
        let expected = format!(
            "You have defined multiple pipelines called '{name}'. Pipeline names must be unique."
        );
        prop_assert_eq!(errors.on("name"), Some(expected.as_str()));
    }

    #[test]
    fn prop_distinct_names_are_accepted(a in "[a-m][a-z0-9]{0,8}", b in "[n-z][a-z0-9]{0,8}") {
        let graph = graph_with(vec![simple_pipeline(&a), simple_pipeline(&b)]);
        let validated = chain().validate(&graph);
        prop_assert!(validated.is_valid(), "{:?}", validated.report.messages());
    }
}
