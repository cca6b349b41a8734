//! Environments and environment variables

use std::collections::HashMap;

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{Environment, EnvironmentVariable, Keyed};

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};
use crate::rules::duplicates;
use crate::secure::BOTH_VALUES;

/// Environment names, references, and one environment per pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentRules;

impl ValidationRule for EnvironmentRules {
    fn name(&self) -> &'static str {
        "environments"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        let root = EntityPath::root();

        let keyed = graph.environments.iter().filter_map(|e| e.key().map(|k| (k, e)));
        for (key, _) in duplicates(keyed) {
            report.add(
                &EntityPath::of(Environment::COLLECTION, key.clone()),
                "name",
                format!("Environment with name '{key}' already exists."),
            );
        }

        // pipeline (normalized) -> first environment claiming it
        let mut claimed: HashMap<String, &Environment> = HashMap::new();
        for environment in &graph.environments {
            let path = path_of(environment, &root);

            for uuid in &environment.agents {
                if graph.find_agent(uuid).is_none() {
                    report.add(
                        &path,
                        "agents",
                        format!("Environment '{}' has an invalid agent uuid '{uuid}'", environment.name),
                    );
                }
            }

            let listed = environment.pipelines.iter().map(|p| (p.normalized(), p));
            for (_, copies) in duplicates(listed) {
                report.add(
                    &path,
                    "pipelines",
                    format!(
                        "Environment '{}' lists pipeline '{}' more than once.",
                        environment.name, copies[0]
                    ),
                );
            }

            for pipeline in &environment.pipelines {
                if ctx.pipeline(pipeline.as_str()).is_none() {
                    report.add(
                        &path,
                        "pipelines",
                        format!(
                            "Environment '{}' refers to an unknown pipeline '{pipeline}'.",
                            environment.name
                        ),
                    );
                    continue;
                }
                match claimed.get(&pipeline.normalized()) {
                    Some(first) if first.name != environment.name => report.add(
                        &path,
                        "pipelines",
                        format!(
                            "Associating pipeline(s) which is already part of {} environment: \
                             pipeline '{pipeline}' cannot also be added to environment '{}'.",
                            first.name, environment.name
                        ),
                    ),
                    Some(_) => {}
                    None => {
                        claimed.insert(pipeline.normalized(), environment);
                    }
                }
            }
        }
    }
}

/// Variable names unique and non-blank per scope
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariableRules;

fn check_scope(
    variables: &[EnvironmentVariable],
    kind: &str,
    owner: &str,
    scope: &EntityPath,
    report: &mut ErrorReport,
) {
    for variable in variables {
        if variable.name.is_blank() {
            report.add(
                scope,
                "environmentVariables",
                format!("Environment Variable cannot have an empty name for {kind} '{owner}'."),
            );
            continue;
        }
        if variable.value.is_some() && variable.encrypted_value.is_some() {
            report.add(&path_of(variable, scope), "value", BOTH_VALUES);
        }
    }
    let keyed = variables.iter().filter_map(|v| v.key().map(|k| (k, v)));
    for (key, copies) in duplicates(keyed) {
        report.add(
            &scope.member(EnvironmentVariable::COLLECTION, key),
            "name",
            format!(
                "Environment Variable name '{}' is not unique for {kind} '{owner}'.",
                copies[0].name
            ),
        );
    }
}

impl ValidationRule for EnvironmentVariableRules {
    fn name(&self) -> &'static str {
        "environment-variables"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let root = EntityPath::root();
        for environment in &ctx.graph().environments {
            let path = path_of(environment, &root);
            check_scope(
                &environment.environment_variables,
                "environment",
                environment.name.as_str(),
                &path,
                report,
            );
        }
        for (pipeline, path) in ctx.pipelines() {
            check_scope(&pipeline.environment_variables, "pipeline", pipeline.name.as_str(), &path, report);
        }
        for site in ctx.declared_stages() {
            check_scope(&site.stage.environment_variables, "stage", site.stage.name.as_str(), &site.path, report);
        }
        for site in ctx.declared_jobs() {
            check_scope(&site.job.environment_variables, "job", site.job.name.as_str(), &site.path, report);
        }
    }
}
