//! Error reconciliation
//!
//! Copies the errors found on a validated working copy onto a second graph
//! of the same shape. Entities are paired by their identity key rather than
//! by position, so the target's lists may be ordered differently or be
//! missing entries. Entities with a blank identity cannot be paired and are
//! skipped.

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{ConfigGraph, ConfigProperty, EnvironmentVariable, Keyed, Stage};
use tracing::debug;

use crate::chain::ValidatedGraph;

/// Errors of `source` that belong to entities present in `target`
#[must_use]
pub fn copy_errors(source: &ValidatedGraph, target: &ConfigGraph) -> ErrorReport {
    let mut walk = Walk {
        source: &source.report,
        copied: ErrorReport::new(),
    };
    let root = EntityPath::root();
    walk.copy(&root);

    for group in &target.pipeline_groups {
        walk.visit(group, &root);
    }
    for pipeline in target.pipelines() {
        let Some(path) = walk.visit(pipeline, &root) else {
            continue;
        };
        for param in &pipeline.params {
            walk.visit(param, &path);
        }
        walk.variables(&pipeline.environment_variables, &path);
        for material in &pipeline.materials {
            walk.visit(material, &path);
        }
        walk.stages(target.effective_stages(pipeline), &path);
    }
    for template in &target.templates {
        if let Some(path) = walk.visit(template, &root) {
            walk.stages(&template.stages, &path);
        }
    }
    for environment in &target.environments {
        if let Some(path) = walk.visit(environment, &root) {
            walk.variables(&environment.environment_variables, &path);
        }
    }
    for profile in &target.elastic_profiles {
        if let Some(path) = walk.visit(profile, &root) {
            walk.properties(&profile.properties, &path);
        }
    }
    for repo in &target.repositories {
        let Some(path) = walk.visit(repo, &root) else {
            continue;
        };
        walk.properties(&repo.configuration, &path);
        for package in &repo.packages {
            if let Some(package_path) = walk.visit(package, &path) {
                walk.properties(&package.configuration, &package_path);
            }
        }
    }
    for scm in &target.scms {
        if let Some(path) = walk.visit(scm, &root) {
            walk.properties(&scm.configuration, &path);
        }
    }
    for agent in &target.agents {
        walk.visit(agent, &root);
    }
    for repo in &target.config_repos {
        walk.visit(repo, &root);
    }

    debug!(
        found = source.report.error_count(),
        copied = walk.copied.error_count(),
        "errors reconciled"
    );
    walk.copied
}

struct Walk<'s> {
    source: &'s ErrorReport,
    copied: ErrorReport,
}

impl Walk<'_> {
    fn copy(&mut self, path: &EntityPath) {
        if let Some(errors) = self.source.errors_for(path) {
            self.copied.add_all(path, errors);
        }
    }

    fn visit<K: Keyed>(&mut self, entity: &K, parent: &EntityPath) -> Option<EntityPath> {
        let path = entity.path_in(parent)?;
        self.copy(&path);
        Some(path)
    }

    fn variables(&mut self, variables: &[EnvironmentVariable], parent: &EntityPath) {
        for variable in variables {
            self.visit(variable, parent);
        }
    }

    fn properties(&mut self, properties: &[ConfigProperty], parent: &EntityPath) {
        for property in properties {
            self.visit(property, parent);
        }
    }

    fn stages(&mut self, stages: &[Stage], parent: &EntityPath) {
        for stage in stages {
            let Some(path) = self.visit(stage, parent) else {
                continue;
            };
            self.variables(&stage.environment_variables, &path);
            for job in &stage.jobs {
                let Some(job_path) = self.visit(job, &path) else {
                    continue;
                };
                self.variables(&job.environment_variables, &job_path);
                for task in &job.tasks {
                    self.visit(task, &job_path);
                }
            }
        }
    }
}
