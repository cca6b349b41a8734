//! Name uniqueness of pipelines, groups, stages and jobs
//!
//! Duplicates share a key, so they share an error path: each duplicated
//! name yields exactly one error no matter how many copies exist.

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{ConfigOrigin, Keyed, Pipeline, PipelineGroup, Stage};

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};
use crate::rules::duplicates;

/// Pipeline names are unique across the whole merged graph
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineUniqueness;

impl ValidationRule for PipelineUniqueness {
    fn name(&self) -> &'static str {
        "pipeline-uniqueness"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        let pipelines = graph
            .pipelines()
            .filter_map(|p| p.key().map(|key| (key, p)));
        for (key, copies) in duplicates(pipelines) {
            report.add(
                &EntityPath::of(Pipeline::COLLECTION, key.clone()),
                "name",
                format!(
                    "You have defined multiple pipelines called '{key}'. Pipeline names must be \
                     unique.{}",
                    sources(&copies)
                ),
            );
        }

        let groups = graph
            .pipeline_groups
            .iter()
            .filter_map(|g| g.key().map(|key| (key, g)));
        for (key, _) in duplicates(groups) {
            report.add(
                &EntityPath::of(PipelineGroup::COLLECTION, key.clone()),
                "name",
                format!("Group with name '{key}' already exists."),
            );
        }
    }
}

/// Origins of duplicates, when they come from more than one place
fn sources(copies: &[&Pipeline]) -> String {
    let mut origins: Vec<&ConfigOrigin> = Vec::new();
    for pipeline in copies {
        if !origins.contains(&&pipeline.origin) {
            origins.push(&pipeline.origin);
        }
    }
    if origins.len() < 2 {
        return String::new();
    }
    let listed: Vec<String> = origins.iter().map(ToString::to_string).collect();
    format!(" Source(s): [{}]", listed.join(", "))
}

/// Stage names within a pipeline or template; job names within a stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StageJobUniqueness;

fn check_stages(stages: &[Stage], parent: &EntityPath, report: &mut ErrorReport) {
    let keyed = stages.iter().filter_map(|s| s.key().map(|key| (key, s)));
    for (key, _) in duplicates(keyed) {
        report.add(
            &parent.member(Stage::COLLECTION, key.clone()),
            "name",
            format!(
                "You have defined multiple stages called '{key}'. Stage names are case-insensitive \
                 and must be unique."
            ),
        );
    }
    for stage in stages {
        let path = path_of(stage, parent);
        let jobs = stage.jobs.iter().filter_map(|j| j.key().map(|key| (key, j)));
        for (key, _) in duplicates(jobs) {
            report.add(
                &path.member("jobs", key.clone()),
                "name",
                format!(
                    "You have defined multiple jobs called '{key}'. Job names are case-insensitive \
                     and must be unique."
                ),
            );
        }
    }
}

impl ValidationRule for StageJobUniqueness {
    fn name(&self) -> &'static str {
        "stage-job-uniqueness"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        for (pipeline, path) in ctx.pipelines() {
            check_stages(&pipeline.stages, &path, report);
        }
        for (template, path) in ctx.templates() {
            check_stages(&template.stages, &path, report);
        }
    }
}
