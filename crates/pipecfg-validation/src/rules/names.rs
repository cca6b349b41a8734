//! Name format of named entities

use once_cell::sync::Lazy;
use pipecfg_artifact::{CaseInsensitiveName, EntityPath, ErrorReport};
use regex::Regex;

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};

pub(crate) const MAX_NAME_LENGTH: usize = 255;

static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_\-][a-zA-Z0-9_\-.]*$").expect("name regex must compile")
});

/// Whether a name is well formed
pub(crate) fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && NAME.is_match(name)
}

/// Names of groups, pipelines, stages, jobs, templates, environments and
/// materials
#[derive(Debug, Clone, Copy, Default)]
pub struct NameFormat;

fn check_name(report: &mut ErrorReport, path: &EntityPath, kind: &str, name: &CaseInsensitiveName) {
    if name.is_blank() {
        report.add(path, "name", format!("{kind} name cannot be blank."));
    } else if !is_valid_name(name.as_str()) {
        report.add(
            path,
            "name",
            format!(
                "Invalid {} name '{name}'. This must be alphanumeric and can contain underscores, \
                 hyphens and periods (however, it cannot start with a period). The maximum allowed \
                 length is {MAX_NAME_LENGTH} characters.",
                kind.to_lowercase()
            ),
        );
    }
}

impl ValidationRule for NameFormat {
    fn name(&self) -> &'static str {
        "name-format"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let root = EntityPath::root();
        let graph = ctx.graph();

        for group in &graph.pipeline_groups {
            check_name(report, &path_of(group, &root), "Group", &group.name);
        }
        for (pipeline, path) in ctx.pipelines() {
            check_name(report, &path, "Pipeline", &pipeline.name);
            for material in &pipeline.materials {
                if let Some(name) = material.name() {
                    if !is_valid_name(name.as_str()) {
                        report.add(
                            &path_of(material, &path),
                            "materialName",
                            format!(
                                "Invalid material name '{name}'. This must be alphanumeric and can \
                                 contain underscores, hyphens and periods (however, it cannot start \
                                 with a period). The maximum allowed length is {MAX_NAME_LENGTH} \
                                 characters."
                            ),
                        );
                    }
                }
            }
        }
        for (template, path) in ctx.templates() {
            check_name(report, &path, "Template", &template.name);
        }
        for environment in &graph.environments {
            check_name(report, &path_of(environment, &root), "Environment", &environment.name);
        }
        for site in ctx.declared_stages() {
            check_name(report, &site.path, "Stage", &site.stage.name);
        }
        for site in ctx.declared_jobs() {
            check_name(report, &site.path, "Job", &site.job.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_test_utils::{graph_with, simple_pipeline};

    fn run(graph: &pipecfg_model::ConfigGraph) -> ErrorReport {
        let plugins = StaticPluginMetadata::new();
        let mut report = ErrorReport::new();
        NameFormat.check(&ValidationContext::new(graph, &plugins), &mut report);
        report
    }

    #[test]
    fn name_pattern() {
        assert!(is_valid_name("build-1.0_final"));
        assert!(!is_valid_name(".hidden"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(&"a".repeat(256)));
    }

    #[test]
    fn bad_pipeline_name_is_reported() {
        let report = run(&graph_with(vec![simple_pipeline("my pipeline")]));
        let path = EntityPath::of("pipelines", "my pipeline");
        assert!(report.on(&path, "name").unwrap().starts_with("Invalid pipeline name 'my pipeline'"));
    }

    #[test]
    fn fixtures_are_well_named() {
        assert!(run(&pipecfg_test_utils::diamond()).is_empty());
    }
}
