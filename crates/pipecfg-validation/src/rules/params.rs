//! Pipeline parameters
//!
//! `#{name}` in a label template, material location or task field must name
//! a parameter of the pipeline. `##{` escapes a literal `#{`. Template stages
//! are scanned inside every pipeline that uses them.

use std::collections::HashSet;

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{Keyed, Material, Param, Pipeline, Stage, TaskKind};

use crate::chain::ValidationRule;
use crate::context::ValidationContext;
use crate::rules::duplicates;
use crate::rules::names::is_valid_name;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParamRules;

/// Parameter names referenced in `text`, in order of appearance
pub(crate) fn references(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        if rest[..start].ends_with('#') {
            rest = &rest[start + 2..];
            continue;
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        found.push(&after[..end]);
        rest = &after[end + 1..];
    }
    found
}

fn material_text(material: &Material) -> Vec<&str> {
    match material {
        Material::Git(m) => vec![m.url.as_str(), m.branch.as_str()],
        Material::Hg(m) => vec![m.url.as_str()],
        Material::Svn(m) => vec![m.url.as_str()],
        Material::P4(m) => vec![m.port.as_str(), m.view.as_str()],
        Material::Dependency(_) | Material::Package(_) | Material::Plugin(_) => Vec::new(),
    }
}

fn task_text(kind: &TaskKind) -> Vec<&str> {
    match kind {
        TaskKind::Exec(exec) => {
            let mut text = vec![exec.command.as_str()];
            text.extend(exec.arguments.iter().map(String::as_str));
            text.extend(exec.working_directory.as_deref());
            text
        }
        TaskKind::Build(build) => [&build.build_file, &build.target, &build.working_directory]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .collect(),
        TaskKind::Fetch(fetch) => {
            let mut text = vec![fetch.stage.as_str(), fetch.job.as_str(), fetch.source.as_str()];
            text.extend(fetch.pipeline.as_deref());
            text.extend(fetch.destination.as_deref());
            text
        }
        TaskKind::Pluggable(_) => Vec::new(),
    }
}

fn stage_text(stages: &[Stage]) -> Vec<&str> {
    let mut text = Vec::new();
    for job in stages.iter().flat_map(|s| s.jobs.iter()) {
        text.extend(job.resources.iter().map(String::as_str));
        for task in &job.tasks {
            text.extend(task_text(&task.kind));
            if let Some(cancel) = &task.on_cancel {
                text.extend(task_text(&cancel.kind));
            }
        }
    }
    text
}

fn check_pipeline(pipeline: &Pipeline, stages: &[Stage], path: &EntityPath, report: &mut ErrorReport) {
    for param in &pipeline.params {
        if param.name.trim().is_empty() {
            report.add(
                path,
                "params",
                format!("Parameter cannot have an empty name for pipeline '{}'.", pipeline.name),
            );
        } else if !is_valid_name(&param.name) {
            report.add(
                &path.member(Param::COLLECTION, param.name.trim()),
                "name",
                format!("Invalid parameter name '{}'.", param.name),
            );
        }
    }
    let keyed = pipeline.params.iter().filter_map(|p| p.key().map(|k| (k, p)));
    for (key, _) in duplicates(keyed) {
        report.add(
            &path.member(Param::COLLECTION, key.clone()),
            "name",
            format!("Param name '{key}' is not unique for pipeline '{}'.", pipeline.name),
        );
    }

    let defined: HashSet<&str> = pipeline.params.iter().map(|p| p.name.trim()).collect();
    let mut text = vec![pipeline.label_template.as_str()];
    text.extend(pipeline.materials.iter().flat_map(material_text));
    text.extend(stage_text(stages));

    let mut reported = HashSet::new();
    for name in text.into_iter().flat_map(references) {
        if !defined.contains(name) && reported.insert(name) {
            report.add(
                path,
                "params",
                format!(
                    "Parameter '{name}' is not defined. All pipelines using this parameter directly \
                     or via a template must define it."
                ),
            );
        }
    }
}

impl ValidationRule for ParamRules {
    fn name(&self) -> &'static str {
        "params"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        for (pipeline, path) in ctx.pipelines() {
            check_pipeline(pipeline, graph.effective_stages(pipeline), &path, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_model::{ConfigGraph, Template};
    use pipecfg_test_utils::{exec, graph_with, simple_pipeline, stage};

    fn run(graph: &ConfigGraph) -> ErrorReport {
        let plugins = StaticPluginMetadata::new();
        let mut report = ErrorReport::new();
        ParamRules.check(&ValidationContext::new(graph, &plugins), &mut report);
        report
    }

    #[test]
    fn scans_references_and_escapes() {
        assert_eq!(references("#{a}-##{b}-#{c}"), vec!["a", "c"]);
        assert_eq!(references("#{unterminated"), Vec::<&str>::new());
        assert!(references("plain").is_empty());
    }

    #[test]
    fn template_params_checked_per_pipeline() {
        let mut build = stage("build", &[]);
        let mut job = pipecfg_test_utils::job("compile");
        job.tasks = vec![exec("make #{target}")];
        build.jobs.push(job);

        let mut defines = simple_pipeline("defines");
        defines.stages.clear();
        defines.template = Some("t".into());
        defines.params.push(Param {
            name: "target".into(),
            value: "all".into(),
        });
        let mut missing = defines.clone();
        missing.name = "missing".into();
        missing.params.clear();

        let mut graph = graph_with(vec![defines, missing]);
        graph.templates.push(Template::new("t", vec![build]));

        let report = run(&graph);
        assert!(report.errors_for(&EntityPath::of("pipelines", "defines")).is_none());
        assert_eq!(
            report.on(&EntityPath::of("pipelines", "missing"), "params"),
            Some("Parameter 'target' is not defined. All pipelines using this parameter directly or via a template must define it.")
        );
    }
}
