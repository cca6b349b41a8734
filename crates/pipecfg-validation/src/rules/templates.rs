//! Template references and template shape

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{Keyed, Template};

use crate::chain::ValidationRule;
use crate::context::ValidationContext;
use crate::rules::duplicates;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRules;

impl ValidationRule for TemplateRules {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();

        for (pipeline, path) in ctx.pipelines() {
            match &pipeline.template {
                Some(template) => {
                    if !pipeline.stages.is_empty() {
                        report.add(
                            &path,
                            "template",
                            format!(
                                "Cannot add stages to pipeline '{}' which already references \
                                 template '{template}'.",
                                pipeline.name
                            ),
                        );
                    }
                    if graph.find_template(template.as_str()).is_none() {
                        report.add(
                            &path,
                            "template",
                            format!(
                                "Pipeline '{}' refers to non-existent template '{template}'.",
                                pipeline.name
                            ),
                        );
                    }
                }
                None if pipeline.stages.is_empty() => report.add(
                    &path,
                    "stages",
                    format!(
                        "Pipeline '{}' does not have any stages configured. A pipeline must have \
                         at least one stage.",
                        pipeline.name
                    ),
                ),
                None => {}
            }
        }

        let keyed = graph.templates.iter().filter_map(|t| t.key().map(|k| (k, t)));
        for (key, _) in duplicates(keyed) {
            report.add(
                &EntityPath::of(Template::COLLECTION, key.clone()),
                "name",
                format!("Template name '{key}' is not unique"),
            );
        }

        for (template, path) in ctx.templates() {
            if template.stages.is_empty() {
                report.add(
                    &path,
                    "stages",
                    format!("Template '{}' must have at least one stage.", template.name),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_model::ConfigGraph;
    use pipecfg_test_utils::{graph_with, simple_pipeline, stage};

    fn run(graph: &ConfigGraph) -> ErrorReport {
        let plugins = StaticPluginMetadata::new();
        let mut report = ErrorReport::new();
        TemplateRules.check(&ValidationContext::new(graph, &plugins), &mut report);
        report
    }

    #[test]
    fn template_and_stages_are_exclusive() {
        let mut pipeline = simple_pipeline("p");
        pipeline.template = Some("standard".into());
        let mut graph = graph_with(vec![pipeline]);
        graph.templates.push(Template::new("standard", vec![stage("s", &["j"])]));

        let report = run(&graph);
        assert_eq!(
            report.on(&EntityPath::of("pipelines", "p"), "template"),
            Some("Cannot add stages to pipeline 'p' which already references template 'standard'.")
        );
    }

    #[test]
    fn missing_template_and_empty_pipeline() {
        let mut templated = simple_pipeline("templated");
        templated.stages.clear();
        templated.template = Some("missing".into());
        let mut empty = simple_pipeline("empty");
        empty.stages.clear();
        let mut graph = graph_with(vec![templated, empty]);
        graph.templates.push(Template::new("hollow", vec![]));

        let report = run(&graph);
        assert!(report
            .on(&EntityPath::of("pipelines", "templated"), "template")
            .unwrap()
            .contains("non-existent template 'missing'"));
        assert!(report.on(&EntityPath::of("pipelines", "empty"), "stages").is_some());
        assert!(report.on(&EntityPath::of("templates", "hollow"), "stages").is_some());
    }
}
