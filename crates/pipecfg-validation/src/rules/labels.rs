//! Label template grammar
//!
//! A label is ASCII literal text (`[-A-Za-z0-9_.]`) around at least one
//! `${...}` token. A token is `COUNT`, `env:NAME`, or a material's reference name optionally
//! truncated as `name[:N]`. `#{param}` references are left to the param rule.

use once_cell::sync::Lazy;
use pipecfg_artifact::ErrorReport;
use pipecfg_model::Pipeline;
use regex::Regex;

use crate::chain::ValidationRule;
use crate::context::ValidationContext;

const MAX_LABEL_LENGTH: usize = 255;

pub(crate) const LABEL_FORMAT: &str = "Label should be composed of alphanumeric text, it can contain \
     the build number as ${COUNT}, can contain a material revision as ${<material-name>} of \
     ${<material-name>[:<number>]}, or use params as #{<param-name>}.";

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("label token regex must compile"));
static PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\{[^}]*\}").expect("label param regex must compile"));
static LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-A-Za-z0-9_.]*$").expect("label literal regex must compile"));
static MATERIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-A-Za-z0-9_.]+)(?:\[:([0-9]+)\])?$").expect("label material regex must compile")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct LabelTemplateRules;

/// Problems with one pipeline's label template
pub(crate) fn label_errors(pipeline: &Pipeline) -> Vec<String> {
    let label = pipeline.label_template.as_str();
    if label.chars().count() > MAX_LABEL_LENGTH {
        return vec![format!("Label template should not exceed {MAX_LABEL_LENGTH} characters.")];
    }
    let tokens: Vec<&str> = TOKEN
        .captures_iter(label)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let without_tokens = TOKEN.replace_all(label, "");
    let literal = PARAM.replace_all(&without_tokens, "");
    if tokens.is_empty() || !LITERAL.is_match(&literal) {
        return vec![format!("Invalid label '{label}'. {LABEL_FORMAT}")];
    }

    let mut errors = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("COUNT") {
            continue;
        }
        if token.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("env:")) {
            continue;
        }
        let Some(captures) = MATERIAL.captures(token) else {
            errors.push(format!("Invalid label '{label}'. {LABEL_FORMAT}"));
            continue;
        };
        let name = captures.get(1).map_or("", |m| m.as_str());
        let known = pipeline
            .materials
            .iter()
            .filter_map(pipecfg_model::Material::reference_name)
            .any(|n| n.matches(name));
        if !known {
            errors.push(format!(
                "You have defined a label template in pipeline '{}' that refers to a material \
                 called '{name}', but no material with this name is defined.",
                pipeline.name
            ));
        }
    }
    errors
}

impl ValidationRule for LabelTemplateRules {
    fn name(&self) -> &'static str {
        "label-template"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        for (pipeline, path) in ctx.pipelines() {
            for message in label_errors(pipeline) {
                report.add(&path, "labelTemplate", message);
            }
        }
    }
}
