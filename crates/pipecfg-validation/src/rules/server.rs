//! Server block, timers and authorization references

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{Authorization, SecurityConfig};

use crate::chain::ValidationRule;
use crate::context::ValidationContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerRules;

fn check_roles(
    authorization: &Authorization,
    security: &SecurityConfig,
    path: &EntityPath,
    field: &str,
    report: &mut ErrorReport,
) {
    for role in &authorization.roles {
        if security.role(role).is_none() {
            report.add(path, field, format!("Role \"{role}\" does not exist."));
        }
    }
}

impl ValidationRule for ServerRules {
    fn name(&self) -> &'static str {
        "server"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        let server = &graph.server;
        let root = EntityPath::root();

        if server.artifacts_dir.trim().is_empty() {
            report.add(&root, "artifactsDir", "Please provide a not empty value for artifactsdir");
        }
        match (server.purge_start_gb, server.purge_upto_gb) {
            (Some(start), Some(upto)) if start >= upto => report.add(
                &root,
                "purgeStart",
                format!(
                    "Error in artifact cleanup values. The trigger value ({start}GB) should be less \
                     than the goal ({upto}GB)"
                ),
            ),
            (Some(_), None) | (None, Some(_)) => report.add(
                &root,
                "purgeStart",
                "Error in artifact cleanup values. Please specify both values",
            ),
            _ => {}
        }

        let security = &server.security;
        for group in &graph.pipeline_groups {
            let path = crate::context::path_of(group, &root);
            check_roles(&group.authorization, security, &path, "authorization", report);
        }
        for (template, path) in ctx.templates() {
            check_roles(&template.authorization, security, &path, "authorization", report);
        }
        for site in ctx.declared_stages() {
            check_roles(&site.stage.approval.authorization, security, &site.path, "approval", report);
        }

        for (pipeline, path) in ctx.pipelines() {
            let Some(timer) = &pipeline.timer else {
                continue;
            };
            let fields = timer.spec.split_whitespace().count();
            if !(6..=7).contains(&fields) {
                report.add(
                    &path,
                    "timer",
                    format!(
                        "Invalid cron syntax for pipeline '{}': '{}' must have 6 or 7 fields \
                         (seconds minutes hours day-of-month month day-of-week [year])",
                        pipeline.name, timer.spec
                    ),
                );
            }
        }
    }
}
