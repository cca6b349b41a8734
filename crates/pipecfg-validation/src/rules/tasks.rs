//! Per-task field rules
//!
//! On-cancel tasks get the same checks as the task they belong to. They
//! cannot nest further: `CancelTask` has no on-cancel of its own.

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::TaskKind;

use crate::chain::ValidationRule;
use crate::context::{path_of, JobSite, ValidationContext};
use crate::metadata::lookup;
use crate::rules::stays_inside;

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRules;

impl ValidationRule for TaskRules {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        for site in ctx.declared_jobs() {
            for task in &site.job.tasks {
                let path = path_of(task, &site.path);
                check_kind(ctx, &site, &task.kind, &path, report);
                if let Some(cancel) = &task.on_cancel {
                    check_kind(ctx, &site, &cancel.kind, &path, report);
                }
            }
        }
    }
}

fn outside(site: &JobSite<'_>, what: &str, value: &str) -> String {
    format!(
        "Task of job '{}' in stage '{}' of {} '{}' has {what} path '{value}' which is outside the \
         working directory.",
        site.job.name,
        site.stage.name,
        site.owner.kind(),
        site.owner.name()
    )
}

fn check_kind(
    ctx: &ValidationContext<'_>,
    site: &JobSite<'_>,
    kind: &TaskKind,
    path: &EntityPath,
    report: &mut ErrorReport,
) {
    match kind {
        TaskKind::Exec(exec) => {
            if exec.command.trim().is_empty() {
                report.add(path, "command", "Command cannot be empty");
            }
            if let Some(dir) = exec.working_directory.as_deref().filter(|d| !stays_inside(d)) {
                report.add(path, "workingDirectory", outside(site, "working directory", dir));
            }
        }
        TaskKind::Build(build) => {
            if let Some(dir) = build.working_directory.as_deref().filter(|d| !stays_inside(d)) {
                report.add(path, "workingDirectory", outside(site, "working directory", dir));
            }
            if let Some(file) = build.build_file.as_deref().filter(|f| !stays_inside(f)) {
                report.add(path, "buildFile", outside(site, "build file", file));
            }
        }
        TaskKind::Fetch(fetch) => {
            if fetch.stage.trim().is_empty() {
                report.add(path, "stage", "Stage is a required field.");
            }
            if fetch.job.trim().is_empty() {
                report.add(path, "job", "Job is a required field.");
            }
            if fetch.source.trim().is_empty() {
                report.add(path, "source", "Should provide either srcdir or srcfile");
            } else if !stays_inside(&fetch.source) {
                report.add(path, "source", outside(site, "src", &fetch.source));
            }
            if let Some(dest) = fetch.destination.as_deref().filter(|d| !stays_inside(d)) {
                report.add(path, "destination", outside(site, "dest", dest));
            }
        }
        TaskKind::Pluggable(pluggable) => {
            // filed on the job: the task's key changes when secure values are encrypted
            if pluggable.plugin_id.trim().is_empty() {
                report.add(&site.path, "tasks", "Plugin id of a pluggable task cannot be blank.");
                return;
            }
            let metadata = ctx.plugins().properties(&pluggable.plugin_id);
            let Some(metadata) = metadata.as_deref() else {
                return;
            };
            for required in metadata.iter().filter(|m| m.required) {
                let present = pluggable
                    .configuration
                    .iter()
                    .any(|p| p.key == required.key && p.has_value());
                if !present {
                    report.add(
                        &site.path,
                        "tasks",
                        format!("{} must not be blank for plugin '{}'.", required.label(), pluggable.plugin_id),
                    );
                }
            }
            for property in &pluggable.configuration {
                if lookup(Some(metadata), &property.key).is_none() {
                    report.add(
                        &site.path,
                        "tasks",
                        format!(
                            "Configuration key '{}' is not supported by plugin '{}'.",
                            property.key, pluggable.plugin_id
                        ),
                    );
                }
            }
        }
    }
}
