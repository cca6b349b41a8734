//! Fetch-artifact reachability
//!
//! A fetch task in pipeline `P` names a path of ancestors `a1/a2/.../ak`:
//! `ak` is a direct upstream of `P`, each `ai` an upstream of `ai+1`, and `a1`
//! is the pipeline fetched from. Every hop must be a declared dependency
//! material. The hop into `a1` pins one of its stages; only that stage and
//! the stages before it are guaranteed to have completed when `P` runs, so
//! only those may be fetched from.
//!
//! Without a path (or with `P` itself as the path) the fetch is from an
//! earlier stage of the same pipeline.
//!
//! ```text
//! uppest [s1, s2, s3] --s2--> upstream [u1, u2] --u1--> downstream
//!
//! downstream fetching "uppest/upstream" s2: ok
//! downstream fetching "uppest/upstream" s3: does not complete before
//! ```

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{FetchTask, Pipeline, Stage};

use crate::chain::ValidationRule;
use crate::context::{path_of, JobSite, ValidationContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchArtifactRules;

impl ValidationRule for FetchArtifactRules {
    fn name(&self) -> &'static str {
        "fetch-artifact"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        for site in ctx.effective_jobs() {
            let Some(pipeline) = site.owner.pipeline() else {
                continue;
            };
            for task in &site.job.tasks {
                let Some(fetch) = task.as_fetch() else {
                    continue;
                };
                if fetch.stage.trim().is_empty() || fetch.job.trim().is_empty() {
                    continue;
                }
                let path = path_of(task, &site.path);
                let check = Check {
                    ctx,
                    site: &site,
                    pipeline,
                    fetch,
                    path: &path,
                };
                check.run(report);
            }
        }
    }
}

struct Check<'c, 'g> {
    ctx: &'c ValidationContext<'g>,
    site: &'c JobSite<'g>,
    pipeline: &'g Pipeline,
    fetch: &'c FetchTask,
    path: &'c EntityPath,
}

impl<'g> Check<'_, 'g> {
    fn triple(&self) -> String {
        self.site.triple()
    }

    fn run(&self, report: &mut ErrorReport) {
        let ancestors = self.fetch.pipeline_path();
        let same_pipeline = match ancestors.as_slice() {
            [] => true,
            [only] => self.pipeline.name.matches(only),
            _ => false,
        };
        if same_pipeline {
            self.from_own_stage(report);
        } else {
            self.from_ancestor(&ancestors, report);
        }
    }

    fn from_own_stage(&self, report: &mut ErrorReport) {
        let stages = self.site.stages;
        let Some(index) = stages.iter().position(|s| s.name.matches(&self.fetch.stage)) else {
            report.add(
                self.path,
                "stage",
                format!(
                    "{} tries to fetch artifact from stage \"{} :: {}\" which does not exist.",
                    self.triple(),
                    self.pipeline.name,
                    self.fetch.stage
                ),
            );
            return;
        };
        if index >= self.site.stage_index {
            report.add(
                self.path,
                "stage",
                format!(
                    "{} tries to fetch artifact from its stage \"{}\" which does not complete \
                     before the current stage \"{}\".",
                    self.triple(),
                    self.fetch.stage,
                    self.site.stage.name
                ),
            );
            return;
        }
        self.job_exists(self.pipeline.name.as_str(), &stages[index], report);
    }

    fn from_ancestor(&self, ancestors: &[&str], report: &mut ErrorReport) {
        let declared = ancestors.join("/");
        let mut current = self.pipeline;
        let mut pinned: Vec<&str> = Vec::new();

        for hop in ancestors.iter().rev() {
            let Some(upstream) = self.ctx.pipeline(hop) else {
                report.add(
                    self.path,
                    "pipeline",
                    format!(
                        "{} tries to fetch artifact from pipeline \"{hop}\" which does not exist.",
                        self.triple()
                    ),
                );
                return;
            };
            let pins: Vec<&str> = current
                .dependencies_on(upstream.name.as_str())
                .map(|d| d.stage.as_str())
                .collect();
            if pins.is_empty() {
                let message = if ancestors.len() == 1 {
                    format!(
                        "Pipeline \"{}\" tries to fetch artifact from pipeline \"{hop}\" which is not \
                         an upstream pipeline",
                        self.pipeline.name
                    )
                } else {
                    format!(
                        "Pipeline named '{hop}' exists, but is not an ancestor of '{}' as declared \
                         in '{declared}'.",
                        self.pipeline.name
                    )
                };
                report.add(self.path, "pipeline", message);
                return;
            }
            pinned = pins;
            current = upstream;
        }

        let source = current;
        let stages = self.ctx.graph().effective_stages(source);
        let source_name = ancestors[0];
        let Some(index) = stages.iter().position(|s| s.name.matches(&self.fetch.stage)) else {
            report.add(
                self.path,
                "stage",
                format!(
                    "{} tries to fetch artifact from stage \"{source_name} :: {}\" which does not exist.",
                    self.triple(),
                    self.fetch.stage
                ),
            );
            return;
        };
        let latest_pinned = pinned
            .iter()
            .filter_map(|p| stages.iter().position(|s| s.name.matches(p)))
            .max();
        // an unresolvable pin is the dependency rule's to report
        if latest_pinned.is_some_and(|latest| index > latest) {
            report.add(
                self.path,
                "stage",
                format!(
                    "{} tries to fetch artifact from stage \"{source_name} :: {}\" which does not \
                     complete before \"{}\" pipeline's dependencies.",
                    self.triple(),
                    self.fetch.stage,
                    self.pipeline.name
                ),
            );
            return;
        }
        if !self.job_exists(source_name, &stages[index], report) {
            return;
        }
        if self.pipeline.origin.is_local() && !source.origin.is_local() {
            report.add(
                self.path,
                "pipeline",
                format!(
                    "{} tries to fetch artifact from job \"{source_name} :: {} :: {}\" which is \
                     defined in {} - reference is not allowed",
                    self.triple(),
                    self.fetch.stage,
                    self.fetch.job,
                    source.origin
                ),
            );
        }
    }

    fn job_exists(&self, pipeline: &str, stage: &Stage, report: &mut ErrorReport) -> bool {
        if stage.job(&self.fetch.job).is_some() {
            return true;
        }
        report.add(
            self.path,
            "job",
            format!(
                "{} tries to fetch artifact from job \"{pipeline} :: {} :: {}\" which does not exist.",
                self.triple(),
                self.fetch.stage,
                self.fetch.job
            ),
        );
        false
    }
}
