//! Job placement and run type
//!
//! Elastic profile references are resolved on the effective walk only: a
//! template job is checked inside every pipeline that uses the template, and
//! never on its own.

use pipecfg_artifact::ErrorReport;

use crate::chain::ValidationRule;
use crate::context::ValidationContext;

const RUN_ON_ALL_MARKER: &str = "-runonall-";
const RUN_INSTANCE_MARKER: &str = "-runinstance-";

#[derive(Debug, Clone, Copy, Default)]
pub struct JobRules;

impl ValidationRule for JobRules {
    fn name(&self) -> &'static str {
        "jobs"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        for site in ctx.declared_stages() {
            if site.stage.jobs.is_empty() {
                report.add(
                    &site.path,
                    "jobs",
                    format!("Stage '{}' must have at least one job.", site.stage.name),
                );
            }
        }

        for site in ctx.declared_jobs() {
            let job = site.job;
            let name = job.name.normalized();

            if name.contains(RUN_ON_ALL_MARKER) && !job.run_on_all_agents {
                report.add(
                    &site.path,
                    "name",
                    format!(
                        "A job cannot have 'runOnAll' in it's name: {} because it is a reserved keyword",
                        job.name
                    ),
                );
            }
            if name.contains(RUN_INSTANCE_MARKER) && job.run_instance_count.is_none() {
                report.add(
                    &site.path,
                    "name",
                    format!(
                        "A job cannot have 'runInstance' in it's name: {} because it is a reserved keyword",
                        job.name
                    ),
                );
            }

            if job.run_on_all_agents && job.run_instance_count.is_some() {
                report.add(
                    &site.path,
                    "runType",
                    "Job cannot be 'run on all agents' type and 'run multiple instance' type together.",
                );
            }
            if job.run_instance_count == Some(0) {
                report.add(&site.path, "runType", "'Run Instance Count' must be greater than 0.");
            }

            if job.elastic_profile_id.is_some() {
                if !job.resources.is_empty() {
                    report.add(
                        &site.path,
                        "elasticProfileId",
                        "Job cannot have both `resource` and `elasticProfileId`",
                    );
                }
                if job.run_on_all_agents {
                    report.add(
                        &site.path,
                        "runType",
                        "Job cannot be set to 'run on all agents' when assigned to an elastic agent",
                    );
                }
            }

            if job.resources.iter().any(|r| r.trim().is_empty()) {
                report.add(&site.path, "resources", "Resource name cannot be blank.");
            }
        }

        let graph = ctx.graph();
        for site in ctx.effective_jobs() {
            let Some(profile) = site.job.elastic_profile_id.as_deref() else {
                continue;
            };
            if profile.trim().is_empty() {
                report.add(&site.path, "elasticProfileId", "Elastic profile id cannot be blank.");
            } else if graph.find_elastic_profile(profile).is_none() {
                report.add(
                    &site.path,
                    "elasticProfileId",
                    format!("No profile defined corresponding to profile_id '{profile}'"),
                );
            }
        }
    }
}
