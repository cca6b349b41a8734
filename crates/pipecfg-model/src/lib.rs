//! pipecfg Configuration Model
//!
//! The typed, in-memory configuration graph every other crate works on.
//!
//! # Core Concepts
//!
//! - [`ConfigGraph`]: root value. Cloning yields a fully independent copy.
//! - [`Pipeline`] / [`Stage`] / [`Job`] / [`Task`]: the build hierarchy
//! - [`Material`]: closed sum of source types, identified by fingerprint
//! - [`ConfigOrigin`]: whether an entity is local or from a config repository
//! - [`Keyed`]: identity keys used to file errors under [`EntityPath`]s
//! - [`EntityRef`]: command target, with its [`VersionToken`]
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_model::{ConfigGraph, EntityRef};
//!
//! let graph: ConfigGraph = serde_json::from_value(value)?;
//! let token = graph.version_token(&EntityRef::Pipeline("build".into()))?;
//! for pipeline in graph.pipelines() {
//!     println!("{} has {} stages", pipeline.name, graph.effective_stages(pipeline).len());
//! }
//! ```
//!
//! [`EntityPath`]: pipecfg_artifact::EntityPath
//! [`VersionToken`]: pipecfg_artifact::VersionToken

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod environment;
mod graph;
mod keyed;
mod material;
mod origin;
mod pipeline;
mod plugin;
mod task;

pub use environment::{Agent, Environment, Template};
pub use graph::{ConfigGraph, Role, SecurityConfig, ServerConfig};
pub use keyed::{EntityRef, Keyed};
pub use material::{
    DependencyMaterial, GitMaterial, HgMaterial, Material, P4Material, PackageMaterial,
    PluggableScmMaterial, ScmSettings, SvnMaterial,
};
pub use origin::{ConfigOrigin, RepoOrigin};
pub use pipeline::{
    Approval, ApprovalType, ArtifactConfig, ArtifactKind, Authorization, EnvironmentVariable, Job,
    LockBehavior, Param, Pipeline, PipelineGroup, Stage, Timer, DEFAULT_LABEL_TEMPLATE,
};
pub use plugin::{
    ConfigProperty, ConfigRepo, ElasticProfile, PackageDefinition, PackageRepository, Scm,
};
pub use task::{
    BuildTask, BuildTool, CancelTask, ExecTask, FetchTask, PluggableTask, RunIf, Task, TaskKind,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pipecfg_artifact::EntityPath;
    use serde_json::json;

    fn sample() -> ConfigGraph {
        serde_json::from_value(json!({
            "server": {"artifactsDir": "artifacts"},
            "pipelineGroups": [{
                "name": "first",
                "pipelines": [{
                    "name": "Build",
                    "materials": [{"type": "git", "url": "https://example.com/app.git"}],
                    "stages": [{
                        "name": "compile",
                        "jobs": [{"name": "unit", "tasks": [{"type": "exec", "command": "make"}]}]
                    }]
                }]
            }],
            "environments": [{"name": "uat", "pipelines": ["build"]}]
        }))
        .unwrap()
    }

    #[test]
    fn clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.find_pipeline_mut("build").unwrap().stages.clear();
        assert_eq!(original.find_pipeline("build").unwrap().stages.len(), 1);
    }

    #[test]
    fn job_path_built_from_keys() {
        let graph = sample();
        let pipeline = graph.find_pipeline("BUILD").unwrap();
        let stage = &pipeline.stages[0];
        let job = &stage.jobs[0];
        let path = pipeline
            .path_in(&EntityPath::root())
            .and_then(|p| stage.path_in(&p))
            .and_then(|p| job.path_in(&p))
            .unwrap();
        assert_eq!(path.to_string(), "pipelines/build/stages/compile/jobs/unit");
    }

    #[test]
    fn environment_lookup_by_pipeline() {
        let graph = sample();
        let pipeline = graph.find_pipeline("build").unwrap();
        assert_eq!(graph.environment_of(&pipeline.name).unwrap().name.as_str(), "uat");
    }
}
