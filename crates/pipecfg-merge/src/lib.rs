//! pipecfg Merge Engine
//!
//! Builds the effective configuration from the local document plus the
//! partial configurations parsed from config repositories.
//!
//! # Core Concepts
//!
//! - [`PartialConfig`]: a graph fragment with its repository origin
//! - [`MergeEngine`]: stamps provenance and assembles the effective graph
//! - [`MergedGraph`]: the effective graph, its editable (local-only) view,
//!   and which partials were accepted or dropped
//! - [`ensure_local_only`]: guard run before anything is written locally
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_merge::{ensure_local_only, MergeEngine};
//!
//! let merged = MergeEngine::new().merge(&local, &partials)?;
//! let mut editable = merged.editable_view();
//! editable.environments.push(env);
//! ensure_local_only(&editable)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;

pub use engine::{ensure_local_only, MergeEngine, MergedGraph, PartialConfig};
pub use error::{MergeError, MergeResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pipecfg_model::ConfigGraph;
    use pipecfg_test_utils::{config_repo, graph_with, group, repo_origin, simple_pipeline};

    #[test]
    fn partials_apply_in_order_and_keep_their_revision() {
        let mut local = graph_with(vec![]);
        local.config_repos.push(config_repo("a", "https://example.com/a.git"));
        local.config_repos.push(config_repo("b", "https://example.com/b.git"));

        let partial = |repo: usize, revision: &str, pipeline: &str| {
            let mut graph = ConfigGraph::default();
            graph.pipeline_groups.push(group("remote", vec![simple_pipeline(pipeline)]));
            PartialConfig::new(repo_origin(&local.config_repos[repo], revision), graph)
        };
        let partials = [partial(1, "b-1", "from-b"), partial(0, "a-7", "from-a")];

        let merged = MergeEngine::new().merge(&local, &partials).unwrap();
        let names: Vec<_> = merged.effective().pipelines().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["from-b", "from-a"]);

        let from_a = merged.effective().find_pipeline("from-a").unwrap();
        assert_eq!(from_a.origin.repository().unwrap().revision, "a-7");
        assert_eq!(partials[1].repo_id(), "a");
    }

    #[test]
    fn duplicates_across_sources_are_kept_for_validation() {
        let mut local = graph_with(vec![simple_pipeline("shared")]);
        local.config_repos.push(config_repo("a", "https://example.com/a.git"));
        let mut remote = ConfigGraph::default();
        remote
            .pipeline_groups
            .push(group("remote", vec![simple_pipeline("SHARED")]));
        let partial = PartialConfig::new(repo_origin(&local.config_repos[0], "r"), remote);

        let merged = MergeEngine::new().merge(&local, &[partial]).unwrap();
        assert_eq!(merged.effective().pipelines().count(), 2);
    }
}
