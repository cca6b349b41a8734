//! Merge Engine
//!
//! Combines the locally edited graph with the partial graphs parsed from
//! config repositories. Every pipeline, environment and template of the
//! result carries its [`ConfigOrigin`]; the merge itself never rejects
//! conflicts, it only assembles. Duplicate names across sources are left for
//! the semantic validators to report.

use std::collections::HashSet;

use pipecfg_artifact::ContentHash;
use pipecfg_model::{ConfigGraph, ConfigOrigin, EntityRef, RepoOrigin};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MergeError, MergeResult};

/// Graph parsed from one config repository at one revision
///
/// Only pipeline groups, environments and templates are taken from a
/// partial; other collections belong to the local document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    pub origin: RepoOrigin,
    pub graph: ConfigGraph,
}

impl PartialConfig {
    /// Partial with the given origin
    #[inline]
    #[must_use]
    pub fn new(origin: RepoOrigin, graph: ConfigGraph) -> Self {
        Self { origin, graph }
    }

    /// Id of the repository it came from
    #[inline]
    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.origin.repo_id
    }
}

/// Effective graph plus what went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedGraph {
    effective: ConfigGraph,
    local: ConfigGraph,
    accepted: Vec<RepoOrigin>,
    dropped: Vec<RepoOrigin>,
}

impl MergedGraph {
    /// Union of local and accepted partial entities
    #[inline]
    #[must_use]
    pub fn effective(&self) -> &ConfigGraph {
        &self.effective
    }

    /// Take the effective graph
    #[inline]
    #[must_use]
    pub fn into_effective(self) -> ConfigGraph {
        self.effective
    }

    /// Copy of the graph containing only locally defined entities
    ///
    /// The only view of the configuration that may be edited and written
    /// back to the local document.
    #[must_use]
    pub fn editable_view(&self) -> ConfigGraph {
        self.local.clone()
    }

    /// Partials that were merged
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> &[RepoOrigin] {
        &self.accepted
    }

    /// Partials skipped because no config repo declares their material
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> &[RepoOrigin] {
        &self.dropped
    }

    /// Origin of a pipeline, environment or template in the effective graph
    ///
    /// Other entity kinds only exist locally.
    #[must_use]
    pub fn origin_of(&self, entity: &EntityRef) -> Option<ConfigOrigin> {
        let graph = &self.effective;
        match entity {
            EntityRef::Pipeline(name) => graph.find_pipeline(name.as_str()).map(|p| p.origin.clone()),
            EntityRef::Environment(name) => {
                graph.find_environment(name.as_str()).map(|e| e.origin.clone())
            }
            EntityRef::Template(name) => graph.find_template(name.as_str()).map(|t| t.origin.clone()),
            other => graph.contains(other).then_some(ConfigOrigin::Local),
        }
    }
}

/// Assembles effective graphs
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    /// Create merge engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Merge a local graph with config repository partials
    ///
    /// Partials are applied in the order given. A partial whose origin
    /// fingerprint matches none of the local graph's config repos is dropped.
    ///
    /// # Errors
    /// Returns [`MergeError::AlreadyMerged`] if `local` already holds a
    /// repository entity
    pub fn merge(&self, local: &ConfigGraph, partials: &[PartialConfig]) -> MergeResult<MergedGraph> {
        if let Some((entity, origin)) = local.first_non_local() {
            return Err(MergeError::AlreadyMerged { entity, origin: origin.clone() });
        }

        let mut local = local.clone();
        stamp(&mut local, &ConfigOrigin::Local);

        let declared: HashSet<ContentHash> = local
            .config_repos
            .iter()
            .map(|repo| repo.material.fingerprint())
            .collect();

        let mut effective = local.clone();
        let mut accepted = Vec::new();
        let mut dropped = Vec::new();

        for partial in partials {
            if !declared.contains(&partial.origin.fingerprint) {
                warn!(
                    repo = %partial.origin.repo_id,
                    revision = %partial.origin.revision,
                    "dropping partial from an undeclared config repository"
                );
                dropped.push(partial.origin.clone());
                continue;
            }
            let mut graph = partial.graph.clone();
            stamp(&mut graph, &ConfigOrigin::Repository(partial.origin.clone()));
            absorb(&mut effective, graph);
            debug!(repo = %partial.origin.repo_id, revision = %partial.origin.revision, "partial merged");
            accepted.push(partial.origin.clone());
        }

        info!(
            accepted = accepted.len(),
            dropped = dropped.len(),
            pipelines = effective.pipelines().count(),
            "configuration merged"
        );
        Ok(MergedGraph {
            effective,
            local,
            accepted,
            dropped,
        })
    }
}

/// Refuse a graph bound for the local document if it holds repository entities
///
/// # Errors
/// Returns [`MergeError::NonLocalEntity`] naming the first such entity
pub fn ensure_local_only(graph: &ConfigGraph) -> MergeResult<()> {
    match graph.first_non_local() {
        Some((entity, origin)) => Err(MergeError::NonLocalEntity {
            entity,
            origin: origin.clone(),
        }),
        None => Ok(()),
    }
}

fn stamp(graph: &mut ConfigGraph, origin: &ConfigOrigin) {
    for pipeline in graph.pipeline_groups.iter_mut().flat_map(|g| g.pipelines.iter_mut()) {
        pipeline.origin = origin.clone();
    }
    for environment in &mut graph.environments {
        environment.origin = origin.clone();
    }
    for template in &mut graph.templates {
        template.origin = origin.clone();
    }
}

/// Add a partial's entities; same-named groups share one container
fn absorb(effective: &mut ConfigGraph, partial: ConfigGraph) {
    for group in partial.pipeline_groups {
        match effective
            .pipeline_groups
            .iter_mut()
            .find(|g| g.name == group.name)
        {
            Some(existing) => existing.pipelines.extend(group.pipelines),
            None => effective.pipeline_groups.push(group),
        }
    }
    effective.environments.extend(partial.environments);
    effective.templates.extend(partial.templates);
}
