//! Read-only view of the graph shared by all rules
//!
//! Besides the graph itself the context offers the walks most rules need:
//! every stage and job with its owner and error path. Two walks exist:
//!
//! - *declared*: pipelines' own stages plus templates' stages, filed under
//!   the pipeline or template that declares them
//! - *effective*: for each pipeline, the stages it actually runs (its own or
//!   its template's), filed under the pipeline
//!
//! Rules that depend on the surrounding pipeline (fetch ordering, params,
//! elastic profiles) use the effective walk, so a template is checked at
//! every point of use.

use std::collections::HashMap;

use pipecfg_artifact::EntityPath;
use pipecfg_model::{ConfigGraph, Job, Keyed, Pipeline, Stage, Template};

use crate::metadata::PluginMetadataStore;

/// Path of a keyed entity below `parent`; blank identities get an empty key
pub(crate) fn path_of<K: Keyed>(entity: &K, parent: &EntityPath) -> EntityPath {
    entity
        .path_in(parent)
        .unwrap_or_else(|| parent.member(K::COLLECTION, ""))
}

/// Declaring entity of a stage
#[derive(Debug, Clone, Copy)]
pub enum Owner<'g> {
    Pipeline(&'g Pipeline),
    Template(&'g Template),
}

impl<'g> Owner<'g> {
    /// Owner name as written
    #[must_use]
    pub fn name(&self) -> &'g str {
        match self {
            Self::Pipeline(p) => p.name.as_str(),
            Self::Template(t) => t.name.as_str(),
        }
    }

    /// "pipeline" or "template"
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Template(_) => "template",
        }
    }

    /// The pipeline, when the owner is one
    #[must_use]
    pub const fn pipeline(&self) -> Option<&'g Pipeline> {
        match self {
            Self::Pipeline(p) => Some(p),
            Self::Template(_) => None,
        }
    }
}

/// A stage with where it lives
#[derive(Debug, Clone)]
pub struct StageSite<'g> {
    pub owner: Owner<'g>,
    pub stages: &'g [Stage],
    pub index: usize,
    pub stage: &'g Stage,
    pub path: EntityPath,
}

/// A job with where it lives
#[derive(Debug, Clone)]
pub struct JobSite<'g> {
    pub owner: Owner<'g>,
    pub stages: &'g [Stage],
    pub stage_index: usize,
    pub stage: &'g Stage,
    pub job: &'g Job,
    pub path: EntityPath,
}

impl JobSite<'_> {
    /// `"pipeline :: stage :: job"` identity used in messages
    #[must_use]
    pub fn triple(&self) -> String {
        format!("\"{} :: {} :: {}\"", self.owner.name(), self.stage.name, self.job.name)
    }
}

/// Shared state for one validation pass
#[derive(Debug)]
pub struct ValidationContext<'g> {
    graph: &'g ConfigGraph,
    plugins: &'g dyn PluginMetadataStore,
    pipelines: HashMap<String, &'g Pipeline>,
}

impl<'g> ValidationContext<'g> {
    /// Context over a graph
    #[must_use]
    pub fn new(graph: &'g ConfigGraph, plugins: &'g dyn PluginMetadataStore) -> Self {
        let mut pipelines = HashMap::new();
        for pipeline in graph.pipelines() {
            pipelines.entry(pipeline.name.normalized()).or_insert(pipeline);
        }
        Self {
            graph,
            plugins,
            pipelines,
        }
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &'g ConfigGraph {
        self.graph
    }

    #[inline]
    #[must_use]
    pub fn plugins(&self) -> &'g dyn PluginMetadataStore {
        self.plugins
    }

    /// First pipeline with this name, case-insensitively
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&'g Pipeline> {
        self.pipelines.get(&name.to_lowercase()).copied()
    }

    /// Every pipeline with its path
    pub fn pipelines(&self) -> impl Iterator<Item = (&'g Pipeline, EntityPath)> + 'g {
        let root = EntityPath::root();
        self.graph.pipelines().map(move |p| (p, path_of(p, &root)))
    }

    /// Every template with its path
    pub fn templates(&self) -> impl Iterator<Item = (&'g Template, EntityPath)> + 'g {
        let root = EntityPath::root();
        self.graph.templates.iter().map(move |t| (t, path_of(t, &root)))
    }

    /// Stages as declared by pipelines and templates
    #[must_use]
    pub fn declared_stages(&self) -> Vec<StageSite<'g>> {
        let pipelines = self
            .pipelines()
            .map(|(p, path)| (Owner::Pipeline(p), p.stages.as_slice(), path));
        let templates = self
            .templates()
            .map(|(t, path)| (Owner::Template(t), t.stages.as_slice(), path));
        pipelines.chain(templates).flat_map(|(o, s, p)| sites(o, s, &p)).collect()
    }

    /// Stages each pipeline runs, templates resolved
    #[must_use]
    pub fn effective_stages(&self) -> Vec<StageSite<'g>> {
        let graph = self.graph;
        self.pipelines()
            .flat_map(|(p, path)| sites(Owner::Pipeline(p), graph.effective_stages(p), &path))
            .collect()
    }

    /// Jobs as declared by pipelines and templates
    #[must_use]
    pub fn declared_jobs(&self) -> Vec<JobSite<'g>> {
        jobs_of(self.declared_stages())
    }

    /// Jobs each pipeline runs, templates resolved
    #[must_use]
    pub fn effective_jobs(&self) -> Vec<JobSite<'g>> {
        jobs_of(self.effective_stages())
    }
}

fn sites<'g>(owner: Owner<'g>, stages: &'g [Stage], parent: &EntityPath) -> Vec<StageSite<'g>> {
    stages
        .iter()
        .enumerate()
        .map(|(index, stage)| StageSite {
            owner,
            stages,
            index,
            stage,
            path: path_of(stage, parent),
        })
        .collect()
}

fn jobs_of(stages: Vec<StageSite<'_>>) -> Vec<JobSite<'_>> {
    stages
        .into_iter()
        .flat_map(|site| {
            site.stage.jobs.iter().map(move |job| JobSite {
                owner: site.owner,
                stages: site.stages,
                stage_index: site.index,
                stage: site.stage,
                job,
                path: path_of(job, &site.path),
            })
        })
        .collect()
}
