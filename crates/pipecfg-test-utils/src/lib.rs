//! Testing utilities for the pipecfg workspace
//!
//! Graph fixtures ("mothers") shared by the tests of every crate.

#![allow(missing_docs)]

use pipecfg_artifact::CaseInsensitiveName;
use pipecfg_model::{
    Agent, ConfigGraph, ConfigProperty, ConfigRepo, DependencyMaterial, ElasticProfile,
    Environment, ExecTask, FetchTask, GitMaterial, Job, Material, Pipeline, PipelineGroup,
    RepoOrigin, ScmSettings, Stage, Task, TaskKind,
};

/// Group every fixture pipeline lands in
pub const DEFAULT_GROUP: &str = "defaultGroup";

pub fn git(url: &str) -> Material {
    Material::Git(GitMaterial {
        url: url.to_owned(),
        branch: "master".to_owned(),
        shallow_clone: false,
        settings: ScmSettings::default(),
    })
}

pub fn git_at(url: &str, destination: &str) -> Material {
    let mut material = git(url);
    if let Material::Git(git) = &mut material {
        git.settings.destination = Some(destination.to_owned());
    }
    material
}

pub fn dependency(pipeline: &str, stage: &str) -> Material {
    Material::Dependency(DependencyMaterial {
        name: None,
        pipeline: pipeline.into(),
        stage: stage.into(),
    })
}

pub fn exec(command: &str) -> Task {
    Task::new(TaskKind::Exec(ExecTask {
        command: command.to_owned(),
        arguments: Vec::new(),
        working_directory: None,
    }))
}

/// Fetch of `src` into `dest` from `pipeline/stage/job`
pub fn fetch(pipeline: Option<&str>, stage: &str, job: &str) -> Task {
    Task::new(TaskKind::Fetch(FetchTask {
        pipeline: pipeline.map(str::to_owned),
        stage: stage.to_owned(),
        job: job.to_owned(),
        source: "src".to_owned(),
        is_file: false,
        destination: Some("dest".to_owned()),
    }))
}

pub fn job(name: &str) -> Job {
    let mut job = Job::named(name);
    job.tasks.push(exec("make"));
    job
}

pub fn stage(name: &str, jobs: &[&str]) -> Stage {
    let mut stage = Stage::named(name);
    stage.jobs = jobs.iter().map(|j| job(j)).collect();
    stage
}

pub fn pipeline(name: &str, materials: Vec<Material>, stages: Vec<Stage>) -> Pipeline {
    let mut pipeline = Pipeline::named(name);
    pipeline.materials = materials;
    pipeline.stages = stages;
    pipeline
}

/// One git material, one stage `stage` with one job `job`
pub fn simple_pipeline(name: &str) -> Pipeline {
    pipeline(
        name,
        vec![git(&format!("https://example.com/{name}.git"))],
        vec![stage("stage", &["job"])],
    )
}

pub fn group(name: &str, pipelines: Vec<Pipeline>) -> PipelineGroup {
    PipelineGroup {
        name: name.into(),
        pipelines,
        ..PipelineGroup::default()
    }
}

/// Graph with the given pipelines in [`DEFAULT_GROUP`]
pub fn graph_with(pipelines: Vec<Pipeline>) -> ConfigGraph {
    ConfigGraph {
        pipeline_groups: vec![group(DEFAULT_GROUP, pipelines)],
        ..ConfigGraph::default()
    }
}

pub fn environment(name: &str, pipelines: &[&str], agents: &[&str]) -> Environment {
    let mut env = Environment::named(name);
    env.pipelines = pipelines.iter().map(|p| CaseInsensitiveName::new(*p)).collect();
    env.agents = agents.iter().map(|a| (*a).to_owned()).collect();
    env
}

pub fn agent(uuid: &str) -> Agent {
    Agent {
        uuid: uuid.to_owned(),
        hostname: format!("{uuid}.local"),
        ip_address: "10.0.0.1".to_owned(),
        resources: Vec::new(),
    }
}

pub fn elastic_profile(id: &str, plugin_id: &str) -> ElasticProfile {
    ElasticProfile {
        id: id.to_owned(),
        plugin_id: plugin_id.to_owned(),
        properties: vec![ConfigProperty::plain("Image", "alpine")],
    }
}

pub fn config_repo(id: &str, url: &str) -> ConfigRepo {
    ConfigRepo {
        id: id.to_owned(),
        plugin_id: "json.config.plugin".to_owned(),
        material: git(url),
    }
}

/// Origin of a partial parsed from `repo` at `revision`
pub fn repo_origin(repo: &ConfigRepo, revision: &str) -> RepoOrigin {
    RepoOrigin {
        repo_id: repo.id.clone(),
        fingerprint: repo.material.fingerprint(),
        revision: revision.to_owned(),
    }
}

/// Append a task to an existing job
///
/// # Panics
/// Panics if the pipeline, stage or job does not exist
pub fn add_task(graph: &mut ConfigGraph, pipeline: &str, stage: &str, job: &str, task: Task) {
    let pipeline = graph.find_pipeline_mut(pipeline).expect("fixture pipeline");
    let stage = pipeline
        .stages
        .iter_mut()
        .find(|s| s.name.matches(stage))
        .expect("fixture stage");
    let job = stage
        .jobs
        .iter_mut()
        .find(|j| j.name.matches(job))
        .expect("fixture job");
    job.tasks.push(task);
}

/// Four pipelines in a chain plus bystanders
///
/// ```text
/// uppest_stream [uppest-stage1, uppest-stage2, uppest-stage3]
///     ↓ uppest-stage2
/// upstream [up-stage1, up-stage2]
///     ↓ up-stage1
/// downstream [stage]
///     ↓ stage
/// downest [stage]
/// ```
///
/// `random_pipeline`, `upstreams_peer` and `dummy` are unrelated. Each stage
/// `x-stageN` has one job `x-jobN`; `stage` has one job `job`.
pub fn diamond() -> ConfigGraph {
    graph_with(vec![
        pipeline(
            "random_pipeline",
            vec![git("https://example.com/random.git")],
            vec![stage("random-stage1", &["random-job1"])],
        ),
        pipeline(
            "uppest_stream",
            vec![git("https://example.com/uppest.git")],
            vec![
                stage("uppest-stage1", &["uppest-job1"]),
                stage("uppest-stage2", &["uppest-job2"]),
                stage("uppest-stage3", &["uppest-job3"]),
            ],
        ),
        pipeline(
            "upstreams_peer",
            vec![git("https://example.com/peer.git")],
            vec![stage("peer-stage", &["peer-job"])],
        ),
        pipeline(
            "upstream",
            vec![dependency("uppest_stream", "uppest-stage2")],
            vec![
                stage("up-stage1", &["up-job1"]),
                stage("up-stage2", &["up-job2"]),
            ],
        ),
        pipeline(
            "downstream",
            vec![dependency("upstream", "up-stage1")],
            vec![stage("stage", &["job"])],
        ),
        pipeline(
            "downest",
            vec![dependency("downstream", "stage")],
            vec![stage("stage", &["job"])],
        ),
        simple_pipeline("dummy"),
    ])
}
