//! Materials: identity, destinations, references
//!
//! Material identity is its fingerprint, so two copies of the same material
//! in one pipeline share an error path and are reported once.

use indexmap::IndexMap;
use pipecfg_artifact::{ContentHash, EntityPath, ErrorReport};
use pipecfg_model::{ConfigRepo, Keyed, Material, Pipeline};

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};
use crate::rules::{duplicates, normalize_dir, stays_inside};

const DESTINATION_COLLISION: &str = "Invalid Destination Directory. Every material needs a \
     different destination directory and the directories should not be nested.";

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialRules;

impl ValidationRule for MaterialRules {
    fn name(&self) -> &'static str {
        "materials"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        // fingerprint -> every scm use, with its autoUpdate flag
        let mut auto_update: IndexMap<ContentHash, Vec<(bool, EntityPath, &Material)>> = IndexMap::new();

        for (pipeline, path) in ctx.pipelines() {
            if pipeline.materials.is_empty() {
                report.add(
                    &path,
                    "materials",
                    format!("Pipeline '{}' must have at least one material.", pipeline.name),
                );
            }
            check_identity(pipeline, &path, report);
            check_destinations(pipeline, &path, report);

            for material in &pipeline.materials {
                let material_path = path_of(material, &path);
                check_fields(material, &material_path, report);
                match material {
                    Material::Package(package) if graph.find_package(&package.package_ref).is_none() => {
                        report.add(
                            &material_path,
                            "packageRef",
                            format!("Could not find repository for given package id:[{}]", package.package_ref),
                        );
                    }
                    Material::Plugin(plugin) if graph.find_scm(&plugin.scm_ref).is_none() => {
                        report.add(
                            &material_path,
                            "scmRef",
                            format!("Could not find plugin for given pluggable id:[{}].", plugin.scm_ref),
                        );
                    }
                    _ => {}
                }
                if material.is_scm() {
                    auto_update
                        .entry(material.fingerprint())
                        .or_default()
                        .push((material.auto_update(), material_path, material));
                }
            }
        }

        for uses in auto_update.values() {
            let Some((first, _, material)) = uses.first() else {
                continue;
            };
            if uses.iter().all(|(flag, _, _)| flag == first) {
                continue;
            }
            let message = format!(
                "Material of type {} ({}) is specified more than once in the configuration with \
                 different values for the autoUpdate attribute. All copies of this material must \
                 have the same value for this attribute.",
                material.kind_name(),
                material.describe()
            );
            for (_, path, _) in uses {
                report.add(path, "autoUpdate", message.clone());
            }
        }

        check_config_repos(&graph.config_repos, report);
    }
}

fn check_fields(material: &Material, path: &EntityPath, report: &mut ErrorReport) {
    let url = match material {
        Material::Git(m) => Some(&m.url),
        Material::Hg(m) => Some(&m.url),
        Material::Svn(m) => Some(&m.url),
        _ => None,
    };
    if url.is_some_and(|u| u.trim().is_empty()) {
        report.add(path, "url", "URL cannot be blank");
    }
    if let Material::P4(p4) = material {
        if p4.port.trim().is_empty() {
            report.add(path, "port", "P4 port cannot be empty.");
        }
        if p4.view.trim().is_empty() {
            report.add(path, "view", "P4 view cannot be empty.");
        }
    }
}

fn check_identity(pipeline: &Pipeline, path: &EntityPath, report: &mut ErrorReport) {
    let fingerprints = pipeline.materials.iter().filter_map(|m| m.key().map(|k| (k, m)));
    for (_, copies) in duplicates(fingerprints) {
        report.add(
            &path_of(copies[0], path),
            "url",
            format!(
                "Pipeline '{}' has the same material configured more than once: {}.",
                pipeline.name,
                copies[0].describe()
            ),
        );
    }

    let names = pipeline
        .materials
        .iter()
        .filter_map(|m| m.reference_name().map(|n| (n.normalized(), m)));
    for (name, copies) in duplicates(names) {
        for copy in copies.iter().skip(1) {
            report.add(
                &path_of(*copy, path),
                "materialName",
                format!(
                    "You have defined multiple materials called '{name}'. Material names are \
                     case-insensitive and must be unique. Note that for dependency materials the \
                     default materialName is the name of the upstream pipeline. You can override \
                     this by setting the materialName explicitly for the upstream pipeline."
                ),
            );
        }
    }
}

fn check_destinations(pipeline: &Pipeline, path: &EntityPath, report: &mut ErrorReport) {
    let scm: Vec<&Material> = pipeline.materials.iter().filter(|m| m.is_scm()).collect();

    for material in &scm {
        if let Some(dest) = material.destination().filter(|d| !stays_inside(d)) {
            report.add(
                &path_of(*material, path),
                "destination",
                format!("Dest folder '{dest}' is not valid. It must be a sub-directory of the working folder."),
            );
        }
    }

    if scm.len() < 2 {
        return;
    }
    for material in &scm {
        if material.destination().map_or(true, |d| normalize_dir(d).is_empty()) {
            report.add(
                &path_of(*material, path),
                "destination",
                "Destination directory is required when a pipeline has multiple SCM materials.",
            );
        }
    }
    let dirs: Vec<(String, &Material)> = scm
        .iter()
        .filter_map(|m| m.destination().map(|d| (normalize_dir(d), *m)))
        .filter(|(d, _)| !d.is_empty())
        .collect();
    for (i, (a, first)) in dirs.iter().enumerate() {
        for (b, second) in &dirs[i + 1..] {
            if nested(a, b) || nested(b, a) {
                report.add(&path_of(*first, path), "destination", DESTINATION_COLLISION);
                report.add(&path_of(*second, path), "destination", DESTINATION_COLLISION);
            }
        }
    }
}

fn nested(outer: &str, inner: &str) -> bool {
    inner == outer || inner.strip_prefix(outer).is_some_and(|rest| rest.starts_with('/'))
}

fn check_config_repos(repos: &[ConfigRepo], report: &mut ErrorReport) {
    let root = EntityPath::root();
    let ids = repos.iter().filter_map(|r| r.key().map(|k| (k, r)));
    for (id, _) in duplicates(ids) {
        report.add(
            &EntityPath::of(ConfigRepo::COLLECTION, id.clone()),
            "id",
            format!("You have defined multiple configuration repositories with the same id - '{id}'."),
        );
    }
    let materials = repos.iter().map(|r| (r.material.fingerprint().to_string(), r));
    for (_, copies) in duplicates(materials) {
        for repo in copies.iter().skip(1) {
            report.add(
                &path_of(*repo, &root),
                "material",
                format!(
                    "You have defined multiple configuration repositories with the same repository - {}.",
                    repo.material.describe()
                ),
            );
        }
    }
    for repo in repos {
        if repo.plugin_id.trim().is_empty() {
            report.add(&path_of(repo, &root), "pluginId", "Configuration repository plugin id cannot be blank.");
        }
    }
}
