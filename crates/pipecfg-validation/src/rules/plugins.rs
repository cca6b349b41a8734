//! Plugin-backed resources: elastic profiles, package repositories,
//! packages and pluggable SCMs

use std::collections::HashSet;

use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{ConfigProperty, ElasticProfile, Keyed, PackageRepository, Scm};

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};
use crate::metadata::{lookup, PropertyMetadata};
use crate::rules::duplicates;

#[derive(Debug, Clone, Copy, Default)]
pub struct PluginResourceRules;

impl ValidationRule for PluginResourceRules {
    fn name(&self) -> &'static str {
        "plugin-resources"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let graph = ctx.graph();
        let plugins = ctx.plugins();
        let root = EntityPath::root();

        unique_ids(&graph.elastic_profiles, "Elastic agent profile", report);
        for profile in &graph.elastic_profiles {
            let path = path_of(profile, &root);
            if profile.key().is_none() {
                report.add(&path, "id", "Elastic agent profile cannot have a blank id.");
            }
            plugin_id(&profile.plugin_id, "Elastic agent profile", &path, report);
            let metadata = plugins.properties(&profile.plugin_id);
            properties(&profile.properties, metadata.as_deref(), "elastic agent profile", &profile.id, &path, report);
        }

        unique_ids(&graph.repositories, "Repository", report);
        unique_names(
            graph.repositories.iter().map(|r| (r.name.as_str(), path_of(r, &root))),
            "repositories",
            report,
        );
        let mut package_ids: HashSet<String> = HashSet::new();
        for repo in &graph.repositories {
            let path = path_of(repo, &root);
            if repo.key().is_none() {
                report.add(&path, "id", "Repository cannot have a blank id.");
            }
            if repo.name.trim().is_empty() {
                report.add(&path, "name", "Repository name cannot be blank.");
            }
            plugin_id(&repo.plugin_id, "Repository", &path, report);
            let metadata = plugins.properties(&repo.plugin_id);
            properties(&repo.configuration, metadata.as_deref(), "repository", &repo.id, &path, report);

            let package_metadata = plugins.package_properties(&repo.plugin_id);
            for package in &repo.packages {
                let package_path = path_of(package, &path);
                if package.name.trim().is_empty() {
                    report.add(&package_path, "name", "Package name cannot be blank.");
                }
                if let Some(id) = package.key() {
                    if !package_ids.insert(id.clone()) {
                        report.add(&package_path, "id", format!("Package id '{id}' is not unique."));
                    }
                }
                properties(
                    &package.configuration,
                    package_metadata.as_deref(),
                    "package",
                    &package.id,
                    &package_path,
                    report,
                );
            }
            unique_names(
                repo.packages.iter().map(|p| (p.name.as_str(), path_of(p, &path))),
                "packages",
                report,
            );
            package_identity(repo, package_metadata.as_deref(), &path, report);
        }

        unique_ids(&graph.scms, "SCM", report);
        unique_names(
            graph.scms.iter().map(|s| (s.name.as_str(), path_of(s, &root))),
            "SCMs",
            report,
        );
        for scm in &graph.scms {
            let path = path_of(scm, &root);
            if scm.name.trim().is_empty() {
                report.add(&path, "name", "SCM name cannot be blank.");
            }
            plugin_id(&scm.plugin_id, "SCM", &path, report);
            let metadata = plugins.properties(&scm.plugin_id);
            properties(&scm.configuration, metadata.as_deref(), "SCM", &scm.id, &path, report);
        }
    }
}

trait Identified: Keyed {
    fn id(&self) -> &str;
}

impl Identified for ElasticProfile {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for PackageRepository {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Scm {
    fn id(&self) -> &str {
        &self.id
    }
}

fn unique_ids<T: Identified>(items: &[T], kind: &str, report: &mut ErrorReport) {
    let keyed = items.iter().filter_map(|i| i.key().map(|k| (k, i)));
    for (key, copies) in duplicates(keyed) {
        report.add(
            &EntityPath::of(T::COLLECTION, key),
            "id",
            format!("{kind} id '{}' is not unique.", copies[0].id()),
        );
    }
}

fn unique_names<'a>(
    items: impl Iterator<Item = (&'a str, EntityPath)>,
    kind: &str,
    report: &mut ErrorReport,
) {
    let named = items
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, path)| (name.to_lowercase(), (name, path)));
    for (_, copies) in duplicates(named) {
        for (name, path) in copies.iter().skip(1) {
            report.add(
                path,
                "name",
                format!(
                    "You have defined multiple {kind} called '{name}'. Names are case-insensitive \
                     and must be unique."
                ),
            );
        }
    }
}

fn plugin_id(plugin_id: &str, kind: &str, path: &EntityPath, report: &mut ErrorReport) {
    if plugin_id.trim().is_empty() {
        report.add(path, "pluginId", format!("{kind} cannot have a blank plugin id."));
    }
}

fn properties(
    properties: &[ConfigProperty],
    metadata: Option<&[PropertyMetadata]>,
    kind: &str,
    owner: &str,
    path: &EntityPath,
    report: &mut ErrorReport,
) {
    let keyed = properties.iter().filter_map(|p| p.key().map(|k| (k, p)));
    for (key, _) in duplicates(keyed) {
        report.add(
            &path.member(ConfigProperty::COLLECTION, key.clone()),
            "key",
            format!("Duplicate key '{key}' found for {kind} '{owner}'"),
        );
    }
    if properties.iter().any(|p| p.key.trim().is_empty()) {
        report.add(path, "configuration", format!("Configuration key of {kind} '{owner}' cannot be blank."));
    }
    let Some(metadata) = metadata else {
        return;
    };
    for required in metadata.iter().filter(|m| m.required) {
        let present = properties.iter().any(|p| p.key == required.key && p.has_value());
        if !present {
            report.add(path, "configuration", format!("{} must not be blank.", required.label()));
        }
    }
}

/// Identity of a package: values of its identity keys, in key order
fn identity(configuration: &[ConfigProperty], metadata: Option<&[PropertyMetadata]>) -> Vec<(String, String)> {
    let mut parts: Vec<(String, String)> = configuration
        .iter()
        .filter(|p| lookup(metadata, &p.key).map_or(metadata.is_none(), |m| m.part_of_identity))
        .map(|p| {
            let value = p.value.clone().or_else(|| p.encrypted_value.clone()).unwrap_or_default();
            (p.key.clone(), value)
        })
        .collect();
    parts.sort();
    parts
}

fn package_identity(
    repo: &PackageRepository,
    metadata: Option<&[PropertyMetadata]>,
    path: &EntityPath,
    report: &mut ErrorReport,
) {
    let identities = repo
        .packages
        .iter()
        .map(|p| (format!("{:?}", identity(&p.configuration, metadata)), p));
    for (_, copies) in duplicates(identities) {
        let first = copies[0];
        for package in copies.iter().skip(1) {
            report.add(
                &path_of(*package, path),
                "configuration",
                format!(
                    "Cannot save package or repo, found duplicate packages. [Repo Name: '{repo}', \
                     Package Name: '{}'], [Repo Name: '{repo}', Package Name: '{}']",
                    first.name,
                    package.name,
                    repo = repo.name
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_model::{ConfigGraph, PackageDefinition};
    use pipecfg_test_utils::elastic_profile;

    fn run(graph: &ConfigGraph, plugins: &StaticPluginMetadata) -> ErrorReport {
        let mut report = ErrorReport::new();
        PluginResourceRules.check(&ValidationContext::new(graph, plugins), &mut report);
        report
    }

    fn package(id: &str, name: &str, spec: &str) -> PackageDefinition {
        PackageDefinition {
            id: id.into(),
            name: name.into(),
            configuration: vec![ConfigProperty::plain("PACKAGE_SPEC", spec)],
        }
    }

    fn repo(packages: Vec<PackageDefinition>) -> PackageRepository {
        PackageRepository {
            id: "repo-1".into(),
            name: "yum-main".into(),
            plugin_id: "yum".into(),
            configuration: vec![ConfigProperty::plain("REPO_URL", "http://repo")],
            packages,
        }
    }

    #[test]
    fn duplicate_profile_ids_and_required_keys() {
        let plugins = StaticPluginMetadata::new();
        plugins.register("docker", vec![PropertyMetadata::new("Image").required(), PropertyMetadata::new("Memory").required()]);
        let mut graph = ConfigGraph::default();
        graph.elastic_profiles.push(elastic_profile("builder", "docker"));
        graph.elastic_profiles.push(elastic_profile("builder", "docker"));

        let report = run(&graph, &plugins);
        let path = EntityPath::of("elasticProfiles", "builder");
        let errors = report.errors_for(&path).unwrap();
        assert_eq!(errors.on("id"), Some("Elastic agent profile id 'builder' is not unique."));
        assert_eq!(errors.all_on("configuration"), ["Memory must not be blank."]);
    }

    #[test]
    fn packages_with_same_identity_are_duplicates() {
        let plugins = StaticPluginMetadata::new();
        plugins.register_package("yum", vec![PropertyMetadata::new("PACKAGE_SPEC")]);
        let mut graph = ConfigGraph::default();
        graph.repositories.push(repo(vec![
            package("p1", "gcc", "gcc-4.*"),
            package("p2", "gcc-again", "gcc-4.*"),
            package("p3", "make", "make-3.*"),
        ]));

        let report = run(&graph, &plugins);
        let path: EntityPath = "repositories/repo-1/packages/p2".parse().unwrap();
        assert_eq!(
            report.on(&path, "configuration"),
            Some("Cannot save package or repo, found duplicate packages. [Repo Name: 'yum-main', Package Name: 'gcc'], [Repo Name: 'yum-main', Package Name: 'gcc-again']")
        );
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn duplicate_property_keys() {
        let mut profile = elastic_profile("builder", "docker");
        profile.properties.push(ConfigProperty::plain("Image", "ubuntu"));
        let graph = ConfigGraph {
            elastic_profiles: vec![profile],
            ..ConfigGraph::default()
        };
        let report = run(&graph, &StaticPluginMetadata::new());
        assert_eq!(
            report.on(&"elasticProfiles/builder/properties/Image".parse().unwrap(), "key"),
            Some("Duplicate key 'Image' found for elastic agent profile 'builder'")
        );
    }
}
