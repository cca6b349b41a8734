//! Secure value resolution
//!
//! Runs before the rules. Every value that plugin metadata (or the variable
//! itself) marks secure ends up encrypted; values encrypted at rest for keys
//! that are not secure are decrypted back to plain text. This is a side
//! effect on the validated copy of the graph.

use std::sync::Arc;

use pipecfg_artifact::{EntityPath, ErrorReport, SecretCipher};
use pipecfg_model::{ConfigGraph, ConfigProperty, EnvironmentVariable, Job, Material, Stage, TaskKind};
use tracing::debug;

use crate::chain::Preprocessor;
use crate::context::path_of;
use crate::metadata::{lookup, PluginMetadataStore, PropertyMetadata};

pub(crate) const BOTH_VALUES: &str = "You may only specify `value` or `encrypted_value`, not both!";

/// Encrypts secure plain values through a [`SecretCipher`]
#[derive(Debug, Clone)]
pub struct SecureValueResolver {
    cipher: Arc<dyn SecretCipher>,
}

impl SecureValueResolver {
    #[must_use]
    pub fn new(cipher: Arc<dyn SecretCipher>) -> Self {
        Self { cipher }
    }
}

impl Preprocessor for SecureValueResolver {
    fn name(&self) -> &'static str {
        "secure-values"
    }

    fn process(&self, graph: &mut ConfigGraph, plugins: &dyn PluginMetadataStore, report: &mut ErrorReport) {
        let mut pass = Pass {
            cipher: self.cipher.as_ref(),
            report,
            encrypted: 0,
        };
        let root = EntityPath::root();

        for profile in &mut graph.elastic_profiles {
            let path = path_of(&*profile, &root);
            let metadata = plugins.properties(&profile.plugin_id);
            pass.properties(&mut profile.properties, metadata.as_deref(), &Filing::Each(path));
        }

        for repo in &mut graph.repositories {
            let path = path_of(&*repo, &root);
            let metadata = plugins.properties(&repo.plugin_id);
            pass.properties(&mut repo.configuration, metadata.as_deref(), &Filing::Each(path.clone()));
            let package_metadata = plugins.package_properties(&repo.plugin_id);
            for package in &mut repo.packages {
                let package_path = path_of(&*package, &path);
                pass.properties(
                    &mut package.configuration,
                    package_metadata.as_deref(),
                    &Filing::Each(package_path),
                );
            }
        }

        for scm in &mut graph.scms {
            let path = path_of(&*scm, &root);
            let metadata = plugins.properties(&scm.plugin_id);
            pass.properties(&mut scm.configuration, metadata.as_deref(), &Filing::Each(path));
        }

        for environment in &mut graph.environments {
            let path = path_of(&*environment, &root);
            pass.variables(&mut environment.environment_variables, &path);
        }

        for pipeline in graph.pipeline_groups.iter_mut().flat_map(|g| g.pipelines.iter_mut()) {
            let path = path_of(&*pipeline, &root);
            pass.variables(&mut pipeline.environment_variables, &path);
            for material in &mut pipeline.materials {
                let material_path = path_of(&*material, &path);
                pass.material(material, &material_path);
            }
            pass.stages(&mut pipeline.stages, &path, plugins);
        }

        for template in &mut graph.templates {
            let path = path_of(&*template, &root);
            pass.stages(&mut template.stages, &path, plugins);
        }

        for repo in &mut graph.config_repos {
            let path = path_of(&*repo, &root);
            pass.material(&mut repo.material, &path);
        }

        debug!(encrypted = pass.encrypted, "secure values resolved");
    }
}

/// Where a property's errors are filed
enum Filing {
    /// Under the property's own path below this parent
    Each(EntityPath),
    /// On one field of this entity, naming the key in the message
    Field(EntityPath, &'static str),
}

struct Pass<'a> {
    cipher: &'a dyn SecretCipher,
    report: &'a mut ErrorReport,
    encrypted: usize,
}

impl Pass<'_> {
    fn fail(&mut self, filing: &Filing, property: &ConfigProperty, field: &str, message: &str) {
        match filing {
            Filing::Each(parent) => {
                let path = path_of(property, parent);
                self.report.add(&path, field, message);
            }
            Filing::Field(path, on) => {
                self.report.add(path, *on, format!("Property '{}': {message}", property.key));
            }
        }
    }

    fn properties(
        &mut self,
        properties: &mut [ConfigProperty],
        metadata: Option<&[PropertyMetadata]>,
        filing: &Filing,
    ) {
        for property in properties {
            if property.value.is_some() && property.encrypted_value.is_some() {
                self.fail(filing, property, "value", BOTH_VALUES);
                continue;
            }
            let secure = lookup(metadata, &property.key).is_some_and(|m| m.secure);
            if secure {
                if let Some(plain) = property.value.take() {
                    match self.cipher.encrypt(&plain) {
                        Ok(encrypted) => {
                            property.encrypted_value = Some(encrypted);
                            self.encrypted += 1;
                        }
                        Err(err) => {
                            property.value = Some(plain);
                            self.fail(filing, property, "value", &format!("Could not encrypt value: {err}"));
                        }
                    }
                }
            } else if metadata.is_some() {
                if let Some(encrypted) = property.encrypted_value.take() {
                    match self.cipher.decrypt(&encrypted) {
                        Ok(plain) => property.value = Some(plain),
                        Err(err) => {
                            property.encrypted_value = Some(encrypted);
                            let message = format!("Could not decrypt value: {err}");
                            self.fail(filing, property, "encryptedValue", &message);
                        }
                    }
                }
            }
        }
    }

    fn variables(&mut self, variables: &mut [EnvironmentVariable], parent: &EntityPath) {
        for variable in variables {
            let path = path_of(&*variable, parent);
            if variable.value.is_some() && variable.encrypted_value.is_some() {
                self.report.add(&path, "value", BOTH_VALUES);
                continue;
            }
            if variable.encrypted_value.is_some() {
                variable.secure = true;
            }
            if !variable.secure {
                continue;
            }
            if let Some(plain) = variable.value.take() {
                match self.cipher.encrypt(&plain) {
                    Ok(encrypted) => {
                        variable.encrypted_value = Some(encrypted);
                        self.encrypted += 1;
                    }
                    Err(err) => {
                        variable.value = Some(plain);
                        self.report.add(&path, "value", format!("Could not encrypt value: {err}"));
                    }
                }
            }
        }
    }

    fn material(&mut self, material: &mut Material, path: &EntityPath) {
        let (password, encrypted_password) = match material {
            Material::Svn(m) => (&mut m.password, &mut m.encrypted_password),
            Material::P4(m) => (&mut m.password, &mut m.encrypted_password),
            _ => return,
        };
        if password.is_some() && encrypted_password.is_some() {
            self.report.add(path, "password", "You may only specify `password` or `encrypted_password`, not both!");
            return;
        }
        if let Some(plain) = password.take() {
            match self.cipher.encrypt(&plain) {
                Ok(encrypted) => {
                    *encrypted_password = Some(encrypted);
                    self.encrypted += 1;
                }
                Err(err) => {
                    *password = Some(plain);
                    self.report.add(path, "password", format!("Could not encrypt password: {err}"));
                }
            }
        }
    }

    fn stages(&mut self, stages: &mut [Stage], parent: &EntityPath, plugins: &dyn PluginMetadataStore) {
        for stage in stages {
            let path = path_of(&*stage, parent);
            self.variables(&mut stage.environment_variables, &path);
            for job in &mut stage.jobs {
                let job_path = path_of(&*job, &path);
                self.job(job, &job_path, plugins);
            }
        }
    }

    fn job(&mut self, job: &mut Job, path: &EntityPath, plugins: &dyn PluginMetadataStore) {
        self.variables(&mut job.environment_variables, path);
        // a task's key is its content hash, which encryption changes
        let filing = Filing::Field(path.clone(), "tasks");
        for task in &mut job.tasks {
            if let TaskKind::Pluggable(pluggable) = &mut task.kind {
                let metadata = plugins.properties(&pluggable.plugin_id);
                self.properties(&mut pluggable.configuration, metadata.as_deref(), &filing);
            }
            if let Some(TaskKind::Pluggable(pluggable)) = task.on_cancel.as_deref_mut().map(|c| &mut c.kind) {
                let metadata = plugins.properties(&pluggable.plugin_id);
                self.properties(&mut pluggable.configuration, metadata.as_deref(), &filing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_artifact::Blake3Cipher;
    use pipecfg_model::{ElasticProfile, PluggableTask, Task};
    use pipecfg_test_utils::{add_task, elastic_profile, graph_with, simple_pipeline};

    fn setup() -> (SecureValueResolver, StaticPluginMetadata, Blake3Cipher) {
        let cipher = Blake3Cipher::from_secret(b"test-secret");
        let plugins = StaticPluginMetadata::new();
        plugins.register(
            "docker",
            vec![PropertyMetadata::new("Image"), PropertyMetadata::new("Token").secure()],
        );
        (SecureValueResolver::new(Arc::new(cipher.clone())), plugins, cipher)
    }

    fn profile(properties: Vec<ConfigProperty>) -> ElasticProfile {
        ElasticProfile {
            properties,
            ..elastic_profile("builder", "docker")
        }
    }

    #[test]
    fn secure_plain_values_are_encrypted() {
        let (resolver, plugins, cipher) = setup();
        let mut graph = graph_with(vec![]);
        graph.elastic_profiles.push(profile(vec![
            ConfigProperty::plain("Image", "alpine"),
            ConfigProperty::plain("Token", "s3cret"),
        ]));

        let mut report = ErrorReport::new();
        resolver.process(&mut graph, &plugins, &mut report);

        assert!(report.is_empty());
        let props = &graph.elastic_profiles[0].properties;
        assert_eq!(props[0].value.as_deref(), Some("alpine"));
        assert!(props[1].value.is_none());
        let encrypted = props[1].encrypted_value.as_deref().unwrap();
        assert_eq!(cipher.decrypt(encrypted).unwrap(), "s3cret");
    }

    #[test]
    fn encrypted_values_of_plain_keys_are_decrypted() {
        let (resolver, plugins, cipher) = setup();
        let mut graph = graph_with(vec![]);
        graph.elastic_profiles.push(profile(vec![ConfigProperty {
            key: "Image".into(),
            value: None,
            encrypted_value: Some(cipher.encrypt("alpine").unwrap()),
        }]));

        let mut report = ErrorReport::new();
        resolver.process(&mut graph, &plugins, &mut report);
        let image = &graph.elastic_profiles[0].properties[0];
        assert_eq!(image.value.as_deref(), Some("alpine"));
        assert!(image.encrypted_value.is_none());
    }

    #[test]
    fn both_values_is_an_error() {
        let (resolver, plugins, _) = setup();
        let mut graph = graph_with(vec![]);
        graph.elastic_profiles.push(profile(vec![ConfigProperty {
            key: "Token".into(),
            value: Some("a".into()),
            encrypted_value: Some("b".into()),
        }]));

        let mut report = ErrorReport::new();
        resolver.process(&mut graph, &plugins, &mut report);
        let path: EntityPath = "elasticProfiles/builder/properties/Token".parse().unwrap();
        assert_eq!(report.on(&path, "value"), Some(BOTH_VALUES));
    }

    #[test]
    fn secure_variables_and_task_properties_are_encrypted() {
        let (resolver, plugins, _) = setup();
        let mut pipeline = simple_pipeline("build");
        pipeline.environment_variables.push(EnvironmentVariable {
            secure: true,
            ..EnvironmentVariable::plain("PASSWORD", "pw")
        });
        let mut graph = graph_with(vec![pipeline]);
        add_task(
            &mut graph,
            "build",
            "stage",
            "job",
            Task::new(TaskKind::Pluggable(PluggableTask {
                plugin_id: "docker".into(),
                configuration: vec![ConfigProperty::plain("Token", "t")],
            })),
        );

        let mut report = ErrorReport::new();
        resolver.process(&mut graph, &plugins, &mut report);
        assert!(report.is_empty());

        let pipeline = graph.find_pipeline("build").unwrap();
        let variable = &pipeline.environment_variables[0];
        assert!(variable.value.is_none() && variable.encrypted_value.is_some());
        let TaskKind::Pluggable(task) = &pipeline.stages[0].jobs[0].tasks[1].kind else {
            panic!("expected pluggable task");
        };
        assert!(task.configuration[0].encrypted_value.is_some());
    }

    #[test]
    fn unknown_plugins_leave_values_alone() {
        let (resolver, plugins, _) = setup();
        let mut graph = graph_with(vec![]);
        graph.elastic_profiles.push(ElasticProfile {
            properties: vec![ConfigProperty::plain("Token", "t")],
            ..elastic_profile("other", "unknown")
        });
        let mut report = ErrorReport::new();
        resolver.process(&mut graph, &plugins, &mut report);
        assert_eq!(graph.elastic_profiles[0].properties[0].value.as_deref(), Some("t"));
    }
}
