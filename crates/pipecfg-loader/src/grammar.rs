//! The current document grammar, as a JSON Schema (draft 2020-12)
//!
//! Only the current schema version is described. Each definition is built by
//! its own function so the whole grammar reads top-down.

use serde_json::{json, Map, Value as JsonValue};

use crate::migration::CURRENT_SCHEMA_VERSION;

/// Identity names: pipelines, stages, jobs, groups, templates, environments
pub const NAME_PATTERN: &str = r"^[a-zA-Z0-9_\-][a-zA-Z0-9_\-.]*$";

/// Longest allowed identity name
pub const NAME_MAX_LENGTH: usize = 255;

const DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

fn def(name: &str) -> JsonValue {
    json!({"$ref": format!("#/$defs/{name}")})
}

fn list_of(name: &str) -> JsonValue {
    json!({"type": "array", "items": def(name)})
}

fn object(required: &[&str], properties: JsonValue) -> JsonValue {
    json!({
        "type": "object",
        "required": required,
        "properties": properties,
        "additionalProperties": false
    })
}

/// Tagged union: `type` selects exactly one variant definition
fn tagged(variants: &[(&str, &str)]) -> JsonValue {
    let tags: Vec<&str> = variants.iter().map(|(tag, _)| *tag).collect();
    let branches: Vec<JsonValue> = variants
        .iter()
        .map(|(tag, name)| {
            json!({
                "if": {"required": ["type"], "properties": {"type": {"const": tag}}},
                "then": def(name)
            })
        })
        .collect();
    json!({
        "type": "object",
        "required": ["type"],
        "properties": {"type": {"enum": tags}},
        "allOf": branches
    })
}

fn scm_material(tag: &str, required: &[&str], mut own: JsonValue) -> JsonValue {
    if let Some(props) = own.as_object_mut() {
        props.insert("type".into(), json!({"const": tag}));
        props.insert("name".into(), def("name"));
        props.insert("destination".into(), json!({"type": "string"}));
        props.insert("autoUpdate".into(), json!({"type": "boolean"}));
        props.insert("filter".into(), def("stringList"));
    }
    object(required, own)
}

fn task_variant(tag: &str, required: &[&str], mut own: JsonValue) -> JsonValue {
    if let Some(props) = own.as_object_mut() {
        props.insert("type".into(), json!({"const": tag}));
        props.insert(
            "runIf".into(),
            json!({"type": "array", "items": {"enum": ["passed", "failed", "any"]}}),
        );
        props.insert("onCancel".into(), def("cancelTask"));
    }
    object(required, own)
}

fn primitives(defs: &mut Map<String, JsonValue>) {
    defs.insert(
        "name".into(),
        json!({"type": "string", "pattern": NAME_PATTERN, "maxLength": NAME_MAX_LENGTH}),
    );
    defs.insert("id".into(), json!({"type": "string", "minLength": 1}));
    defs.insert("stringList".into(), json!({"type": "array", "items": {"type": "string"}}));
    defs.insert(
        "property".into(),
        object(
            &["key"],
            json!({
                "key": {"type": "string", "minLength": 1},
                "value": {"type": "string"},
                "encryptedValue": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "environmentVariable".into(),
        object(
            &["name"],
            json!({
                "name": {"type": "string"},
                "value": {"type": "string"},
                "encryptedValue": {"type": "string"},
                "secure": {"type": "boolean"}
            }),
        ),
    );
    defs.insert(
        "authorization".into(),
        object(&[], json!({"admins": def("stringList"), "roles": def("stringList")})),
    );
}

fn materials(defs: &mut Map<String, JsonValue>) {
    defs.insert(
        "gitMaterial".into(),
        scm_material(
            "git",
            &["type", "url"],
            json!({
                "url": {"type": "string", "minLength": 1},
                "branch": {"type": "string"},
                "shallowClone": {"type": "boolean"}
            }),
        ),
    );
    defs.insert(
        "hgMaterial".into(),
        scm_material(
            "hg",
            &["type", "url"],
            json!({"url": {"type": "string", "minLength": 1}, "branch": {"type": "string"}}),
        ),
    );
    defs.insert(
        "svnMaterial".into(),
        scm_material(
            "svn",
            &["type", "url"],
            json!({
                "url": {"type": "string", "minLength": 1},
                "username": {"type": "string"},
                "password": {"type": "string"},
                "encryptedPassword": {"type": "string"},
                "checkExternals": {"type": "boolean"}
            }),
        ),
    );
    defs.insert(
        "p4Material".into(),
        scm_material(
            "p4",
            &["type", "port", "view"],
            json!({
                "port": {"type": "string", "minLength": 1},
                "view": {"type": "string", "minLength": 1},
                "useTickets": {"type": "boolean"},
                "username": {"type": "string"},
                "password": {"type": "string"},
                "encryptedPassword": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "pluginMaterial".into(),
        scm_material("plugin", &["type", "ref"], json!({"ref": def("id")})),
    );
    defs.insert(
        "dependencyMaterial".into(),
        object(
            &["type", "pipeline", "stage"],
            json!({
                "type": {"const": "dependency"},
                "name": def("name"),
                "pipeline": def("name"),
                "stage": def("name")
            }),
        ),
    );
    defs.insert(
        "packageMaterial".into(),
        object(
            &["type", "ref"],
            json!({"type": {"const": "package"}, "name": def("name"), "ref": def("id")}),
        ),
    );
    defs.insert(
        "material".into(),
        tagged(&[
            ("git", "gitMaterial"),
            ("hg", "hgMaterial"),
            ("svn", "svnMaterial"),
            ("p4", "p4Material"),
            ("dependency", "dependencyMaterial"),
            ("package", "packageMaterial"),
            ("plugin", "pluginMaterial"),
        ]),
    );
}

fn tasks(defs: &mut Map<String, JsonValue>) {
    defs.insert(
        "execTask".into(),
        task_variant(
            "exec",
            &["type", "command"],
            json!({
                "command": {"type": "string"},
                "arguments": def("stringList"),
                "workingDirectory": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "buildTask".into(),
        task_variant(
            "build",
            &["type", "tool"],
            json!({
                "tool": {"enum": ["ant", "nant", "rake"]},
                "buildFile": {"type": "string"},
                "target": {"type": "string"},
                "workingDirectory": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "fetchTask".into(),
        task_variant(
            "fetch",
            &["type", "stage", "job", "source"],
            json!({
                "pipeline": {"type": "string"},
                "stage": {"type": "string"},
                "job": {"type": "string"},
                "source": {"type": "string"},
                "isFile": {"type": "boolean"},
                "destination": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "pluggableTask".into(),
        task_variant(
            "pluggable",
            &["type", "pluginId"],
            json!({"pluginId": {"type": "string"}, "configuration": list_of("property")}),
        ),
    );
    defs.insert(
        "task".into(),
        tagged(&[
            ("exec", "execTask"),
            ("build", "buildTask"),
            ("fetch", "fetchTask"),
            ("pluggable", "pluggableTask"),
        ]),
    );
    // an on-cancel task may not carry its own on-cancel task
    defs.insert(
        "cancelTask".into(),
        json!({"allOf": [def("task")], "not": {"required": ["onCancel"]}}),
    );
}

fn build_hierarchy(defs: &mut Map<String, JsonValue>) {
    defs.insert(
        "artifact".into(),
        object(
            &["type", "source"],
            json!({
                "type": {"enum": ["build", "test"]},
                "source": {"type": "string", "minLength": 1},
                "destination": {"type": "string"}
            }),
        ),
    );
    defs.insert(
        "job".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "resources": def("stringList"),
                "elasticProfileId": {"type": "string"},
                "runOnAllAgents": {"type": "boolean"},
                "runInstanceCount": {"type": "integer", "minimum": 0},
                "timeout": {"type": "integer", "minimum": 0},
                "environmentVariables": list_of("environmentVariable"),
                "tasks": list_of("task"),
                "artifacts": list_of("artifact")
            }),
        ),
    );
    defs.insert(
        "approval".into(),
        object(
            &["type"],
            json!({"type": {"enum": ["success", "manual"]}, "authorization": def("authorization")}),
        ),
    );
    defs.insert(
        "stage".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "fetchMaterials": {"type": "boolean"},
                "cleanWorkingDir": {"type": "boolean"},
                "artifactCleanupProhibited": {"type": "boolean"},
                "approval": def("approval"),
                "environmentVariables": list_of("environmentVariable"),
                "jobs": list_of("job")
            }),
        ),
    );
    defs.insert(
        "pipeline".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "labelTemplate": {"type": "string"},
                "lockBehavior": {"enum": ["none", "lockOnFailure", "unlockWhenFinished"]},
                "template": def("name"),
                "timer": object(
                    &["spec"],
                    json!({"spec": {"type": "string"}, "onlyOnChanges": {"type": "boolean"}})
                ),
                "params": {"type": "array", "items": object(
                    &["name"],
                    json!({"name": {"type": "string"}, "value": {"type": "string"}})
                )},
                "environmentVariables": list_of("environmentVariable"),
                "materials": list_of("material"),
                "stages": list_of("stage")
            }),
        ),
    );
}

fn top_level(defs: &mut Map<String, JsonValue>) {
    defs.insert(
        "pipelineGroup".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "authorization": def("authorization"),
                "pipelines": list_of("pipeline")
            }),
        ),
    );
    defs.insert(
        "template".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "authorization": def("authorization"),
                "stages": list_of("stage")
            }),
        ),
    );
    defs.insert(
        "environment".into(),
        object(
            &["name"],
            json!({
                "name": def("name"),
                "agents": def("stringList"),
                "pipelines": {"type": "array", "items": def("name")},
                "environmentVariables": list_of("environmentVariable")
            }),
        ),
    );
    defs.insert(
        "agent".into(),
        object(
            &["uuid", "hostname", "ipAddress"],
            json!({
                "uuid": def("id"),
                "hostname": {"type": "string"},
                "ipAddress": {"type": "string"},
                "resources": def("stringList")
            }),
        ),
    );
    defs.insert(
        "elasticProfile".into(),
        object(
            &["id", "pluginId"],
            json!({"id": def("name"), "pluginId": {"type": "string"}, "properties": list_of("property")}),
        ),
    );
    defs.insert(
        "packageDefinition".into(),
        object(
            &["id", "name"],
            json!({"id": def("id"), "name": {"type": "string"}, "configuration": list_of("property")}),
        ),
    );
    defs.insert(
        "packageRepository".into(),
        object(
            &["id", "name", "pluginId"],
            json!({
                "id": def("id"),
                "name": {"type": "string"},
                "pluginId": {"type": "string"},
                "configuration": list_of("property"),
                "packages": list_of("packageDefinition")
            }),
        ),
    );
    defs.insert(
        "scm".into(),
        object(
            &["id", "name", "pluginId"],
            json!({
                "id": def("id"),
                "name": {"type": "string"},
                "pluginId": {"type": "string"},
                "autoUpdate": {"type": "boolean"},
                "configuration": list_of("property")
            }),
        ),
    );
    defs.insert(
        "configRepo".into(),
        object(
            &["id", "pluginId", "material"],
            json!({"id": def("id"), "pluginId": {"type": "string"}, "material": def("material")}),
        ),
    );
    defs.insert(
        "server".into(),
        object(
            &[],
            json!({
                "artifactsDir": {"type": "string"},
                "purgeStartGb": {"type": "integer", "minimum": 0},
                "purgeUptoGb": {"type": "integer", "minimum": 0},
                "serverId": {"type": "string", "format": "uuid"},
                "security": object(&[], json!({
                    "admins": def("stringList"),
                    "roles": {"type": "array", "items": object(
                        &["name"],
                        json!({"name": def("name"), "users": def("stringList")})
                    )}
                }))
            }),
        ),
    );
}

/// All named definitions
#[must_use]
pub fn definitions() -> Map<String, JsonValue> {
    let mut defs = Map::new();
    primitives(&mut defs);
    materials(&mut defs);
    tasks(&mut defs);
    build_hierarchy(&mut defs);
    top_level(&mut defs);
    defs
}

/// Grammar of a whole document at [`CURRENT_SCHEMA_VERSION`]
#[must_use]
pub fn document_schema() -> JsonValue {
    json!({
        "$schema": DIALECT,
        "$defs": definitions(),
        "type": "object",
        "required": ["schemaVersion"],
        "properties": {
            "schemaVersion": {"const": CURRENT_SCHEMA_VERSION},
            "server": def("server"),
            "elasticProfiles": list_of("elasticProfile"),
            "configRepos": list_of("configRepo"),
            "pipelineGroups": list_of("pipelineGroup"),
            "templates": list_of("template"),
            "environments": list_of("environment"),
            "agents": list_of("agent"),
            "repositories": list_of("packageRepository"),
            "scms": list_of("scm")
        },
        "additionalProperties": false
    })
}

/// Grammar of a detached element, e.g. `"pipeline"`
#[must_use]
pub fn fragment_schema(element: &str) -> JsonValue {
    json!({"$schema": DIALECT, "$defs": definitions(), "$ref": format!("#/$defs/{element}")})
}
