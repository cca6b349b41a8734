//! The standard migration steps, one per schema version

use pipecfg_artifact::ContentHash;
use pipecfg_model::DEFAULT_LABEL_TEMPLATE;
use serde_json::{json, Value as JsonValue};

use super::walk::{each_material, each_pipeline, each_stage, each_task, rename_key};
use super::Migration;
use crate::error::TransformError;

/// v2: material `folder` is now `destination`
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameFolderToDestination;

impl Migration for RenameFolderToDestination {
    fn target_version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "rename material folder to destination"
    }

    fn apply(&self, doc: &mut JsonValue) -> Result<(), TransformError> {
        each_material(doc, &mut |material, _| {
            rename_key(material, "folder", "destination");
            Ok(())
        })
    }
}

/// v3: pipeline `dependsOn` entries become dependency materials
#[derive(Debug, Clone, Copy, Default)]
pub struct DependsOnToMaterials;

impl Migration for DependsOnToMaterials {
    fn target_version(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "convert dependsOn to dependency materials"
    }

    fn apply(&self, doc: &mut JsonValue) -> Result<(), TransformError> {
        each_pipeline(doc, &mut |pipeline, path| {
            let Some(object) = pipeline.as_object_mut() else {
                return Ok(());
            };
            let Some(depends_on) = object.remove("dependsOn") else {
                return Ok(());
            };
            let JsonValue::Array(entries) = depends_on else {
                return Err(TransformError::malformed(
                    format!("{path}/dependsOn"),
                    "dependsOn must be a list",
                ));
            };

            let mut converted = Vec::with_capacity(entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let pipeline = entry.get("pipeline").and_then(JsonValue::as_str);
                let stage = entry.get("stage").and_then(JsonValue::as_str);
                let (Some(pipeline), Some(stage)) = (pipeline, stage) else {
                    return Err(TransformError::malformed(
                        format!("{path}/dependsOn/{i}"),
                        "dependency needs a pipeline and a stage",
                    ));
                };
                converted.push(json!({"type": "dependency", "pipeline": pipeline, "stage": stage}));
            }

            match object.entry("materials").or_insert_with(|| json!([])) {
                JsonValue::Array(materials) => materials.extend(converted),
                _ => {
                    return Err(TransformError::malformed(
                        format!("{path}/materials"),
                        "materials must be a list",
                    ))
                }
            }
            Ok(())
        })
    }
}

/// v4: boolean `isLocked` becomes `lockBehavior`
#[derive(Debug, Clone, Copy, Default)]
pub struct LockBehaviorFromIsLocked;

impl Migration for LockBehaviorFromIsLocked {
    fn target_version(&self) -> u32 {
        4
    }

    fn description(&self) -> &'static str {
        "replace isLocked with lockBehavior"
    }

    fn apply(&self, doc: &mut JsonValue) -> Result<(), TransformError> {
        each_pipeline(doc, &mut |pipeline, path| {
            let Some(object) = pipeline.as_object_mut() else {
                return Ok(());
            };
            let Some(locked) = object.remove("isLocked") else {
                return Ok(());
            };
            let behavior = match locked {
                JsonValue::Bool(true) => "lockOnFailure",
                JsonValue::Bool(false) | JsonValue::Null => "none",
                _ => {
                    return Err(TransformError::malformed(
                        format!("{path}/isLocked"),
                        "isLocked must be a boolean",
                    ))
                }
            };
            object.entry("lockBehavior").or_insert_with(|| json!(behavior));
            Ok(())
        })
    }
}

/// v5: exec `args` string is split into `arguments`; `encrypted_password`
/// is spelled `encryptedPassword`
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitExecArguments;

impl Migration for SplitExecArguments {
    fn target_version(&self) -> u32 {
        5
    }

    fn description(&self) -> &'static str {
        "split exec args into arguments"
    }

    fn apply(&self, doc: &mut JsonValue) -> Result<(), TransformError> {
        each_task(doc, &mut |task, path| {
            if task.get("type").and_then(JsonValue::as_str) != Some("exec") {
                return Ok(());
            }
            let Some(object) = task.as_object_mut() else {
                return Ok(());
            };
            let Some(args) = object.remove("args") else {
                return Ok(());
            };
            let JsonValue::String(args) = args else {
                return Err(TransformError::malformed(
                    format!("{path}/args"),
                    "args must be a string",
                ));
            };
            let arguments: Vec<JsonValue> = args.split_whitespace().map(|a| json!(a)).collect();
            object.entry("arguments").or_insert(JsonValue::Array(arguments));
            Ok(())
        })?;
        each_material(doc, &mut |material, _| {
            rename_key(material, "encrypted_password", "encryptedPassword");
            Ok(())
        })
    }
}

/// v6: default stage approval and label template; assign a server id
///
/// The server id is derived from the document content, so migrating the
/// same document twice yields the same id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultApprovalsAndServerId;

impl Migration for DefaultApprovalsAndServerId {
    fn target_version(&self) -> u32 {
        6
    }

    fn description(&self) -> &'static str {
        "default stage approvals, label templates and server id"
    }

    fn apply(&self, doc: &mut JsonValue) -> Result<(), TransformError> {
        let seed = ContentHash::compute_canonical(doc);

        each_stage(doc, &mut |stage, _| {
            if let Some(object) = stage.as_object_mut() {
                object.entry("approval").or_insert_with(|| json!({"type": "success"}));
            }
            Ok(())
        })?;
        each_pipeline(doc, &mut |pipeline, _| {
            if let Some(object) = pipeline.as_object_mut() {
                object
                    .entry("labelTemplate")
                    .or_insert_with(|| json!(DEFAULT_LABEL_TEMPLATE));
            }
            Ok(())
        })?;

        let Some(root) = doc.as_object_mut() else {
            return Err(TransformError::malformed("", "document root must be an object"));
        };
        let server = root
            .entry("server")
            .or_insert_with(|| json!({"artifactsDir": "artifacts"}));
        let Some(server) = server.as_object_mut() else {
            return Err(TransformError::malformed("/server", "server must be an object"));
        };
        if !server.contains_key("serverId") {
            server.insert("serverId".to_owned(), json!(server_id_from(&seed)));
        }
        Ok(())
    }
}

fn server_id_from(seed: &ContentHash) -> String {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&seed.as_bytes()[..16]);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pipeline_doc(pipeline: JsonValue) -> JsonValue {
        json!({"pipelineGroups": [{"name": "g", "pipelines": [pipeline]}]})
    }

    #[test]
    fn folder_becomes_destination() {
        let mut doc = pipeline_doc(json!({"name": "p", "materials": [{"type": "git", "url": "u", "folder": "src"}]}));
        doc["configRepos"] = json!([{"id": "r", "pluginId": "yaml", "material": {"type": "git", "url": "c", "folder": "x"}}]);
        RenameFolderToDestination.apply(&mut doc).unwrap();
        assert_eq!(doc["pipelineGroups"][0]["pipelines"][0]["materials"][0]["destination"], "src");
        assert_eq!(doc["configRepos"][0]["material"]["destination"], "x");
        assert!(doc["configRepos"][0]["material"].get("folder").is_none());
    }

    #[test]
    fn depends_on_appends_dependency_materials() {
        let mut doc = pipeline_doc(json!({
            "name": "down",
            "materials": [{"type": "git", "url": "u"}],
            "dependsOn": [{"pipeline": "up", "stage": "dist"}]
        }));
        DependsOnToMaterials.apply(&mut doc).unwrap();
        let pipeline = &doc["pipelineGroups"][0]["pipelines"][0];
        assert!(pipeline.get("dependsOn").is_none());
        assert_eq!(
            pipeline["materials"][1],
            json!({"type": "dependency", "pipeline": "up", "stage": "dist"})
        );
    }

    #[test]
    fn depends_on_without_stage_is_malformed() {
        let mut doc = pipeline_doc(json!({"name": "down", "dependsOn": [{"pipeline": "up"}]}));
        let err = DependsOnToMaterials.apply(&mut doc).unwrap_err();
        assert!(
            matches!(err, TransformError::Malformed { ref path, .. } if path == "/pipelineGroups/0/pipelines/0/dependsOn/0")
        );
    }

    #[test]
    fn is_locked_maps_to_lock_behavior() {
        let mut doc = json!({"pipelineGroups": [{"name": "g", "pipelines": [
            {"name": "a", "isLocked": true},
            {"name": "b", "isLocked": false},
            {"name": "c"}
        ]}]});
        LockBehaviorFromIsLocked.apply(&mut doc).unwrap();
        let pipelines = &doc["pipelineGroups"][0]["pipelines"];
        assert_eq!(pipelines[0]["lockBehavior"], "lockOnFailure");
        assert_eq!(pipelines[1]["lockBehavior"], "none");
        assert!(pipelines[2].get("lockBehavior").is_none());
    }

    #[test]
    fn exec_args_split_on_whitespace() {
        let mut doc = pipeline_doc(json!({"name": "p", "stages": [{"name": "s", "jobs": [{"name": "j", "tasks": [
            {"type": "exec", "command": "make", "args": "  -j4   test "},
            {"type": "fetch", "stage": "s", "job": "j", "source": "a", "args": "untouched"}
        ]}]}]}));
        SplitExecArguments.apply(&mut doc).unwrap();
        let tasks = &doc["pipelineGroups"][0]["pipelines"][0]["stages"][0]["jobs"][0]["tasks"];
        assert_eq!(tasks[0]["arguments"], json!(["-j4", "test"]));
        assert!(tasks[0].get("args").is_none());
        assert_eq!(tasks[1]["args"], "untouched");
    }

    #[test]
    fn server_id_is_deterministic() {
        let original = pipeline_doc(json!({"name": "p", "stages": [{"name": "s"}]}));
        let mut first = original.clone();
        let mut second = original;
        DefaultApprovalsAndServerId.apply(&mut first).unwrap();
        DefaultApprovalsAndServerId.apply(&mut second).unwrap();
        assert_eq!(first, second);

        let id = first["server"]["serverId"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        let pipeline = &first["pipelineGroups"][0]["pipelines"][0];
        assert_eq!(pipeline["labelTemplate"], "${COUNT}");
        assert_eq!(pipeline["stages"][0]["approval"], json!({"type": "success"}));
    }

    #[test]
    fn existing_server_id_is_kept() {
        let mut doc = json!({"server": {"artifactsDir": "a", "serverId": "keep-me"}});
        DefaultApprovalsAndServerId.apply(&mut doc).unwrap();
        assert_eq!(doc["server"]["serverId"], "keep-me");
    }
}
