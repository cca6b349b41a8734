//! Visitors over the raw document shape shared by migration steps
//!
//! Steps work on untyped JSON because older documents do not deserialize into
//! the current model. Every visitor hands out the element and its JSON pointer.

use serde_json::Value as JsonValue;

use crate::error::TransformError;

type Visit<'f> = &'f mut dyn FnMut(&mut JsonValue, &str) -> Result<(), TransformError>;

/// Elements of the array under `key`, if any
fn elements<'a>(
    parent: &'a mut JsonValue,
    key: &str,
) -> impl Iterator<Item = (usize, &'a mut JsonValue)> + 'a {
    parent
        .get_mut(key)
        .and_then(JsonValue::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut().enumerate())
}

/// Every pipeline of every group
pub(super) fn each_pipeline(doc: &mut JsonValue, visit: Visit<'_>) -> Result<(), TransformError> {
    for (g, group) in elements(doc, "pipelineGroups") {
        for (p, pipeline) in elements(group, "pipelines") {
            visit(pipeline, &format!("/pipelineGroups/{g}/pipelines/{p}"))?;
        }
    }
    Ok(())
}

/// Every stage, of pipelines and of templates
pub(super) fn each_stage(doc: &mut JsonValue, visit: Visit<'_>) -> Result<(), TransformError> {
    each_pipeline(doc, &mut |pipeline, path| {
        for (s, stage) in elements(pipeline, "stages") {
            visit(stage, &format!("{path}/stages/{s}"))?;
        }
        Ok(())
    })?;
    for (t, template) in elements(doc, "templates") {
        for (s, stage) in elements(template, "stages") {
            visit(stage, &format!("/templates/{t}/stages/{s}"))?;
        }
    }
    Ok(())
}

/// Every task, including on-cancel tasks
pub(super) fn each_task(doc: &mut JsonValue, visit: Visit<'_>) -> Result<(), TransformError> {
    each_stage(doc, &mut |stage, path| {
        for (j, job) in elements(stage, "jobs") {
            for (t, task) in elements(job, "tasks") {
                let task_path = format!("{path}/jobs/{j}/tasks/{t}");
                visit(task, &task_path)?;
                if let Some(on_cancel) = task.get_mut("onCancel") {
                    visit(on_cancel, &format!("{task_path}/onCancel"))?;
                }
            }
        }
        Ok(())
    })
}

/// Every material: pipeline materials and config repository materials
pub(super) fn each_material(doc: &mut JsonValue, visit: Visit<'_>) -> Result<(), TransformError> {
    each_pipeline(doc, &mut |pipeline, path| {
        for (m, material) in elements(pipeline, "materials") {
            visit(material, &format!("{path}/materials/{m}"))?;
        }
        Ok(())
    })?;
    for (r, repo) in elements(doc, "configRepos") {
        if let Some(material) = repo.get_mut("material") {
            visit(material, &format!("/configRepos/{r}/material"))?;
        }
    }
    Ok(())
}

/// Rename `from` to `to` on an object, keeping an existing `to`
pub(super) fn rename_key(element: &mut JsonValue, from: &str, to: &str) {
    if let Some(object) = element.as_object_mut() {
        if let Some(value) = object.remove(from) {
            object.entry(to).or_insert(value);
        }
    }
}
