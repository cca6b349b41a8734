//! The standard rule set
//!
//! Each rule is a standalone type. [`standard`] lists them in chain order;
//! the order only affects how errors accumulate, never which are found.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::chain::ValidationRule;

mod dependencies;
mod environments;
mod fetch;
mod jobs;
mod labels;
mod materials;
mod names;
mod params;
mod plugins;
mod server;
mod tasks;
mod templates;
mod uniqueness;

pub use dependencies::DependencyRules;
pub use environments::{EnvironmentRules, EnvironmentVariableRules};
pub use fetch::FetchArtifactRules;
pub use jobs::JobRules;
pub use labels::LabelTemplateRules;
pub use materials::MaterialRules;
pub use names::NameFormat;
pub use params::ParamRules;
pub use plugins::PluginResourceRules;
pub use server::ServerRules;
pub use tasks::TaskRules;
pub use templates::TemplateRules;
pub use uniqueness::{PipelineUniqueness, StageJobUniqueness};

/// Every built-in rule, in chain order
#[must_use]
pub fn standard() -> Vec<Arc<dyn ValidationRule>> {
    vec![
        Arc::new(NameFormat),
        Arc::new(PipelineUniqueness),
        Arc::new(StageJobUniqueness),
        Arc::new(TemplateRules),
        Arc::new(EnvironmentRules),
        Arc::new(EnvironmentVariableRules),
        Arc::new(JobRules),
        Arc::new(TaskRules),
        Arc::new(FetchArtifactRules),
        Arc::new(DependencyRules),
        Arc::new(LabelTemplateRules),
        Arc::new(MaterialRules),
        Arc::new(PluginResourceRules),
        Arc::new(ParamRules),
        Arc::new(ServerRules),
    ]
}

/// Items sharing a key, for keys seen more than once, in first-seen order
pub(crate) fn duplicates<T>(items: impl IntoIterator<Item = (String, T)>) -> Vec<(String, Vec<T>)> {
    let mut groups: IndexMap<String, Vec<T>> = IndexMap::new();
    for (key, item) in items {
        groups.entry(key).or_default().push(item);
    }
    groups.into_iter().filter(|(_, items)| items.len() > 1).collect()
}

/// Whether a relative path stays inside the directory it is relative to
pub(crate) fn stays_inside(path: &str) -> bool {
    let path = path.trim();
    if path.starts_with('/') || path.starts_with('\\') || path.chars().nth(1) == Some(':') {
        return false;
    }
    let mut depth: i32 = 0;
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => depth += 1,
        }
    }
    true
}

/// Path with `.` segments and separators normalized, for comparisons
pub(crate) fn normalize_dir(path: &str) -> String {
    path.trim()
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_first_seen_order() {
        let found = duplicates(vec![
            ("b".to_owned(), 1),
            ("a".to_owned(), 2),
            ("b".to_owned(), 3),
            ("c".to_owned(), 4),
            ("a".to_owned(), 5),
        ]);
        assert_eq!(found, vec![("b".to_owned(), vec![1, 3]), ("a".to_owned(), vec![2, 5])]);
    }

    #[test]
    fn paths_inside_working_dir() {
        assert!(stays_inside("dist/app.jar"));
        assert!(stays_inside("a/../b"));
        assert!(stays_inside(""));
        assert!(!stays_inside("../outside"));
        assert!(!stays_inside("a/../../b"));
        assert!(!stays_inside("/etc/passwd"));
        assert!(!stays_inside("C:\\tmp"));
    }

    #[test]
    fn standard_rules_have_distinct_names() {
        let names: std::collections::HashSet<_> = standard().iter().map(|r| r.name()).collect();
        assert_eq!(names.len(), standard().len());
    }

    #[test]
    fn dirs_normalize() {
        assert_eq!(normalize_dir("./Src//lib/"), "src/lib");
    }
}
