//! Pipeline dependency graph
//!
//! Dependency materials must name an existing pipeline and stage, and the
//! pipelines they connect must form a DAG. Edges run upstream to downstream;
//! every strongly connected component with more than one pipeline is a
//! cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use pipecfg_artifact::{EntityPath, ErrorReport};
use pipecfg_model::{Material, Pipeline};

use crate::chain::ValidationRule;
use crate::context::{path_of, ValidationContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyRules;

impl ValidationRule for DependencyRules {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport) {
        let pipelines: Vec<(&Pipeline, EntityPath)> = ctx.pipelines().collect();
        let index: HashMap<String, usize> = pipelines
            .iter()
            .enumerate()
            .rev()
            .map(|(i, (p, _))| (p.name.normalized(), i))
            .collect();

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for (downstream, (pipeline, path)) in pipelines.iter().enumerate() {
            graph.add_node(downstream);
            for material in &pipeline.materials {
                let Material::Dependency(dependency) = material else {
                    continue;
                };
                let material_path = path_of(material, path);
                let Some(&upstream) = index.get(&dependency.pipeline.normalized()) else {
                    report.add(
                        &material_path,
                        "pipeline",
                        format!(
                            "Pipeline '{}' does not exist. It is used from pipeline '{}'.",
                            dependency.pipeline, pipeline.name
                        ),
                    );
                    continue;
                };
                if upstream == downstream {
                    report.add(
                        &material_path,
                        "pipeline",
                        format!("Pipeline '{}' cannot depend on itself.", pipeline.name),
                    );
                    continue;
                }
                let stages = ctx.graph().effective_stages(pipelines[upstream].0);
                if !stages.iter().any(|s| s.name.matches(dependency.stage.as_str())) {
                    report.add(
                        &material_path,
                        "stage",
                        format!(
                            "Stage with name '{}' does not exist on pipeline '{}', it is being \
                             referred to from pipeline '{}'",
                            dependency.stage, dependency.pipeline, pipeline.name
                        ),
                    );
                }
                graph.add_edge(upstream, downstream, ());
            }
        }

        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let members: HashSet<usize> = component.iter().copied().collect();
            let Some(&start) = component.iter().min() else {
                continue;
            };
            let cycle: Vec<String> = shortest_cycle(&graph, &members, start)
                .into_iter()
                .map(|i| pipelines[i].0.name.to_string())
                .collect();
            let message = format!("Circular dependency: {}", cycle.join(" <- "));
            let mut sorted = component.clone();
            sorted.sort_unstable();
            for member in sorted {
                report.add(&pipelines[member].1, "materials", message.clone());
            }
        }
    }
}

/// `start`, the pipelines depending on it in turn, and `start` again
fn shortest_cycle(graph: &DiGraphMap<usize, ()>, members: &HashSet<usize>, start: usize) -> Vec<usize> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let mut next: Vec<usize> = graph.neighbors(node).filter(|n| members.contains(n)).collect();
        next.sort_unstable();
        for neighbor in next {
            if neighbor == start {
                let mut cycle = vec![start];
                let mut current = node;
                while current != start {
                    cycle.push(current);
                    current = parent[&current];
                }
                cycle.push(start);
                let len = cycle.len();
                cycle[1..len - 1].reverse();
                return cycle;
            }
            if neighbor != start && !parent.contains_key(&neighbor) {
                parent.insert(neighbor, node);
                queue.push_back(neighbor);
            }
        }
    }
    vec![start]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticPluginMetadata;
    use pipecfg_model::ConfigGraph;
    use pipecfg_test_utils::{dependency, diamond, graph_with, pipeline, stage};

    fn run(graph: &ConfigGraph) -> ErrorReport {
        let plugins = StaticPluginMetadata::new();
        let mut report = ErrorReport::new();
        DependencyRules.check(&ValidationContext::new(graph, &plugins), &mut report);
        report
    }

    #[test]
    fn diamond_is_acyclic() {
        assert!(run(&diamond()).is_empty());
    }

    #[test]
    fn cycle_is_reported_on_every_member() {
        let graph = graph_with(vec![
            pipeline("a", vec![dependency("c", "s")], vec![stage("s", &["j"])]),
            pipeline("b", vec![dependency("a", "s")], vec![stage("s", &["j"])]),
            pipeline("c", vec![dependency("b", "s")], vec![stage("s", &["j"])]),
        ]);
        let report = run(&graph);
        for name in ["a", "b", "c"] {
            assert_eq!(
                report.on(&EntityPath::of("pipelines", name), "materials"),
                Some("Circular dependency: a <- b <- c <- a")
            );
        }
    }

    #[test]
    fn missing_upstream_and_stage() {
        let graph = graph_with(vec![
            pipeline("up", vec![pipecfg_test_utils::git("https://example.com/up.git")], vec![stage("s", &["j"])]),
            pipeline(
                "down",
                vec![dependency("up", "nope"), dependency("ghost", "s")],
                vec![stage("s", &["j"])],
            ),
        ]);
        let messages: Vec<String> = run(&graph).messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].ends_with(
            "Stage with name 'nope' does not exist on pipeline 'up', it is being referred to from pipeline 'down'"
        ));
        assert!(messages[1].ends_with("Pipeline 'ghost' does not exist. It is used from pipeline 'down'."));
    }
}
