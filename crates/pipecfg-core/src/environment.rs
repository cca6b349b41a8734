//! Environment commands: partial edits and agent moves

use pipecfg_artifact::{CaseInsensitiveName, VersionToken};
use pipecfg_model::{ConfigGraph, EntityRef, Environment, EnvironmentVariable};

use crate::auth::Authorizer;
use crate::command::{ConfigCommand, Rejection};

fn find_mut<'g>(graph: &'g mut ConfigGraph, name: &CaseInsensitiveName) -> Result<&'g mut Environment, Rejection> {
    graph
        .environments
        .iter_mut()
        .find(|e| &e.name == name)
        .ok_or_else(|| Rejection::missing(&EntityRef::Environment(name.clone())))
}

/// Add and remove pipelines, agents and variables of one environment
///
/// Removals of things the environment does not have are rejected. Additions
/// are checked by validation like any other edit.
#[derive(Debug, Clone)]
pub struct PatchEnvironment {
    name: CaseInsensitiveName,
    token: VersionToken,
    add_pipelines: Vec<CaseInsensitiveName>,
    remove_pipelines: Vec<CaseInsensitiveName>,
    add_agents: Vec<String>,
    remove_agents: Vec<String>,
    add_variables: Vec<EnvironmentVariable>,
    remove_variables: Vec<CaseInsensitiveName>,
}

impl PatchEnvironment {
    #[must_use]
    pub fn new(name: impl Into<CaseInsensitiveName>, token: VersionToken) -> Self {
        Self {
            name: name.into(),
            token,
            add_pipelines: Vec::new(),
            remove_pipelines: Vec::new(),
            add_agents: Vec::new(),
            remove_agents: Vec::new(),
            add_variables: Vec::new(),
            remove_variables: Vec::new(),
        }
    }

    #[must_use]
    pub fn add_pipeline(mut self, name: impl Into<CaseInsensitiveName>) -> Self {
        self.add_pipelines.push(name.into());
        self
    }

    #[must_use]
    pub fn remove_pipeline(mut self, name: impl Into<CaseInsensitiveName>) -> Self {
        self.remove_pipelines.push(name.into());
        self
    }

    #[must_use]
    pub fn add_agent(mut self, uuid: impl Into<String>) -> Self {
        self.add_agents.push(uuid.into());
        self
    }

    #[must_use]
    pub fn remove_agent(mut self, uuid: impl Into<String>) -> Self {
        self.remove_agents.push(uuid.into());
        self
    }

    #[must_use]
    pub fn add_variable(mut self, variable: EnvironmentVariable) -> Self {
        self.add_variables.push(variable);
        self
    }

    #[must_use]
    pub fn remove_variable(mut self, name: impl Into<CaseInsensitiveName>) -> Self {
        self.remove_variables.push(name.into());
        self
    }

    fn reference(&self) -> EntityRef {
        EntityRef::Environment(self.name.clone())
    }
}

impl ConfigCommand for PatchEnvironment {
    fn name(&self) -> &'static str {
        "patch-environment"
    }

    fn describe(&self) -> String {
        format!("update environment '{}'", self.name)
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![self.reference()]
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        vec![(self.reference(), self.token)]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        authorizer.is_admin(graph, user)
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        let environment = find_mut(graph, &self.name)?;
        let absent = |what: &str, item: &dyn std::fmt::Display| {
            Rejection::BadRequest(format!(
                "Environment '{}' does not contain {what} '{item}'.",
                environment.name
            ))
        };

        if let Some(missing) = self.remove_pipelines.iter().find(|p| !environment.has_pipeline(p)) {
            return Err(absent("pipeline", missing));
        }
        if let Some(missing) = self.remove_agents.iter().find(|a| !environment.has_agent(a)) {
            return Err(absent("agent", missing));
        }
        if let Some(missing) = self
            .remove_variables
            .iter()
            .find(|v| !environment.environment_variables.iter().any(|e| &e.name == *v))
        {
            return Err(absent("environment variable", missing));
        }

        environment.pipelines.retain(|p| !self.remove_pipelines.contains(p));
        environment.pipelines.extend(self.add_pipelines.iter().cloned());
        environment.agents.retain(|a| !self.remove_agents.contains(a));
        environment.agents.extend(self.add_agents.iter().cloned());
        environment
            .environment_variables
            .retain(|v| !self.remove_variables.contains(&v.name));
        environment.environment_variables.extend(self.add_variables.iter().cloned());
        Ok(format!("Updated environment '{}'.", self.name))
    }
}

/// Move an agent between environments in one step
///
/// Each side names an environment together with the version token it was
/// read at; both are checked for freshness before anything changes. Either
/// side may be left out: no `from` only assigns, no `to` only unassigns.
#[derive(Debug, Clone)]
pub struct MoveAgent {
    agent: String,
    from: Option<(CaseInsensitiveName, VersionToken)>,
    to: Option<(CaseInsensitiveName, VersionToken)>,
}

impl MoveAgent {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            from: None,
            to: None,
        }
    }

    /// Take the agent out of `environment`, last read at `token`
    #[must_use]
    pub fn from(mut self, environment: impl Into<CaseInsensitiveName>, token: VersionToken) -> Self {
        self.from = Some((environment.into(), token));
        self
    }

    /// Assign the agent to `environment`, last read at `token`
    #[must_use]
    pub fn to(mut self, environment: impl Into<CaseInsensitiveName>, token: VersionToken) -> Self {
        self.to = Some((environment.into(), token));
        self
    }

    fn sides(&self) -> impl Iterator<Item = &(CaseInsensitiveName, VersionToken)> {
        self.from.iter().chain(self.to.iter())
    }
}

impl ConfigCommand for MoveAgent {
    fn name(&self) -> &'static str {
        "move-agent"
    }

    fn describe(&self) -> String {
        format!("move agent '{}'", self.agent)
    }

    fn touched(&self) -> Vec<EntityRef> {
        self.sides()
            .map(|(name, _)| EntityRef::Environment(name.clone()))
            .collect()
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        self.sides()
            .map(|(name, token)| (EntityRef::Environment(name.clone()), *token))
            .collect()
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        authorizer.is_admin(graph, user)
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        if self.from.is_none() && self.to.is_none() {
            return Err(Rejection::BadRequest(format!(
                "Agent '{}' has no environment to move from or to.",
                self.agent
            )));
        }
        if graph.find_agent(&self.agent).is_none() {
            return Err(Rejection::missing(&EntityRef::Agent(self.agent.clone())));
        }
        if let Some((from, _)) = &self.from {
            let environment = find_mut(graph, from)?;
            if !environment.has_agent(&self.agent) {
                return Err(Rejection::BadRequest(format!(
                    "Agent '{}' is not assigned to environment '{}'.",
                    self.agent, environment.name
                )));
            }
            environment.agents.retain(|a| a != &self.agent);
        }
        if let Some((to, _)) = &self.to {
            let environment = find_mut(graph, to)?;
            if !environment.has_agent(&self.agent) {
                environment.agents.push(self.agent.clone());
            }
        }
        Ok(format!("Moved agent '{}'.", self.agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_test_utils::{agent, environment, graph_with};

    fn token() -> VersionToken {
        VersionToken::of("unused").unwrap()
    }

    fn graph() -> ConfigGraph {
        let mut graph = graph_with(vec![]);
        graph.agents.push(agent("uuid-1"));
        graph.environments.push(environment("uat", &["build"], &["uuid-1"]));
        graph.environments.push(environment("prod", &[], &[]));
        graph
    }

    #[test]
    fn patch_adds_and_removes() {
        let mut graph = graph();
        PatchEnvironment::new("UAT", token())
            .remove_pipeline("build")
            .add_pipeline("deploy")
            .add_variable(EnvironmentVariable::plain("REGION", "eu"))
            .apply(&mut graph)
            .unwrap();
        let uat = graph.find_environment("uat").unwrap();
        assert_eq!(uat.pipelines, vec![CaseInsensitiveName::new("deploy")]);
        assert_eq!(uat.environment_variables.len(), 1);
    }

    #[test]
    fn patch_rejects_removing_what_is_absent() {
        let mut graph = graph();
        let before = graph.clone();
        let err = PatchEnvironment::new("uat", token())
            .add_pipeline("deploy")
            .remove_agent("uuid-9")
            .apply(&mut graph)
            .unwrap_err();
        assert_eq!(err.to_string(), "Environment 'uat' does not contain agent 'uuid-9'.");
        assert_eq!(graph, before);
    }

    #[test]
    fn move_agent_between_environments() {
        let mut graph = graph();
        let command = MoveAgent::new("uuid-1").from("uat", token()).to("prod", token());
        assert_eq!(command.touched().len(), 2);
        command.apply(&mut graph).unwrap();
        assert!(!graph.find_environment("uat").unwrap().has_agent("uuid-1"));
        assert!(graph.find_environment("prod").unwrap().has_agent("uuid-1"));
    }

    #[test]
    fn move_of_unknown_agent() {
        let mut graph = graph();
        let err = MoveAgent::new("ghost").to("prod", token()).apply(&mut graph).unwrap_err();
        assert_eq!(err.to_string(), "Agent 'ghost' not found.");
    }

    #[test]
    fn every_moved_side_expects_a_token() {
        let uat = VersionToken::of("uat").unwrap();
        let prod = VersionToken::of("prod").unwrap();
        let command = MoveAgent::new("uuid-1").from("uat", uat).to("prod", prod);
        assert_eq!(
            command.expected_tokens(),
            vec![
                (EntityRef::Environment("uat".into()), uat),
                (EntityRef::Environment("prod".into()), prod),
            ]
        );
    }

    #[test]
    fn move_without_sides_is_refused() {
        let mut graph = graph();
        let err = MoveAgent::new("uuid-1").apply(&mut graph).unwrap_err();
        assert!(matches!(err, Rejection::BadRequest(_)));
    }
}
