//! Authorization collaborator
//!
//! Commands ask an [`Authorizer`] before touching anything. Every question is
//! answered against the canonical effective graph at the time of the call.

use std::fmt::Debug;

use pipecfg_model::{Authorization, ConfigGraph, SecurityConfig};

/// Decides who may change what
pub trait Authorizer: Send + Sync + Debug {
    /// May `user` administer the whole server?
    fn is_admin(&self, graph: &ConfigGraph, user: &str) -> bool;

    /// May `user` administer pipeline group `group`?
    fn is_group_admin(&self, graph: &ConfigGraph, user: &str, group: &str) -> bool;

    /// May `user` edit template `template`?
    fn can_edit_template(&self, graph: &ConfigGraph, user: &str, template: &str) -> bool;
}

/// Authorizer reading the graph's own security block
///
/// With no administrators and no roles configured, security is off and
/// every user is an administrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityConfigAuthorizer;

impl SecurityConfigAuthorizer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn listed(authorization: &Authorization, security: &SecurityConfig, user: &str) -> bool {
    authorization.admins.iter().any(|a| a.eq_ignore_ascii_case(user))
        || security
            .roles_of(user)
            .any(|role| authorization.roles.iter().any(|r| role.name.matches(r)))
}

impl Authorizer for SecurityConfigAuthorizer {
    fn is_admin(&self, graph: &ConfigGraph, user: &str) -> bool {
        let security = &graph.server.security;
        if security.admins.is_empty() {
            return true;
        }
        security.admins.iter().any(|admin| {
            admin.eq_ignore_ascii_case(user) || security.roles_of(user).any(|role| role.name.matches(admin))
        })
    }

    fn is_group_admin(&self, graph: &ConfigGraph, user: &str, group: &str) -> bool {
        if self.is_admin(graph, user) {
            return true;
        }
        graph
            .find_group(group)
            .is_some_and(|g| listed(&g.authorization, &graph.server.security, user))
    }

    fn can_edit_template(&self, graph: &ConfigGraph, user: &str, template: &str) -> bool {
        if self.is_admin(graph, user) {
            return true;
        }
        graph
            .find_template(template)
            .is_some_and(|t| listed(&t.authorization, &graph.server.security, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_model::{Role, Template};
    use pipecfg_test_utils::{graph_with, simple_pipeline};

    fn secured() -> ConfigGraph {
        let mut graph = graph_with(vec![simple_pipeline("build")]);
        graph.server.security.admins = vec!["root".into(), "ops".into()];
        graph.server.security.roles = vec![
            Role { name: "ops".into(), users: vec!["Olga".into()] },
            Role { name: "devs".into(), users: vec!["dave".into()] },
        ];
        graph.pipeline_groups[0].authorization.roles.push("devs".into());
        let mut template = Template::new("standard", vec![]);
        template.authorization.admins.push("tina".into());
        graph.templates.push(template);
        graph
    }

    #[test]
    fn no_admins_means_everybody_is_admin() {
        let graph = graph_with(vec![]);
        assert!(SecurityConfigAuthorizer.is_admin(&graph, "anyone"));
    }

    #[test]
    fn admins_by_name_or_role() {
        let graph = secured();
        let auth = SecurityConfigAuthorizer::new();
        assert!(auth.is_admin(&graph, "ROOT"));
        assert!(auth.is_admin(&graph, "olga"));
        assert!(!auth.is_admin(&graph, "dave"));
    }

    #[test]
    fn group_and_template_admins() {
        let graph = secured();
        let auth = SecurityConfigAuthorizer;
        assert!(auth.is_group_admin(&graph, "dave", pipecfg_test_utils::DEFAULT_GROUP));
        assert!(!auth.is_group_admin(&graph, "tina", pipecfg_test_utils::DEFAULT_GROUP));
        assert!(auth.can_edit_template(&graph, "tina", "STANDARD"));
        assert!(!auth.can_edit_template(&graph, "dave", "standard"));
        assert!(!auth.is_group_admin(&graph, "dave", "missing"));
    }
}
