//! Validator chain
//!
//! A chain is two fixed lists: preprocessors, which may rewrite the graph
//! (secure value resolution), and rules, which only read it. Preprocessors
//! run first and in order. Rules are independent of each other, so they run
//! in parallel; their reports are concatenated in chain order, which keeps the
//! final report deterministic.

use std::fmt::Debug;
use std::sync::Arc;

use pipecfg_artifact::{ErrorReport, SecretCipher};
use pipecfg_model::ConfigGraph;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::context::ValidationContext;
use crate::metadata::PluginMetadataStore;
use crate::rules;
use crate::secure::SecureValueResolver;

/// A read-only invariant over the whole graph
///
/// Rules must be total: any structurally valid graph yields a report, never a
/// panic.
pub trait ValidationRule: Send + Sync + Debug {
    /// Rule name (for logging)
    fn name(&self) -> &'static str;

    /// Add an error to `report` for every violation found
    fn check(&self, ctx: &ValidationContext<'_>, report: &mut ErrorReport);
}

/// A pass that normalizes the graph before rules see it
pub trait Preprocessor: Send + Sync + Debug {
    /// Preprocessor name (for logging)
    fn name(&self) -> &'static str;

    /// Rewrite `graph` in place, filing any problems in `report`
    fn process(&self, graph: &mut ConfigGraph, plugins: &dyn PluginMetadataStore, report: &mut ErrorReport);
}

/// Graph after a validation pass, with the errors found on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedGraph {
    pub graph: ConfigGraph,
    pub report: ErrorReport,
}

impl ValidatedGraph {
    /// True if no errors were found
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.report.is_empty()
    }

    /// Split into graph and report
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (ConfigGraph, ErrorReport) {
        (self.graph, self.report)
    }
}

/// Ordered preprocessors and rules
#[derive(Debug, Clone)]
pub struct ValidatorChain {
    preprocessors: Vec<Arc<dyn Preprocessor>>,
    rules: Vec<Arc<dyn ValidationRule>>,
    plugins: Arc<dyn PluginMetadataStore>,
}

impl ValidatorChain {
    /// Empty chain over the given plugin metadata
    #[must_use]
    pub fn new(plugins: Arc<dyn PluginMetadataStore>) -> Self {
        Self {
            preprocessors: Vec::new(),
            rules: Vec::new(),
            plugins,
        }
    }

    /// The full production chain
    #[must_use]
    pub fn standard(cipher: Arc<dyn SecretCipher>, plugins: Arc<dyn PluginMetadataStore>) -> Self {
        let chain = Self::new(plugins).with_preprocessor(SecureValueResolver::new(cipher));
        rules::standard()
            .into_iter()
            .fold(chain, |chain, rule| chain.with_shared_rule(rule))
    }

    /// Append a preprocessor
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Arc::new(preprocessor));
        self
    }

    /// Append a rule
    #[must_use]
    pub fn with_rule(self, rule: impl ValidationRule + 'static) -> Self {
        self.with_shared_rule(Arc::new(rule))
    }

    fn with_shared_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rule names in chain order
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    #[inline]
    #[must_use]
    pub fn plugins(&self) -> &dyn PluginMetadataStore {
        self.plugins.as_ref()
    }

    /// Run only the preprocessors, on a copy
    ///
    /// Yields the graph as it would be persisted, with secure values
    /// encrypted. Running it again on its own output changes nothing.
    #[must_use]
    pub fn preprocess(&self, graph: &ConfigGraph) -> ValidatedGraph {
        let mut graph = graph.clone();
        let mut report = ErrorReport::new();
        for preprocessor in &self.preprocessors {
            preprocessor.process(&mut graph, self.plugins.as_ref(), &mut report);
            debug!(preprocessor = preprocessor.name(), "preprocessor applied");
        }
        ValidatedGraph { graph, report }
    }

    /// Validate a graph
    ///
    /// The input is not touched; preprocessing happens on a copy, which is
    /// returned with every error found on it.
    #[must_use]
    pub fn validate(&self, graph: &ConfigGraph) -> ValidatedGraph {
        let ValidatedGraph { graph, mut report } = self.preprocess(graph);

        let ctx = ValidationContext::new(&graph, self.plugins.as_ref());
        let reports: Vec<ErrorReport> = self
            .rules
            .par_iter()
            .map(|rule| {
                let mut found = ErrorReport::new();
                rule.check(&ctx, &mut found);
                if !found.is_empty() {
                    debug!(rule = rule.name(), errors = found.error_count(), "rule reported errors");
                }
                found
            })
            .collect();
        for found in reports {
            report.extend(found);
        }

        info!(
            rules = self.rules.len(),
            errors = report.error_count(),
            "validation finished"
        );
        ValidatedGraph { graph, report }
    }
}
