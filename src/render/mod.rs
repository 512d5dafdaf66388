//! Manifest rendering
//!
//! The manifest fragments are embedded at compile time and rendered with
//! minijinja in strict mode: a template that references a field missing
//! from [`DesiredState`] fails instead of silently producing an empty value.
//!
//! Sources ending in `.yaml` are fragments and render to exactly one
//! document each. Sources ending in `.tpl` hold shared macros and are only
//! reachable through `{% import %}`.

mod filters;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use tracing::debug;

use crate::desired_state::DesiredState;
use crate::error::Result;

const FRAGMENT_SUFFIX: &str = ".yaml";

/// Embedded template sources, in render order
const SOURCES: &[(&str, &str)] = &[
    ("_helpers.tpl", include_str!("../../templates/_helpers.tpl")),
    (
        "collector-serviceaccount.yaml",
        include_str!("../../templates/collector-serviceaccount.yaml"),
    ),
    (
        "collector-clusterrole.yaml",
        include_str!("../../templates/collector-clusterrole.yaml"),
    ),
    (
        "collector-clusterrolebinding.yaml",
        include_str!("../../templates/collector-clusterrolebinding.yaml"),
    ),
    (
        "default-collector-config.yaml",
        include_str!("../../templates/default-collector-config.yaml"),
    ),
    (
        "cluster-collector-deployment.yaml",
        include_str!("../../templates/cluster-collector-deployment.yaml"),
    ),
    (
        "node-collector-daemonset.yaml",
        include_str!("../../templates/node-collector-daemonset.yaml"),
    ),
    (
        "proxy-http-proxy-secret.yaml",
        include_str!("../../templates/proxy-http-proxy-secret.yaml"),
    ),
    (
        "proxy-deployment.yaml",
        include_str!("../../templates/proxy-deployment.yaml"),
    ),
    (
        "proxy-service.yaml",
        include_str!("../../templates/proxy-service.yaml"),
    ),
    (
        "logging-config.yaml",
        include_str!("../../templates/logging-config.yaml"),
    ),
    (
        "logging-agent-daemonset.yaml",
        include_str!("../../templates/logging-agent-daemonset.yaml"),
    ),
];

/// One rendered fragment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Name of the fragment that produced the document
    pub fragment: String,
    pub content: String,
}

impl RenderedDocument {
    /// Whether the fragment rendered to nothing
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Renders the embedded manifest fragments
pub struct Renderer {
    env: Environment<'static>,
    fragments: Vec<&'static str>,
}

impl Renderer {
    /// Create a renderer over the embedded templates
    pub fn new() -> Result<Self> {
        Self::with_sources(SOURCES)
    }

    /// Create a renderer over an explicit set of template sources
    pub fn with_sources(sources: &[(&'static str, &'static str)]) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_filter("to_yaml", filters::to_yaml);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("b64enc", filters::b64enc);

        let mut fragments = Vec::new();
        for (name, source) in sources {
            env.add_template(*name, *source)?;
            if name.ends_with(FRAGMENT_SUFFIX) {
                fragments.push(*name);
            }
        }

        Ok(Self { env, fragments })
    }

    /// Fragment names in render order
    pub fn fragment_names(&self) -> &[&'static str] {
        &self.fragments
    }

    /// Render every fragment
    pub fn render(&self, state: &DesiredState) -> Result<Vec<RenderedDocument>> {
        self.render_fragments(&self.fragments, state)
    }

    /// Render the named fragments, in the order given
    ///
    /// The first failure aborts the batch and no documents are returned.
    pub fn render_fragments(
        &self,
        names: &[&str],
        state: &DesiredState,
    ) -> Result<Vec<RenderedDocument>> {
        let ctx = Value::from_serialize(state);

        names
            .iter()
            .map(|name| {
                let template = self.env.get_template(name)?;
                let content = template.render(&ctx)?;
                debug!("Rendered fragment {} ({} bytes)", name, content.len());
                Ok(RenderedDocument {
                    fragment: name.to_string(),
                    content,
                })
            })
            .collect()
    }
}
