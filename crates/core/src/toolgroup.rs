//! Tool group resolution.
//!
//! The backend reports tool groups as namespaced identifiers. Externally
//! hosted ones ("connectors") live under the `mcp::` namespace, everything
//! else is defined by the backend itself ("builtins").

use insight_agent_backend::{Backend, ToolSelection};

use crate::Error;

/// The namespace prefix of connector tool groups.
pub const CONNECTOR_PREFIX: &str = "mcp::";

/// The retrieval tool group, which needs knowledge sources as arguments.
pub const RAG_TOOL_GROUP: &str = "builtin::rag";

static LABELS: &[(&str, &str)] = &[
    ("mcp::crm", "Sales & support portal"),
    ("mcp::pdf", "Document generator"),
    ("mcp::slack", "Slack integration"),
    ("mcp::upload", "Report Processor"),
    ("builtin::websearch", "Web search"),
    ("builtin::rag", "Retrieval augmented generation"),
    ("builtin::code_interpreter", "Code generator"),
    ("builtin::wolfram_alpha", "Wolfram Alpha"),
];

/// Returns the human readable label of a tool group.
///
/// Unknown identifiers are their own label.
pub fn label_for(identifier: &str) -> &str {
    LABELS
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, label)| *label)
        .unwrap_or(identifier)
}

/// Where a tool group comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolGroupCategory {
    /// Hosted outside the backend, reached through a connector.
    Connector,
    /// Defined by the backend itself.
    Builtin,
}

impl ToolGroupCategory {
    /// Classifies a tool group identifier.
    #[inline]
    pub fn of(identifier: &str) -> Self {
        if identifier.starts_with(CONNECTOR_PREFIX) {
            ToolGroupCategory::Connector
        } else {
            ToolGroupCategory::Builtin
        }
    }
}

/// A tool group the user may enable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolGroupDescriptor {
    identifier: String,
    label: String,
    category: ToolGroupCategory,
}

impl ToolGroupDescriptor {
    /// Creates a descriptor from a tool group identifier.
    pub fn new<S: Into<String>>(identifier: S) -> Self {
        let identifier = identifier.into();
        Self {
            label: label_for(&identifier).to_owned(),
            category: ToolGroupCategory::of(&identifier),
            identifier,
        }
    }

    /// Returns the tool group identifier.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the display label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the category.
    #[inline]
    pub fn category(&self) -> ToolGroupCategory {
        self.category
    }
}

/// Tool groups of a catalog, split by category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedToolGroups {
    connectors: Vec<ToolGroupDescriptor>,
    builtins: Vec<ToolGroupDescriptor>,
}

impl ResolvedToolGroups {
    /// Returns the connector tool groups, in catalog order.
    #[inline]
    pub fn connectors(&self) -> &[ToolGroupDescriptor] {
        &self.connectors
    }

    /// Returns the builtin tool groups, in catalog order.
    #[inline]
    pub fn builtins(&self) -> &[ToolGroupDescriptor] {
        &self.builtins
    }

    /// Returns all tool groups, connectors first.
    pub fn iter(&self) -> impl Iterator<Item = &ToolGroupDescriptor> {
        self.connectors.iter().chain(&self.builtins)
    }

    /// Looks up a tool group by identifier.
    pub fn find(&self, identifier: &str) -> Option<&ToolGroupDescriptor> {
        self.iter().find(|d| d.identifier == identifier)
    }

    /// Looks up a tool group by its display label.
    pub fn find_by_label(&self, label: &str) -> Option<&ToolGroupDescriptor> {
        self.iter().find(|d| d.label == label)
    }

    /// Returns `true` if the catalog had no tool groups.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty() && self.builtins.is_empty()
    }
}

/// Splits a tool group catalog into connectors and builtins.
pub fn resolve<I, S>(catalog: I) -> ResolvedToolGroups
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut resolved = ResolvedToolGroups::default();
    for identifier in catalog {
        let descriptor = ToolGroupDescriptor::new(identifier);
        match descriptor.category {
            ToolGroupCategory::Connector => resolved.connectors.push(descriptor),
            ToolGroupCategory::Builtin => resolved.builtins.push(descriptor),
        }
    }
    resolved
}

/// Lists every tool that the selected tool groups bring in.
///
/// Tools are named `<group>:<tool>`, where `<group>` is the tool group
/// identifier without its namespace.
pub async fn active_tools<B: Backend>(
    backend: &B,
    selection: &ToolSelection,
) -> Result<Vec<String>, Error> {
    let mut active = vec![];
    for toolgroup_id in selection.names() {
        let group: String = toolgroup_id.split("::").skip(1).collect();
        let tools = backend
            .list_tools(toolgroup_id)
            .await
            .map_err(Error::from_backend)?;
        trace!("tool group {toolgroup_id} has {} tools", tools.len());
        active.extend(
            tools
                .into_iter()
                .map(|tool| format!("{group}:{}", tool.identifier)),
        );
    }
    Ok(active)
}
