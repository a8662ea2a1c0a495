//! Default tool permission table and the include/exclude filter rules.

/// What kind of sub-agent to spawn, each carrying a different default tool
/// permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAgentType {
    /// Read-oriented investigation; may not modify files or spawn further
    /// sub-agents.
    Explore,
    /// Unrestricted except for spawning further sub-agents.
    General,
    /// A named skill's own declared tool set.
    Skill,
}

/// Which tools a sub-agent may use.
#[derive(Debug, Clone)]
pub enum ToolInclude {
    /// Start from the parent's full tool set.
    All,
    /// Keep only these names.
    Only(Vec<String>),
    /// No tools at all (pure reasoning).
    None,
}

/// Include/exclude rule pair applied to the parent's [`synapse_tool::ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolFilter {
    /// Which tools to start from.
    pub include: ToolInclude,
    /// Name prefixes to drop after applying `include`.
    pub exclude_prefixes: Vec<String>,
}

impl ToolFilter {
    /// The default filter for a sub-agent type. `skill_tools` supplies the
    /// `include` list for `SubAgentType::Skill`, since a skill's tool set
    /// varies per skill and isn't a fixed default.
    #[must_use]
    pub fn defaults_for(kind: SubAgentType, skill_tools: Option<Vec<String>>) -> Self {
        match kind {
            SubAgentType::Explore => Self {
                include: ToolInclude::All,
                exclude_prefixes: vec!["write".into(), "edit".into(), "task".into()],
            },
            SubAgentType::General => {
                Self { include: ToolInclude::All, exclude_prefixes: vec!["task".into()] }
            }
            SubAgentType::Skill => Self {
                include: skill_tools.map_or(ToolInclude::None, ToolInclude::Only),
                exclude_prefixes: vec!["task".into()],
            },
        }
    }

    /// Whether `tool_name` survives this filter.
    #[must_use]
    pub fn keeps(&self, tool_name: &str) -> bool {
        let included = match &self.include {
            ToolInclude::All => true,
            ToolInclude::Only(names) => names.iter().any(|n| n == tool_name),
            ToolInclude::None => false,
        };
        included && !self.exclude_prefixes.iter().any(|prefix| tool_name.starts_with(prefix.as_str()))
    }
}
