//! Agent configuration from TOML (`[[agents]]` array)

use consensus_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// System prompt used when an agent does not configure its own
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a cooperative participant in a multi-agent consensus discussion. \
Your goal is to find common ground with the other participants and agree efficiently \
on an answer that serves the original question.";

/// HTTP API family an agent talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProvider {
    /// OpenAI-compatible chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
}

impl AgentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentProvider::OpenAi => "openai",
            AgentProvider::Anthropic => "anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AgentProvider::OpenAi => "gpt-4o",
            AgentProvider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            AgentProvider::OpenAi => "OPENAI_API_KEY",
            AgentProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            AgentProvider::OpenAi => "https://api.openai.com",
            AgentProvider::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl std::fmt::Display for AgentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw agent entry from TOML
///
/// # Example
///
/// ```toml
/// [[agents]]
/// name = "gpt"
/// provider = "openai"
/// model = "gpt-4o"
/// temperature = 0.7
///
/// [[agents]]
/// name = "claude"
/// provider = "anthropic"
/// api_key_env = "MY_ANTHROPIC_KEY"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAgentConfig {
    pub name: String,
    pub provider: AgentProvider,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    /// HTTP request timeout (default 300 s)
    pub timeout_secs: Option<u64>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl FileAgentConfig {
    /// Agent with provider defaults for everything but the name
    pub fn new(name: impl Into<String>, provider: AgentProvider) -> Self {
        Self {
            name: name.into(),
            provider,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    fn validate(&self, index: usize) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let label = if self.name.trim().is_empty() {
            format!("agents[{}]", index)
        } else {
            format!("agents[{}] ({})", index, self.name)
        };

        if self.name.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidAgent,
                format!("{}: name cannot be empty", label),
            ));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidAgent,
                format!("{}: model cannot be empty", label),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidAgent,
                format!("{}: temperature {} is outside [0, 2]", label, self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidAgent,
                format!("{}: max_tokens must be positive", label),
            ));
        }
        issues
    }
}

/// The two agents used when no `[[agents]]` entries are configured
pub fn default_agents() -> Vec<FileAgentConfig> {
    vec![
        FileAgentConfig::new("openai", AgentProvider::OpenAi),
        FileAgentConfig::new("anthropic", AgentProvider::Anthropic),
    ]
}

/// Validate a list of agent entries against the participant limits.
pub fn validate_agents(
    agents: &[FileAgentConfig],
    min_agents: usize,
    max_agents: usize,
) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for (index, agent) in agents.iter().enumerate() {
        issues.extend(agent.validate(index));
    }

    let mut seen = HashSet::new();
    for agent in agents {
        if !seen.insert(agent.name.as_str()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateAgentName,
                format!("agents: name '{}' is used more than once", agent.name),
            ));
        }
    }

    if agents.len() < min_agents {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::TooFewAgents,
            format!(
                "agents: at least {} agents are required, {} configured",
                min_agents,
                agents.len()
            ),
        ));
    } else if agents.len() > max_agents {
        let ignored: Vec<&str> = agents[max_agents..].iter().map(|a| a.name.as_str()).collect();
        issues.push(ConfigIssue::warning(
            ConfigIssueCode::TooManyAgents,
            format!(
                "agents: only {} agents take part, ignoring {}",
                max_agents,
                ignored.join(", ")
            ),
        ));
    }

    issues
}

/// Report agents whose API key environment variable is unset or empty.
pub fn check_credentials<F>(agents: &[FileAgentConfig], lookup: F) -> Vec<ConfigIssue>
where
    F: Fn(&str) -> Option<String>,
{
    agents
        .iter()
        .filter(|agent| lookup(agent.api_key_env()).is_none_or(|key| key.trim().is_empty()))
        .map(|agent| {
            ConfigIssue::error(
                ConfigIssueCode::MissingApiKey,
                format!(
                    "agent '{}': environment variable {} is not set",
                    agent.name,
                    agent.api_key_env()
                ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_agent() {
        let agent: FileAgentConfig = toml::from_str(
            r#"
name = "claude"
provider = "anthropic"
"#,
        )
        .unwrap();
        assert_eq!(agent.provider, AgentProvider::Anthropic);
        assert_eq!(agent.model(), "claude-3-5-sonnet-latest");
        assert_eq!(agent.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(agent.temperature, 0.7);
        assert_eq!(agent.max_tokens, 2000);
        assert_eq!(agent.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_base_url_trailing_slash_removed() {
        let mut agent = FileAgentConfig::new("local", AgentProvider::OpenAi);
        agent.base_url = Some("http://localhost:11434/".to_string());
        assert_eq!(agent.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result: Result<FileAgentConfig, _> = toml::from_str(
            r#"
name = "x"
provider = "gemini"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_agents_are_valid() {
        assert!(validate_agents(&default_agents(), 2, 4).is_empty());
    }

    #[test]
    fn test_too_few_agents() {
        let agents = vec![FileAgentConfig::new("solo", AgentProvider::OpenAi)];
        let issues = validate_agents(&agents, 2, 4);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::TooFewAgents);
        assert!(issues[0].is_error());
    }

    #[test]
    fn test_too_many_agents_is_a_warning() {
        let agents: Vec<FileAgentConfig> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| FileAgentConfig::new(*name, AgentProvider::OpenAi))
            .collect();
        let issues = validate_agents(&agents, 2, 4);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::TooManyAgents);
        assert!(issues[0].message.ends_with("ignoring e"));
    }

    #[test]
    fn test_duplicate_names_and_bad_parameters() {
        let mut hot = FileAgentConfig::new("dup", AgentProvider::OpenAi);
        hot.temperature = 3.5;
        let agents = vec![hot, FileAgentConfig::new("dup", AgentProvider::Anthropic)];

        let codes: Vec<ConfigIssueCode> = validate_agents(&agents, 2, 4)
            .into_iter()
            .map(|i| i.code)
            .collect();
        assert!(codes.contains(&ConfigIssueCode::DuplicateAgentName));
        assert!(codes.contains(&ConfigIssueCode::InvalidAgent));
    }

    #[test]
    fn test_check_credentials() {
        let agents = default_agents();
        let issues = check_credentials(&agents, |var| {
            (var == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        });
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::MissingApiKey);
        assert!(issues[0].message.contains("ANTHROPIC_API_KEY"));
    }
}
