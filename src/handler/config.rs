use crate::error::ConfigError;
use crate::types::ActionPhrase;

const DEFAULT_PIVOTAL_API_URL: &str = "https://www.pivotaltracker.com/services/v5";
const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
const DEFAULT_BOT_DISPLAY_NAME: &str = "PivotalTracker";

/// Which Slack integration delivers the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// `/pivotal ...` slash command, with export and requester attribution.
    SlashCommand,
    /// Outgoing webhook fired by a trigger word.
    TriggerWord,
}

impl Profile {
    pub fn known_phrases(&self) -> &'static [ActionPhrase] {
        match self {
            Self::SlashCommand => &[
                ActionPhrase::Pair,
                ActionPhrase::Unpair,
                ActionPhrase::Help,
                ActionPhrase::Export,
            ],
            Self::TriggerWord => &[ActionPhrase::Pair, ActionPhrase::Unpair, ActionPhrase::Help],
        }
    }

    pub fn supports_attribution(&self) -> bool {
        matches!(self, Self::SlashCommand)
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "slash" => Ok(Self::SlashCommand),
            "trigger" => Ok(Self::TriggerWord),
            other => Err(ConfigError::InvalidProfile(other.to_string())),
        }
    }
}

/// Loaded once at cold start and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack_token: String,
    pub pivotal_token: String,
    pub sdb_domain: String,
    pub profile: Profile,
    pub slack_api_token: Option<String>,
    pub signing_secret: Option<String>,
    pub pivotal_api_url: String,
    pub slack_api_url: String,
    pub bot_display_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        let profile = match optional("COMMAND_PROFILE") {
            Some(value) => Profile::parse(&value)?,
            None => Profile::SlashCommand,
        };

        Ok(Self {
            slack_token: required("SLACK_TOKEN")?,
            pivotal_token: required("PIVOTAL_TOKEN")?,
            sdb_domain: required("SDB_DOMAIN")?,
            profile,
            slack_api_token: optional("SLACK_API_TOKEN"),
            signing_secret: optional("SLACK_SIGNING_SECRET"),
            pivotal_api_url: optional("PIVOTAL_API_URL")
                .unwrap_or_else(|| DEFAULT_PIVOTAL_API_URL.to_string()),
            slack_api_url: optional("SLACK_API_URL")
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
            bot_display_name: optional("BOT_DISPLAY_NAME")
                .unwrap_or_else(|| DEFAULT_BOT_DISPLAY_NAME.to_string()),
        })
    }
}
