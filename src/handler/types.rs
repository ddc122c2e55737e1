use serde::{Deserialize, Serialize};

use crate::error::PairingError;

/// Channel name Slack reports for private groups, which cannot be mentioned.
pub const PRIVATE_CHANNEL_NAME: &str = "privategroup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhrase {
    Pair,
    Unpair,
    Help,
    Export,
}

impl ActionPhrase {
    /// Recognises `word` only when the resulting phrase is one of `known`.
    pub fn from_keyword(word: &str, known: &[ActionPhrase]) -> Option<Self> {
        let phrase = match word {
            "pair" => Self::Pair,
            "unpair" => Self::Unpair,
            "help" => Self::Help,
            "view_pairings" | "export" => Self::Export,
            _ => return None,
        };

        known.contains(&phrase).then_some(phrase)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Unpair => "unpair",
            Self::Help => "help",
            Self::Export => "view_pairings",
        }
    }
}

/// A parsed slash command or outgoing-webhook message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCommand {
    pub command: String,
    pub text: String,
    pub token: String,
    pub user_name: String,
    pub user_id: Option<String>,
    pub channel_id: String,
    pub channel_name: String,
    pub action_phrase: Option<ActionPhrase>,
    pub action_body: Option<String>,
}

impl IncomingCommand {
    /// Human-readable reference to the channel for use in replies.
    pub fn formatted_channel(&self) -> String {
        if self.channel_name == PRIVATE_CHANNEL_NAME {
            "this channel".to_string()
        } else {
            format!("*<#{}>*", self.channel_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDraft {
    pub name: String,
    pub description: String,
}

impl StoryDraft {
    /// Text before the first `;` is the name, the rest is the description.
    pub fn parse(text: &str) -> Self {
        let (name, description) = text.split_once(';').unwrap_or((text, ""));
        Self {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub enum PairingOutcome {
    Paired(TrackerProject),
    Rejected(PairingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedStory {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SlackResponse {
    pub text: String,
    pub response_type: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SlackUserInfo {
    pub ok: bool,
    pub error: Option<String>,
    pub user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
pub struct SlackUser {
    pub profile: SlackProfile,
}

#[derive(Debug, Deserialize)]
pub struct SlackProfile {
    pub email: Option<String>,
}

/// Body of `GET /projects/{id}`; error payloads carry `code` instead of `name`.
#[derive(Debug, Deserialize)]
pub struct PivotalProject {
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PivotalMembership {
    pub person: PivotalPerson,
}

#[derive(Debug, Deserialize)]
pub struct PivotalPerson {
    pub id: u64,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PivotalStoryRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PivotalStory {
    pub url: String,
}
