use lambda_http::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PairingError, TrackerError};
use crate::pairing::PairingStore;
use crate::request;
use crate::slack::SlackClient;
use crate::tracker::{self, TrackerClient};
use crate::types::*;

const INVALID_TOKEN_RESPONSE: &str = "Invalid request token";

const MISSING_PROJECT_ACCESS_RESPONSE: &str = concat!(
    "It looks like slack-pivotal-tracker-bot doesn't have access to this Pivotal project yet.\n",
    "Invite the user tied to this bot's API key to your Pivotal project and try pairing again.\n",
);

fn tutorial_response(command: &str) -> String {
    format!(
        "Specify a story name. Optional: add a description after a semicolon.\n\
         e.g. `{command} Buy more ethernet cables; We are running out`\n"
    )
}

fn missing_pair_response(command: &str) -> String {
    format!(
        "Pivotal integration hasn't been set up in this channel yet.\n\
         Invite the user tied to this bot's API key to your project and\n\
         pair it with `{command} pair <Pivotal project URL>`\n"
    )
}

fn repair_usage_response(command: &str) -> String {
    format!(
        "This channel is already paired with a Pivotal project.\n\
         Pair it with a different one with `{command} pair <Pivotal project URL>`\n"
    )
}

fn successful_pair_response(channel: &str, project_name: &str, command: &str) -> String {
    format!(
        "Success! You've paired {channel} with *{project_name}*.\n\
         For more info about how to post a story type `{command} help`\n\
         Unpair this channel from *{project_name}* with `{command} unpair`\n"
    )
}

fn successful_unpair_response(channel: &str, project_name: &str) -> String {
    format!("Successfully removed pairing between {channel} and *{project_name}*.\n")
}

fn export_pairings_response(pairing_json: &str) -> String {
    format!("Here are the currently paired channels:\n```\n{pairing_json}\n```")
}

fn successful_post_response(story: &str, project: &str, url: &str) -> String {
    format!("Story *{story}* added to *{project}*.\n{url}\n")
}

/// Status code and chat text of a reply; the envelope is added by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub text: String,
}

impl Reply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            text: text.into(),
        }
    }

    fn bad_request(text: impl Into<String>) -> Self {
        Self {
            status: 400,
            text: text.into(),
        }
    }
}

pub struct Dispatcher<S> {
    config: Config,
    store: S,
    tracker: TrackerClient,
    identity: Option<SlackClient>,
}

impl<S: PairingStore> Dispatcher<S> {
    pub fn new(config: Config, store: S) -> Self {
        let tracker = TrackerClient::new(config.pivotal_api_url.clone(), config.pivotal_token.clone());
        let identity = config
            .slack_api_token
            .clone()
            .map(|token| SlackClient::new(config.slack_api_url.clone(), token));

        Self {
            config,
            store,
            tracker,
            identity,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handles one webhook body. Upstream failures other than the recoverable
    /// pairing and access errors are returned as `Err`.
    pub async fn handle(&self, body: &str) -> Result<Reply, Error> {
        let command = match request::parse_command(body, self.config.profile) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                return Ok(Reply::bad_request(format!("Malformed request: {}", e)));
            }
        };

        info!(
            channel_id = %command.channel_id,
            user = %command.user_name,
            action = command.action_phrase.map_or("none", |phrase| phrase.keyword()),
            "received command"
        );

        if command.token != self.config.slack_token {
            error!(channel_id = %command.channel_id, "request token does not match expected");
            return Ok(Reply::bad_request(INVALID_TOKEN_RESPONSE));
        }

        let Some(project_id) = self.store.get(&command.channel_id).await? else {
            return match command.action_phrase {
                Some(ActionPhrase::Pair) => self.pair(&command, false).await,
                _ => Ok(Reply::ok(missing_pair_response(&command.command))),
            };
        };

        if command.text.is_empty() {
            return Ok(Reply::ok(tutorial_response(&command.command)));
        }

        match command.action_phrase {
            Some(ActionPhrase::Help) => Ok(Reply::ok(tutorial_response(&command.command))),
            Some(ActionPhrase::Pair) => self.pair(&command, true).await,
            Some(ActionPhrase::Unpair) => self.unpair(&command, &project_id).await,
            Some(ActionPhrase::Export) => self.export().await,
            None => self.post_story(&command, &project_id).await,
        }
    }

    async fn pair(&self, command: &IncomingCommand, already_paired: bool) -> Result<Reply, Error> {
        info!(channel_id = %command.channel_id, "attempting to pair channel to a Tracker project");

        let action_body = command.action_body.as_deref().unwrap_or_default();
        let reply = match self.pair_channel(&command.channel_id, action_body).await? {
            PairingOutcome::Paired(project) => {
                info!(channel_id = %command.channel_id, project_id = %project.id, "paired channel");
                successful_pair_response(&command.formatted_channel(), &project.name, &command.command)
            }
            PairingOutcome::Rejected(PairingError::InvalidPairingLink) if already_paired => {
                repair_usage_response(&command.command)
            }
            PairingOutcome::Rejected(PairingError::InvalidPairingLink) => {
                missing_pair_response(&command.command)
            }
            PairingOutcome::Rejected(PairingError::ProjectAccessDenied) => {
                MISSING_PROJECT_ACCESS_RESPONSE.to_string()
            }
        };

        Ok(Reply::ok(reply))
    }

    /// Stores the pairing only once the project is known to be readable.
    async fn pair_channel(&self, channel_id: &str, action_body: &str) -> Result<PairingOutcome, Error> {
        let project_id = match tracker::extract_project_id(action_body) {
            Ok(project_id) => project_id,
            Err(e) => return Ok(PairingOutcome::Rejected(e)),
        };

        let name = match self.tracker.get_project_name(&project_id).await {
            Ok(name) => name,
            Err(TrackerError::ProjectAccessDenied) => {
                warn!(channel_id, project_id = %project_id, "no access to Pivotal project");
                return Ok(PairingOutcome::Rejected(PairingError::ProjectAccessDenied));
            }
            Err(e) => return Err(e.into()),
        };

        self.store.put(channel_id, &project_id).await?;

        Ok(PairingOutcome::Paired(TrackerProject {
            id: project_id,
            name,
        }))
    }

    async fn unpair(&self, command: &IncomingCommand, project_id: &str) -> Result<Reply, Error> {
        // Unreadable projects are still unpaired, named by their id.
        let project_name = match self.tracker.get_project_name(project_id).await {
            Ok(name) => name,
            Err(TrackerError::ProjectAccessDenied) => project_id.to_string(),
            Err(e) => return Err(e.into()),
        };

        self.store.delete(&command.channel_id).await?;

        Ok(Reply::ok(successful_unpair_response(
            &command.formatted_channel(),
            &project_name,
        )))
    }

    async fn export(&self) -> Result<Reply, Error> {
        let pairings = self.store.list_all().await?;
        let pairing_json = serde_json::to_string_pretty(&pairings)?;
        Ok(Reply::ok(export_pairings_response(&pairing_json)))
    }

    async fn post_story(&self, command: &IncomingCommand, project_id: &str) -> Result<Reply, Error> {
        let project_name = match self.tracker.get_project_name(project_id).await {
            Ok(name) => name,
            Err(TrackerError::ProjectAccessDenied) => {
                return Ok(Reply::ok(MISSING_PROJECT_ACCESS_RESPONSE));
            }
            Err(e) => return Err(e.into()),
        };

        let requested_by_id = match (&self.identity, &command.user_id) {
            (Some(identity), Some(user_id)) if self.config.profile.supports_attribution() => {
                self.tracker
                    .resolve_requester_id(identity, project_id, user_id)
                    .await
            }
            _ => None,
        };

        let draft = StoryDraft::parse(&command.text);
        let story = self
            .tracker
            .create_story(project_id, &draft, &command.user_name, requested_by_id)
            .await?;

        Ok(Reply::ok(successful_post_response(
            &story.name,
            &project_name,
            &story.url,
        )))
    }
}
