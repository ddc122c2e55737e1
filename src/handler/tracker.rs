use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{PairingError, TrackerError};
use crate::slack::SlackClient;
use crate::types::*;

const PROJECT_ACCESS_ERROR_CODES: [&str; 2] = ["unauthorized_operation", "unfound_resource"];

fn project_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"pivotaltracker\.com/n/projects/(\d+)").expect("project URL pattern compiles")
    })
}

/// Pulls the project id out of the first Pivotal project URL in `text`.
pub fn extract_project_id(text: &str) -> Result<String, PairingError> {
    project_url_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or(PairingError::InvalidPairingLink)
}

pub struct TrackerClient {
    client: Client,
    api_url: String,
    token: String,
}

impl TrackerClient {
    pub fn new(api_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn get_project_name(&self, project_id: &str) -> Result<String, TrackerError> {
        info!(project_id, "querying Pivotal project info");

        let project: PivotalProject = self
            .client
            .get(format!("{}/projects/{}", self.api_url, project_id))
            .header("X-TrackerToken", &self.token)
            .send()
            .await?
            .json()
            .await?;

        if project
            .code
            .as_deref()
            .is_some_and(|code| PROJECT_ACCESS_ERROR_CODES.contains(&code))
        {
            return Err(TrackerError::ProjectAccessDenied);
        }

        project.name.ok_or_else(|| {
            TrackerError::UnexpectedResponse(format!("project {} has no name", project_id))
        })
    }

    pub async fn get_memberships(
        &self,
        project_id: &str,
    ) -> Result<Vec<PivotalMembership>, TrackerError> {
        let response = self
            .client
            .get(format!("{}/projects/{}/memberships", self.api_url, project_id))
            .header("X-TrackerToken", &self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(TrackerError::UnexpectedResponse(error_text));
        }

        Ok(response.json().await?)
    }

    /// Finds the tracker person whose email matches the Slack user's. Any
    /// failure along the way only means the story goes unattributed.
    pub async fn resolve_requester_id(
        &self,
        identity: &SlackClient,
        project_id: &str,
        user_id: &str,
    ) -> Option<u64> {
        let email = match identity.get_user_email(user_id).await {
            Ok(Some(email)) => email,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id, error = %e, "Slack email lookup failed");
                return None;
            }
        };

        let memberships = match self.get_memberships(project_id).await {
            Ok(memberships) => memberships,
            Err(e) => {
                warn!(project_id, error = %e, "Pivotal membership lookup failed");
                return None;
            }
        };

        memberships
            .into_iter()
            .map(|membership| membership.person)
            .find(|person| person.email.as_deref() == Some(email.as_str()))
            .map(|person| person.id)
    }

    /// Without a requester id the poster's Slack name is appended to the story
    /// name instead.
    pub async fn create_story(
        &self,
        project_id: &str,
        draft: &StoryDraft,
        user_name: &str,
        requested_by_id: Option<u64>,
    ) -> Result<CreatedStory, TrackerError> {
        let name = match requested_by_id {
            Some(_) => draft.name.clone(),
            None => format!("{} (from {})", draft.name, user_name),
        };

        let request_body = PivotalStoryRequest {
            name: name.clone(),
            description: draft.description.clone(),
            requested_by_id,
        };

        let response = self
            .client
            .post(format!("{}/projects/{}/stories", self.api_url, project_id))
            .header("X-TrackerToken", &self.token)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(TrackerError::UnexpectedResponse(error_text));
        }

        let story: PivotalStory = response.json().await?;
        info!(project_id, url = %story.url, "created Pivotal story");

        Ok(CreatedStory { name, url: story.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn tracker(server: &MockServer) -> TrackerClient {
        TrackerClient::new(server.base_url(), "tracker-token".to_string())
    }

    #[test]
    fn extracts_first_project_id() {
        let text = "https://www.pivotaltracker.com/n/projects/12345 and pivotaltracker.com/n/projects/9";
        assert_eq!(extract_project_id(text), Ok("12345".to_string()));
    }

    #[test]
    fn text_without_project_url_is_an_invalid_link() {
        assert_eq!(
            extract_project_id("https://www.pivotaltracker.com/n/workspaces/12"),
            Err(PairingError::InvalidPairingLink)
        );
        assert_eq!(extract_project_id(""), Err(PairingError::InvalidPairingLink));
    }

    #[tokio::test]
    async fn project_name_is_returned() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/projects/12345")
                .header("x-trackertoken", "tracker-token");
            then.status(200).json_body(json!({"id": 12345, "name": "Office Ops"}));
        });

        let name = tracker(&server).get_project_name("12345").await.expect("name");
        assert_eq!(name, "Office Ops");
        mock.assert();
    }

    #[tokio::test]
    async fn access_error_codes_deny_the_project() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/projects/1");
            then.status(403)
                .json_body(json!({"code": "unauthorized_operation", "kind": "error"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/projects/2");
            then.status(404).json_body(json!({"code": "unfound_resource", "kind": "error"}));
        });

        let client = tracker(&server);
        assert!(matches!(
            client.get_project_name("1").await,
            Err(TrackerError::ProjectAccessDenied)
        ));
        assert!(matches!(
            client.get_project_name("2").await,
            Err(TrackerError::ProjectAccessDenied)
        ));
    }

    #[tokio::test]
    async fn other_error_codes_are_unexpected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/projects/3");
            then.status(500).json_body(json!({"code": "internal_error"}));
        });

        let result = tracker(&server).get_project_name("3").await;
        assert!(matches!(result, Err(TrackerError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn story_with_requester_keeps_its_name() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/projects/12345/stories")
                .header("x-trackertoken", "tracker-token")
                .json_body(json!({
                    "name": "Buy cables",
                    "description": "running low",
                    "requested_by_id": 77
                }));
            then.status(200)
                .json_body(json!({"url": "https://www.pivotaltracker.com/story/show/1"}));
        });

        let draft = StoryDraft::parse("Buy cables; running low");
        let story = tracker(&server)
            .create_story("12345", &draft, "alice", Some(77))
            .await
            .expect("story");

        assert_eq!(story.name, "Buy cables");
        assert_eq!(story.url, "https://www.pivotaltracker.com/story/show/1");
        mock.assert();
    }

    #[tokio::test]
    async fn story_without_requester_names_the_poster() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/projects/12345/stories")
                .json_body(json!({"name": "Buy cables (from alice)", "description": ""}));
            then.status(200)
                .json_body(json!({"url": "https://www.pivotaltracker.com/story/show/2"}));
        });

        let draft = StoryDraft::parse("Buy cables");
        let story = tracker(&server)
            .create_story("12345", &draft, "alice", None)
            .await
            .expect("story");

        assert_eq!(story.name, "Buy cables (from alice)");
        mock.assert();
    }

    #[tokio::test]
    async fn requester_is_matched_by_email() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users.info").query_param("user", "U1");
            then.status(200).json_body(json!({
                "ok": true,
                "user": {"profile": {"email": "alice@example.com"}}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/projects/12345/memberships");
            then.status(200).json_body(json!([
                {"person": {"id": 10, "email": "bob@example.com"}},
                {"person": {"id": 11, "email": "alice@example.com"}}
            ]));
        });

        let identity = SlackClient::new(server.base_url(), "xoxb-test".to_string());
        let id = tracker(&server)
            .resolve_requester_id(&identity, "12345", "U1")
            .await;
        assert_eq!(id, Some(11));
    }

    #[tokio::test]
    async fn requester_lookup_failure_is_absent() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users.info");
            then.status(200).json_body(json!({"ok": false, "error": "user_not_found"}));
        });
        let memberships = server.mock(|when, then| {
            when.method(GET).path("/projects/12345/memberships");
            then.status(200).json_body(json!([]));
        });

        let identity = SlackClient::new(server.base_url(), "xoxb-test".to_string());
        let id = tracker(&server)
            .resolve_requester_id(&identity, "12345", "U404")
            .await;
        assert_eq!(id, None);
        memberships.assert_calls(0);
    }
}
