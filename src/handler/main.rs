mod config;
mod dispatcher;
mod error;
mod pairing;
mod request;
mod slack;
mod tracker;
mod types;

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use tracing::warn;

use config::Config;
use dispatcher::{Dispatcher, Reply};
use pairing::{PairingStore, SimpleDbStore};
use types::SlackResponse;

async fn function_handler<S: PairingStore>(
    dispatcher: &Dispatcher<S>,
    event: Request,
) -> Result<Response<Body>, Error> {
    // Get body as string
    let body_bytes = event.body().to_vec();
    let body_string = String::from_utf8(body_bytes)?;

    if let Some(signing_secret) = dispatcher.config().signing_secret.as_deref() {
        let slack_signature = event
            .headers()
            .get("X-Slack-Signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let slack_timestamp = event
            .headers()
            .get("X-Slack-Request-Timestamp")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let verified = slack::verify_slack_signature(
            signing_secret,
            &body_string,
            slack_timestamp,
            slack_signature,
        )
        .unwrap_or(false);

        if !verified {
            warn!("rejecting request with invalid Slack signature");
            return Ok(Response::builder()
                .status(401)
                .header("Content-Type", "text/plain")
                .body(Body::from("Unauthorized"))?);
        }
    }

    let reply = dispatcher.handle(&body_string).await?;
    respond(reply, &dispatcher.config().bot_display_name)
}

fn respond(reply: Reply, bot_display_name: &str) -> Result<Response<Body>, Error> {
    let response = SlackResponse {
        text: reply.text,
        response_type: "in_channel".to_string(),
        user_name: bot_display_name.to_string(),
    };

    Ok(Response::builder()
        .status(reply.status)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&response)?))?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let store = SimpleDbStore::from_env(config.sdb_domain.clone());
    let dispatcher = Dispatcher::new(config, store);
    let dispatcher = &dispatcher;

    run(service_fn(move |event: Request| async move {
        function_handler(dispatcher, event).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::memory::MemoryStore;
    use lambda_http::http::HeaderValue;
    use serde_json::Value;

    fn dispatcher(extra: &[(&str, &str)]) -> Dispatcher<MemoryStore> {
        let mut env = vec![
            ("SLACK_TOKEN", "verification-token"),
            ("PIVOTAL_TOKEN", "tracker-token"),
            ("SDB_DOMAIN", "pairings"),
            ("PIVOTAL_API_URL", "http://127.0.0.1:9"),
        ];
        env.extend_from_slice(extra);
        let config = Config::from_lookup(|key| {
            env.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
        .expect("config");
        Dispatcher::new(config, MemoryStore::default())
    }

    fn request(body: &str) -> Request {
        Request::new(Body::from(body.to_string()))
    }

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body()).expect("json body")
    }

    const HELP_BODY: &str = "command=%2Fpivotal&text=help&token=verification-token\
        &user_name=alice&user_id=U1&channel_id=C1&channel_name=ops";

    #[tokio::test]
    async fn replies_use_the_in_channel_envelope() {
        let response = function_handler(&dispatcher(&[]), request(HELP_BODY))
            .await
            .expect("response");

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("Content-Type").map(|v| v.as_bytes()),
            Some(&b"application/json"[..])
        );
        let body = body_json(&response);
        assert_eq!(body["response_type"], "in_channel");
        assert_eq!(body["user_name"], "PivotalTracker");
        assert!(body["text"]
            .as_str()
            .expect("text")
            .starts_with("Pivotal integration hasn't been set up"));
    }

    #[tokio::test]
    async fn invalid_token_is_a_400_with_fixed_text() {
        let body = HELP_BODY.replace("verification-token", "stolen");
        let response = function_handler(&dispatcher(&[]), request(&body))
            .await
            .expect("response");

        assert_eq!(response.status(), 400);
        assert_eq!(body_json(&response)["text"], "Invalid request token");
    }

    #[tokio::test]
    async fn unsigned_request_is_unauthorized_when_signing_is_enabled() {
        let dispatcher = dispatcher(&[("SLACK_SIGNING_SECRET", "secret")]);
        let mut event = request(HELP_BODY);
        event
            .headers_mut()
            .insert("x-slack-request-timestamp", HeaderValue::from_static("1"));
        event
            .headers_mut()
            .insert("x-slack-signature", HeaderValue::from_static("v0=00"));

        let response = function_handler(&dispatcher, event).await.expect("response");

        assert_eq!(response.status(), 401);
    }

    #[test]
    fn bot_display_name_is_configurable() {
        let reply = Reply {
            status: 200,
            text: "hi".to_string(),
        };
        let response = respond(reply, "Tracker Bot").expect("response");
        assert_eq!(body_json(&response)["user_name"], "Tracker Bot");
    }
}
