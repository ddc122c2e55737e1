use std::collections::BTreeMap;

use async_trait::async_trait;
use lambda_http::Error;
use rusoto_core::Region;
use rusoto_sdb::{
    Attribute, DeleteAttributesRequest, GetAttributesRequest, PutAttributesRequest,
    ReplaceableAttribute, SelectRequest, SimpleDb, SimpleDbClient,
};
use tracing::info;

const PROJECT_ID_ATTRIBUTE: &str = "project_id";

/// Channel id to tracker project id, at most one project per channel.
#[async_trait]
pub trait PairingStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> Result<Option<String>, Error>;

    /// Replaces any existing pairing for the channel.
    async fn put(&self, channel_id: &str, project_id: &str) -> Result<(), Error>;

    /// Deleting a channel that was never paired is not an error.
    async fn delete(&self, channel_id: &str) -> Result<(), Error>;

    async fn list_all(&self) -> Result<BTreeMap<String, String>, Error>;
}

/// Pairings kept in a SimpleDB domain, one item per channel.
pub struct SimpleDbStore {
    client: SimpleDbClient,
    domain: String,
}

impl SimpleDbStore {
    pub fn new(client: SimpleDbClient, domain: String) -> Self {
        Self { client, domain }
    }

    /// Region and credentials come from the Lambda environment.
    pub fn from_env(domain: String) -> Self {
        Self::new(SimpleDbClient::new(Region::default()), domain)
    }
}

#[async_trait]
impl PairingStore for SimpleDbStore {
    async fn get(&self, channel_id: &str) -> Result<Option<String>, Error> {
        let output = self
            .client
            .get_attributes(GetAttributesRequest {
                domain_name: self.domain.clone(),
                item_name: channel_id.to_string(),
                attribute_names: Some(vec![PROJECT_ID_ATTRIBUTE.to_string()]),
                consistent_read: Some(true),
            })
            .await?;

        Ok(project_id_of(output.attributes.as_deref().unwrap_or_default()))
    }

    async fn put(&self, channel_id: &str, project_id: &str) -> Result<(), Error> {
        info!(channel_id, project_id, "storing pairing");

        self.client
            .put_attributes(PutAttributesRequest {
                domain_name: self.domain.clone(),
                item_name: channel_id.to_string(),
                attributes: vec![ReplaceableAttribute {
                    name: PROJECT_ID_ATTRIBUTE.to_string(),
                    value: project_id.to_string(),
                    replace: Some(true),
                }],
                ..Default::default()
            })
            .await?;

        Ok(())
    }

    async fn delete(&self, channel_id: &str) -> Result<(), Error> {
        info!(channel_id, "removing pairing");

        self.client
            .delete_attributes(DeleteAttributesRequest {
                domain_name: self.domain.clone(),
                item_name: channel_id.to_string(),
                ..Default::default()
            })
            .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<BTreeMap<String, String>, Error> {
        let mut pairings = BTreeMap::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .select(SelectRequest {
                    select_expression: format!("select * from `{}`", self.domain),
                    next_token: next_token.take(),
                    consistent_read: Some(true),
                })
                .await?;

            for item in output.items.unwrap_or_default() {
                if let Some(project_id) = project_id_of(&item.attributes) {
                    pairings.insert(item.name, project_id);
                }
            }

            match output.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(pairings)
    }
}

fn project_id_of(attributes: &[Attribute]) -> Option<String> {
    attributes
        .iter()
        .find(|attribute| attribute.name == PROJECT_ID_ATTRIBUTE)
        .map(|attribute| attribute.value.clone())
}
