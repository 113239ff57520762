//! Platform API client for space and organization membership.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::LoaderError;
use crate::loaders::{MemberGroup, MembershipLoader, endpoint};

const RESULTS_PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct CloudControllerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    next_url: Option<String>,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    guid: String,
}

impl CloudControllerClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// First page of `/v2/<collection>/<guid>/users`.
    fn members_url(&self, collection: &str, guid: &str) -> Result<Url, LoaderError> {
        let mut url = endpoint(&self.base_url, &["v2", collection, guid, "users"])?;
        url.query_pairs_mut()
            .append_pair("results-per-page", &RESULTS_PER_PAGE.to_string());
        Ok(url)
    }

    /// `next_url` is a server-relative path returned by the platform API.
    fn page_url(&self, next_url: &str) -> Result<Url, LoaderError> {
        let raw = format!("{}{}", self.base_url, next_url);
        Url::parse(&raw)
            .map_err(|e| LoaderError::Unexpected(format!("invalid next_url '{}': {}", raw, e)))
    }

    /// Walk every page of a `/v2/<collection>/<guid>/users` listing.
    async fn paged_users(
        &self,
        collection: &str,
        guid: &str,
        token: &str,
    ) -> Result<Vec<String>, LoaderError> {
        let mut guids = Vec::new();
        let mut next = Some(self.members_url(collection, guid)?);

        while let Some(url) = next {
            let response = self.http.get(url).bearer_auth(token).send().await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(LoaderError::NotFound(format!(
                    "{} {}",
                    collection.trim_end_matches('s'),
                    guid
                )));
            }

            let page: UsersPage = response.error_for_status()?.json().await?;
            guids.extend(page.resources.into_iter().map(|r| r.metadata.guid));
            next = page.next_url.map(|path| self.page_url(&path)).transpose()?;
        }

        Ok(guids)
    }
}

#[async_trait]
impl MembershipLoader for CloudControllerClient {
    async fn members(
        &self,
        group: MemberGroup<'_>,
        token: &str,
    ) -> Result<Vec<String>, LoaderError> {
        match group {
            MemberGroup::Space(guid) => self.paged_users("spaces", guid, token).await,
            MemberGroup::Organization(guid) => {
                self.paged_users("organizations", guid, token).await
            }
            other => Err(LoaderError::Unexpected(format!(
                "platform API cannot enumerate {:?}",
                other
            ))),
        }
    }
}

/// Routes each group to whichever directory can enumerate it.
pub struct PlatformDirectory<P, I> {
    platform: P,
    identity: I,
}

impl<P, I> PlatformDirectory<P, I> {
    pub fn new(platform: P, identity: I) -> Self {
        Self { platform, identity }
    }
}

#[async_trait]
impl<P, I> MembershipLoader for PlatformDirectory<P, I>
where
    P: MembershipLoader,
    I: MembershipLoader,
{
    async fn members(
        &self,
        group: MemberGroup<'_>,
        token: &str,
    ) -> Result<Vec<String>, LoaderError> {
        match group {
            MemberGroup::Space(_) | MemberGroup::Organization(_) => {
                self.platform.members(group, token).await
            }
            MemberGroup::Scope(_) | MemberGroup::Everyone => {
                self.identity.members(group, token).await
            }
        }
    }
}
