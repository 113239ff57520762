//! Narrow interfaces to the enrichment collaborators the courier depends on.
//!
//! Only the courier calls these. HTTP-backed implementations live in
//! [`uaa`] and [`cloud_controller`].

pub mod cloud_controller;
pub mod uaa;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use herald_common::types::Template;

use crate::error::LoaderError;

/// Profile data needed to address a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub guid: String,
    /// `None` when the user exists but has no address on file.
    pub email: Option<String>,
}

/// A set of users to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberGroup<'a> {
    Space(&'a str),
    Organization(&'a str),
    Scope(&'a str),
    Everyone,
}

#[async_trait]
pub trait TokenLoader: Send + Sync {
    async fn load(&self) -> Result<String, LoaderError>;
}

#[async_trait]
pub trait UserLoader: Send + Sync {
    async fn load(&self, user_guid: &str, token: &str) -> Result<UserInfo, LoaderError>;
}

#[async_trait]
pub trait MembershipLoader: Send + Sync {
    /// User GUIDs belonging to `group`. An empty group yields an empty list.
    async fn members(
        &self,
        group: MemberGroup<'_>,
        token: &str,
    ) -> Result<Vec<String>, LoaderError>;
}

#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load(&self, client_id: &str, kind_id: &str) -> Result<Template, LoaderError>;
}

/// The full set of collaborators a courier needs.
#[derive(Clone)]
pub struct Loaders {
    pub tokens: Arc<dyn TokenLoader>,
    pub users: Arc<dyn UserLoader>,
    pub members: Arc<dyn MembershipLoader>,
    pub templates: Arc<dyn TemplateLoader>,
}

/// Append `segments` to `base` as path segments. Each segment is
/// percent-encoded, so `/`, `?` and `#` inside an ID stay inside that segment.
/// Empty, `.` and `..` segments name nothing and are reported as not found.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, LoaderError> {
    if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
        return Err(LoaderError::NotFound(format!("'{}'", bad)));
    }

    let mut url = Url::parse(base)
        .map_err(|e| LoaderError::Unexpected(format!("invalid base URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| LoaderError::Unexpected(format!("base URL '{}' cannot hold a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Always yields the same template.
pub struct StaticTemplateLoader {
    template: Template,
}

impl StaticTemplateLoader {
    pub fn new(template: Template) -> Self {
        Self { template }
    }
}

#[async_trait]
impl TemplateLoader for StaticTemplateLoader {
    async fn load(&self, _client_id: &str, _kind_id: &str) -> Result<Template, LoaderError> {
        Ok(self.template.clone())
    }
}

/// Tries a per-client override first and falls back to a default template
/// when the override loader reports [`LoaderError::NotFound`].
pub struct FallbackTemplateLoader {
    overrides: Arc<dyn TemplateLoader>,
    default: Template,
}

impl FallbackTemplateLoader {
    pub fn new(overrides: Arc<dyn TemplateLoader>, default: Template) -> Self {
        Self { overrides, default }
    }
}

#[async_trait]
impl TemplateLoader for FallbackTemplateLoader {
    async fn load(&self, client_id: &str, kind_id: &str) -> Result<Template, LoaderError> {
        match self.overrides.load(client_id, kind_id).await {
            Ok(template) => Ok(template),
            Err(LoaderError::NotFound(_)) => {
                tracing::debug!(client_id, kind_id, "No template override, using default");
                Ok(self.default.clone())
            }
            Err(e) => Err(e),
        }
    }
}

/// Placeholder override source for deployments without per-client templates.
pub struct NoOverrides;

#[async_trait]
impl TemplateLoader for NoOverrides {
    async fn load(&self, client_id: &str, kind_id: &str) -> Result<Template, LoaderError> {
        Err(LoaderError::NotFound(format!(
            "template for {}/{}",
            client_id, kind_id
        )))
    }
}
