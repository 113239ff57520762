//! Identity provider client: access tokens, user profiles, scope membership and
//! the full user directory.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::LoaderError;
use crate::loaders::{MemberGroup, MembershipLoader, TokenLoader, UserInfo, UserLoader, endpoint};

/// Page size used when walking the user directory.
const USERS_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct UaaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    id: String,
    #[serde(default)]
    emails: Vec<EmailEntry>,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    value: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersPage {
    #[serde(default)]
    resources: Vec<UserId>,
    total_results: usize,
}

#[derive(Debug, Deserialize)]
struct UserId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GroupsPage {
    #[serde(default)]
    resources: Vec<GroupResource>,
}

#[derive(Debug, Deserialize)]
struct GroupResource {
    #[serde(default)]
    members: Vec<GroupMember>,
}

#[derive(Debug, Deserialize)]
struct GroupMember {
    value: String,
    #[serde(rename = "type", default)]
    member_type: String,
}

impl UaaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, LoaderError> {
        endpoint(&self.base_url, segments)
    }

    async fn scope_members(&self, scope: &str, token: &str) -> Result<Vec<String>, LoaderError> {
        let response = self
            .http
            .get(self.url(&["Groups"])?)
            .bearer_auth(token)
            .query(&[("filter", display_name_filter(scope))])
            .send()
            .await?
            .error_for_status()?;

        let page: GroupsPage = response.json().await?;
        Ok(group_user_ids(page))
    }

    async fn all_users(&self, token: &str) -> Result<Vec<String>, LoaderError> {
        let mut ids = Vec::new();
        let mut start_index = 1;

        loop {
            let response = self
                .http
                .get(self.url(&["Users"])?)
                .bearer_auth(token)
                .query(&[
                    ("attributes", "id".to_string()),
                    ("startIndex", start_index.to_string()),
                    ("count", USERS_PAGE_SIZE.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?;

            let page: UsersPage = response.json().await?;
            let fetched = page.resources.len();
            ids.extend(page.resources.into_iter().map(|u| u.id));

            if fetched == 0 || ids.len() >= page.total_results {
                break;
            }
            start_index += fetched;
        }

        Ok(ids)
    }
}

#[async_trait]
impl TokenLoader for UaaClient {
    async fn load(&self) -> Result<String, LoaderError> {
        let response = self
            .http
            .post(self.url(&["oauth", "token"])?)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LoaderError::Unexpected(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl UserLoader for UaaClient {
    async fn load(&self, user_guid: &str, token: &str) -> Result<UserInfo, LoaderError> {
        let response = self
            .http
            .get(self.url(&["Users", user_guid])?)
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LoaderError::NotFound(format!("user {}", user_guid)));
        }

        let user: UserResource = response.error_for_status()?.json().await?;
        Ok(user_info(user))
    }
}

#[async_trait]
impl MembershipLoader for UaaClient {
    async fn members(
        &self,
        group: MemberGroup<'_>,
        token: &str,
    ) -> Result<Vec<String>, LoaderError> {
        match group {
            MemberGroup::Scope(scope) => self.scope_members(scope, token).await,
            MemberGroup::Everyone => self.all_users(token).await,
            other => Err(LoaderError::Unexpected(format!(
                "identity provider cannot enumerate {:?}",
                other
            ))),
        }
    }
}

/// SCIM filter matching one group by display name. The value is a quoted SCIM
/// string, so backslashes and quotes in `scope` are escaped.
fn display_name_filter(scope: &str) -> String {
    let escaped = scope.replace('\\', "\\\\").replace('"', "\\\"");
    format!("displayName eq \"{}\"", escaped)
}

/// Prefer the primary address, else the first one listed.
fn user_info(user: UserResource) -> UserInfo {
    let email = user
        .emails
        .iter()
        .find(|e| e.primary)
        .or_else(|| user.emails.first())
        .map(|e| e.value.clone())
        .filter(|e| !e.is_empty());

    UserInfo {
        guid: user.id,
        email,
    }
}

fn group_user_ids(page: GroupsPage) -> Vec<String> {
    page.resources
        .into_iter()
        .flat_map(|g| g.members)
        .filter(|m| m.member_type.is_empty() || m.member_type.eq_ignore_ascii_case("user"))
        .map(|m| m.value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_prefers_primary_email() {
        let user: UserResource = serde_json::from_value(serde_json::json!({
            "id": "user-1",
            "emails": [
                {"value": "secondary@example.com"},
                {"value": "primary@example.com", "primary": true}
            ]
        }))
        .unwrap();
        let info = user_info(user);
        assert_eq!(info.guid, "user-1");
        assert_eq!(info.email.as_deref(), Some("primary@example.com"));
    }

    #[test]
    fn test_user_info_without_emails() {
        let user: UserResource =
            serde_json::from_value(serde_json::json!({"id": "user-2"})).unwrap();
        assert_eq!(user_info(user).email, None);
    }

    #[test]
    fn test_group_members_skip_nested_groups() {
        let page: GroupsPage = serde_json::from_value(serde_json::json!({
            "resources": [{
                "members": [
                    {"value": "user-1", "type": "USER"},
                    {"value": "group-9", "type": "GROUP"},
                    {"value": "user-2", "type": "USER"}
                ]
            }]
        }))
        .unwrap();
        assert_eq!(group_user_ids(page), vec!["user-1", "user-2"]);
    }

    #[test]
    fn test_empty_group_yields_no_members() {
        let page: GroupsPage =
            serde_json::from_value(serde_json::json!({"resources": []})).unwrap();
        assert!(group_user_ids(page).is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = UaaClient::new(
            reqwest::Client::new(),
            "https://uaa.example.com/",
            "id",
            "secret",
        );
        assert_eq!(client.base_url, "https://uaa.example.com");
    }

    #[test]
    fn test_user_url_cannot_escape_users_collection() {
        let client = UaaClient::new(
            reqwest::Client::new(),
            "https://uaa.example.com",
            "id",
            "secret",
        );
        let url = client.url(&["Users", "../oauth/token?x="]).unwrap();

        assert_eq!(url.query(), None);
        assert_eq!(url.path_segments().unwrap().count(), 2);
        assert!(url.path().starts_with("/Users/"));
    }

    #[test]
    fn test_scope_filter_escapes_quotes() {
        assert_eq!(
            display_name_filter("cloud_controller.admin"),
            r#"displayName eq "cloud_controller.admin""#
        );
        assert_eq!(
            display_name_filter(r#"admin" or displayName pr or ""#),
            r#"displayName eq "admin\" or displayName pr or \"""#
        );
        assert_eq!(display_name_filter(r"a\"), r#"displayName eq "a\\""#);
    }
}
