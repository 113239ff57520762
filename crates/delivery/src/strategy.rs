//! Audience selection: who a notification is addressed to.

use serde::{Deserialize, Serialize};

use herald_common::types::Recipient;

use crate::error::LoaderError;
use crate::loaders::{MemberGroup, MembershipLoader};

/// The audience of one dispatch, one variant per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Audience {
    User(String),
    Space(String),
    Organization(String),
    Everyone,
    UaaScope(String),
    Email(String),
}

impl Audience {
    /// Resolve the audience to recipients.
    ///
    /// Never errors for a legitimately empty audience; an org with no members
    /// yields `Ok(vec![])`.
    pub async fn resolve(
        &self,
        members: &dyn MembershipLoader,
        token: &str,
    ) -> Result<Vec<Recipient>, LoaderError> {
        let group = match self {
            Audience::User(guid) => return Ok(vec![Recipient::user(guid.clone())]),
            Audience::Email(address) => return Ok(vec![Recipient::email(address.clone())]),
            Audience::Space(guid) => MemberGroup::Space(guid),
            Audience::Organization(guid) => MemberGroup::Organization(guid),
            Audience::UaaScope(scope) => MemberGroup::Scope(scope),
            Audience::Everyone => MemberGroup::Everyone,
        };

        let mut guids = members.members(group, token).await?;
        // Users appearing twice in a listing get one message.
        let mut seen = std::collections::HashSet::new();
        guids.retain(|guid| seen.insert(guid.clone()));

        tracing::debug!(
            scope = self.scope_name(),
            count = guids.len(),
            "Audience resolved"
        );
        Ok(guids.into_iter().map(Recipient::user).collect())
    }

    pub fn scope_name(&self) -> &'static str {
        match self {
            Audience::User(_) => "user",
            Audience::Space(_) => "space",
            Audience::Organization(_) => "organization",
            Audience::Everyone => "everyone",
            Audience::UaaScope(_) => "uaa_scope",
            Audience::Email(_) => "email",
        }
    }

    /// Sentence telling the recipient why they received the message.
    pub fn endorsement(&self) -> String {
        match self {
            Audience::User(_) => "This message was sent directly to you.".to_string(),
            Audience::Space(guid) => format!(
                "You received this message because you belong to the space {}.",
                guid
            ),
            Audience::Organization(guid) => format!(
                "You received this message because you belong to the organization {}.",
                guid
            ),
            Audience::Everyone => "This message was sent to everyone.".to_string(),
            Audience::UaaScope(scope) => format!(
                "You received this message because you have the {} scope.",
                scope
            ),
            Audience::Email(_) => {
                "This message was sent directly to your email address.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Result<Vec<&'static str>, &'static str>);

    #[async_trait]
    impl MembershipLoader for Fixed {
        async fn members(&self, _: MemberGroup<'_>, _: &str) -> Result<Vec<String>, LoaderError> {
            match &self.0 {
                Ok(ids) => Ok(ids.iter().map(|s| s.to_string()).collect()),
                Err(msg) => Err(LoaderError::Unexpected(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_user_audience_skips_membership_lookup() {
        let members = Fixed(Err("must not be called"));
        let recipients = Audience::User("user-1".into())
            .resolve(&members, "token")
            .await
            .unwrap();
        assert_eq!(recipients, vec![Recipient::user("user-1")]);
    }

    #[tokio::test]
    async fn test_email_audience_is_already_resolved() {
        let members = Fixed(Err("must not be called"));
        let recipients = Audience::Email("a@example.com".into())
            .resolve(&members, "token")
            .await
            .unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].resolved_email(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn test_space_audience_enumerates_members() {
        let members = Fixed(Ok(vec!["u1", "u2", "u1", "u3"]));
        let recipients = Audience::Space("space-1".into())
            .resolve(&members, "token")
            .await
            .unwrap();
        let ids: Vec<_> = recipients.iter().map(|r| r.identifier()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_empty_organization_is_not_an_error() {
        let members = Fixed(Ok(vec![]));
        let recipients = Audience::Organization("org-1".into())
            .resolve(&members, "token")
            .await
            .unwrap();
        assert!(recipients.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let members = Fixed(Err("platform API down"));
        let result = Audience::Everyone.resolve(&members, "token").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_endorsement_mentions_scope() {
        let text = Audience::UaaScope("cloud_controller.admin".into()).endorsement();
        assert!(text.contains("cloud_controller.admin"));
    }
}
