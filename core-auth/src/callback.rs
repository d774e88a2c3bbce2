//! Callback Resolver
//!
//! Turns a one-time authorization code into a confirmed local session.
//! The transitions run strictly in order:
//!
//! ```text
//! AWAITING_CODE -> state check -> token exchange -> identity resolution
//!               -> token persistence -> session issue
//! ```
//!
//! Each step is a fallible method with exactly one `AuthError` variant on
//! failure; any failure terminates the invocation (no partial retry) and
//! the client restarts from the Authorization Initiator. The client is
//! expected to clear its persisted state the moment it submits the
//! callback, match or mismatch, so a stale state can never be replayed
//! against a second code.

use crate::authorize::check_redirect_uri;
use crate::error::{AuthError, Result};
use crate::session::SessionIssuer;
use crate::types::{OAuthTokens, UserProfile};
use bridge_traits::provider::{DesignHost, ProviderProfile, ProviderTokens};
use bridge_traits::stores::{CreateUserOutcome, Identity, IdentityStore, TokenStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Everything the callback carries: the provider's echo (`code`, `state`)
/// plus the values the client persisted before navigating away
/// (`expected_state`, `redirect_uri`).
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub code: String,
    pub redirect_uri: String,
    /// State echoed back by the provider
    pub state: String,
    /// State the client persisted when the flow began
    pub expected_state: String,
}

/// Successful resolver outcome: the opaque session handle and the local
/// user it belongs to. Provider tokens are deliberately absent.
#[derive(Debug)]
pub struct AuthenticatedSession {
    pub session: crate::session::SessionToken,
    pub user: UserProfile,
}

/// The callback state machine.
pub struct CallbackResolver {
    provider: Arc<dyn DesignHost>,
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<dyn TokenStore>,
    sessions: SessionIssuer,
    allowed_redirect_origins: Vec<String>,
}

impl CallbackResolver {
    pub fn new(
        provider: Arc<dyn DesignHost>,
        identities: Arc<dyn IdentityStore>,
        tokens: Arc<dyn TokenStore>,
        sessions: SessionIssuer,
        allowed_redirect_origins: Vec<String>,
    ) -> Self {
        Self {
            provider,
            identities,
            tokens,
            sessions,
            allowed_redirect_origins,
        }
    }

    /// Run the full state machine for one callback invocation.
    #[instrument(skip(self, request))]
    pub async fn resolve(&self, request: CallbackRequest) -> Result<AuthenticatedSession> {
        self.validate_state(&request)?;
        check_redirect_uri(&request.redirect_uri, &self.allowed_redirect_origins)?;

        let grant = self.exchange_code(&request).await?;
        let (user_id, user) = self.resolve_identity(&grant).await?;
        self.persist_tokens(user_id, grant).await?;
        let session = self.sessions.issue(user_id).await?;

        info!(user_id = %user_id, "Callback resolved, session issued");
        Ok(AuthenticatedSession { session, user })
    }

    /// STATE_VALIDATED: the provider's echo must equal the client's
    /// persisted copy. On mismatch the flow stops before any exchange
    /// call, closing the code-injection window.
    fn validate_state(&self, request: &CallbackRequest) -> Result<()> {
        if request.expected_state.is_empty()
            || request.state.is_empty()
            || request.state != request.expected_state
        {
            warn!("State parameter mismatch on callback");
            return Err(AuthError::InvalidState);
        }
        Ok(())
    }

    /// TOKEN_EXCHANGED: one exchange call, ever. The code is single-use
    /// by provider contract, so a rejection is final.
    async fn exchange_code(&self, request: &CallbackRequest) -> Result<ProviderTokens> {
        let grant = self
            .provider
            .exchange_code(&request.code, &request.redirect_uri)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization code exchange rejected");
                AuthError::TokenExchangeFailed(e.to_string())
            })?;

        debug!(expires_in = grant.expires_in, "Authorization code exchanged");
        Ok(grant)
    }

    /// IDENTITY_RESOLVED: fetch who the token belongs to and map it onto
    /// a local user, creating one if needed.
    async fn resolve_identity(&self, grant: &ProviderTokens) -> Result<(Uuid, UserProfile)> {
        let profile = self
            .provider
            .fetch_profile(&grant.access_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "Provider identity fetch failed");
                AuthError::IdentityResolution(e.to_string())
            })?;

        let email = profile.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::IdentityResolution(
                "Provider profile carried no email".to_string(),
            ));
        }

        let user_id = match self.identities.find_by_external_id(&profile.external_id).await? {
            Some(existing) => existing.user_id,
            None => self.user_for_new_identity(&profile, &email).await?,
        };

        // Upsert keyed by external id: refreshes the mutable profile
        // fields on repeat sign-ins, creates the link on the first one.
        self.identities
            .upsert_identity(&Identity {
                user_id,
                external_id: profile.external_id.clone(),
                email: email.clone(),
                name: profile.name.clone(),
                avatar_url: profile.avatar_url.clone(),
            })
            .await?;

        Ok((
            user_id,
            UserProfile {
                id: user_id,
                email,
                name: profile.name,
                avatar_url: profile.avatar_url,
            },
        ))
    }

    /// Create a local user for a first-time external identity, falling
    /// back to the existing user when the email is already registered.
    /// Creation and linking are not atomic against a concurrently
    /// existing account; the fallback reconciles that race.
    async fn user_for_new_identity(
        &self,
        profile: &ProviderProfile,
        email: &str,
    ) -> Result<Uuid> {
        match self.identities.create_user(email).await? {
            CreateUserOutcome::Created(user_id) => {
                info!(user_id = %user_id, "Created local user for new identity");
                Ok(user_id)
            }
            CreateUserOutcome::EmailTaken => {
                let user_id = self
                    .identities
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| {
                        AuthError::IdentityResolution(
                            "Email registered but owning user not found".to_string(),
                        )
                    })?;

                // Auditable: an external identity is being attached to a
                // pre-existing account on email match alone.
                warn!(
                    user_id = %user_id,
                    external_id = %profile.external_id,
                    "account_linked_by_email"
                );
                Ok(user_id)
            }
        }
    }

    /// TOKENS_PERSISTED: wholesale atomic replace keyed by user id, so
    /// retries and double-submitted callbacks converge on one record.
    async fn persist_tokens(&self, user_id: Uuid, grant: ProviderTokens) -> Result<()> {
        let tokens = OAuthTokens::from_grant(grant, None)?;
        self.tokens.upsert(&tokens.into_record(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_server::MemoryStores;
    use bridge_traits::provider::{ProviderError, ProviderFile};
    use mockall::mock;

    mock! {
        Provider {}

        #[async_trait::async_trait]
        impl DesignHost for Provider {
            async fn exchange_code(
                &self,
                code: &str,
                redirect_uri: &str,
            ) -> bridge_traits::provider::Result<ProviderTokens>;
            async fn refresh_token(
                &self,
                refresh_token: &str,
            ) -> bridge_traits::provider::Result<ProviderTokens>;
            async fn fetch_profile(
                &self,
                access_token: &str,
            ) -> bridge_traits::provider::Result<ProviderProfile>;
            async fn fetch_file(
                &self,
                access_token: &str,
                file_key: &str,
            ) -> bridge_traits::provider::Result<ProviderFile>;
        }
    }

    fn grant() -> ProviderTokens {
        ProviderTokens {
            access_token: "provider-access".to_string(),
            refresh_token: Some("provider-refresh".to_string()),
            expires_in: 3600,
        }
    }

    fn profile() -> ProviderProfile {
        ProviderProfile {
            external_id: "fig-123".to_string(),
            email: "Ada@Example.com".to_string(),
            name: "Ada".to_string(),
            avatar_url: Some("https://img.example/a.png".to_string()),
        }
    }

    fn request() -> CallbackRequest {
        CallbackRequest {
            code: "one-time-code".to_string(),
            redirect_uri: "https://app.example.com/auth".to_string(),
            state: "state-abc".to_string(),
            expected_state: "state-abc".to_string(),
        }
    }

    fn resolver(provider: MockProvider, stores: &MemoryStores) -> CallbackResolver {
        let stores_arc = Arc::new(stores.clone());
        CallbackResolver::new(
            Arc::new(provider),
            stores_arc.clone(),
            stores_arc.clone(),
            SessionIssuer::new(stores_arc, 24),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_state_mismatch_blocks_exchange() {
        let mut provider = MockProvider::new();
        provider.expect_exchange_code().times(0);
        provider.expect_fetch_profile().times(0);

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let result = resolver
            .resolve(CallbackRequest {
                state: "echoed-by-provider".to_string(),
                expected_state: "what-client-stored".to_string(),
                ..request()
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
        assert_eq!(stores.token_count().await, 0);
        assert_eq!(stores.identity_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_expected_state_is_a_mismatch() {
        let mut provider = MockProvider::new();
        provider.expect_exchange_code().times(0);

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let result = resolver
            .resolve(CallbackRequest {
                state: String::new(),
                expected_state: String::new(),
                ..request()
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_successful_first_callback() {
        let mut provider = MockProvider::new();
        provider
            .expect_exchange_code()
            .withf(|code, redirect_uri| {
                code == "one-time-code" && redirect_uri == "https://app.example.com/auth"
            })
            .times(1)
            .returning(|_, _| Ok(grant()));
        provider
            .expect_fetch_profile()
            .withf(|access| access == "provider-access")
            .times(1)
            .returning(|_| Ok(profile()));

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let outcome = resolver.resolve(request()).await.expect("resolve failed");

        // Email normalized, profile surfaced, no provider tokens exposed.
        assert_eq!(outcome.user.email, "ada@example.com");
        assert_eq!(outcome.user.name, "Ada");

        // Exactly one identity, one token record.
        assert_eq!(stores.identity_count().await, 1);
        assert_eq!(stores.token_count().await, 1);

        let record = TokenStore::find(&stores, outcome.user.id)
            .await
            .unwrap()
            .expect("token record missing");
        assert_eq!(record.access_token, "provider-access");
        assert_eq!(record.refresh_token, "provider-refresh");

        // The issued session resolves back to the user.
        let issuer = SessionIssuer::new(Arc::new(stores.clone()), 24);
        let resolved = issuer
            .resolve(&outcome.session.into_string())
            .await
            .unwrap();
        assert_eq!(resolved, Some(outcome.user.id));
    }

    #[tokio::test]
    async fn test_repeat_callback_converges_on_one_record() {
        let mut provider = MockProvider::new();
        provider
            .expect_exchange_code()
            .times(2)
            .returning(|_, _| Ok(grant()));

        let mut names = vec!["Ada", "Ada Lovelace"].into_iter();
        provider.expect_fetch_profile().times(2).returning(move |_| {
            let mut p = profile();
            p.name = names.next().unwrap().to_string();
            Ok(p)
        });

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let first = resolver.resolve(request()).await.unwrap();
        let second = resolver
            .resolve(CallbackRequest {
                code: "another-code".to_string(),
                ..request()
            })
            .await
            .unwrap();

        // Same local user, single identity and token record, refreshed
        // mutable fields.
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(second.user.name, "Ada Lovelace");
        assert_eq!(stores.identity_count().await, 1);
        assert_eq!(stores.token_count().await, 1);

        let identity = IdentityStore::find_by_external_id(&stores, "fig-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_email_collision_links_existing_user() {
        let mut provider = MockProvider::new();
        provider
            .expect_exchange_code()
            .times(1)
            .returning(|_, _| Ok(grant()));
        provider
            .expect_fetch_profile()
            .times(1)
            .returning(|_| Ok(profile()));

        let stores = MemoryStores::new();
        // An account already owns this email through another flow.
        let CreateUserOutcome::Created(existing) =
            stores.create_user("ada@example.com").await.unwrap()
        else {
            panic!("seed user creation failed");
        };

        let resolver = resolver(provider, &stores);
        let outcome = resolver.resolve(request()).await.unwrap();

        assert_eq!(outcome.user.id, existing);
        let identity = IdentityStore::find_by_external_id(&stores, "fig-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, existing);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_terminal() {
        let mut provider = MockProvider::new();
        provider.expect_exchange_code().times(1).returning(|_, _| {
            Err(ProviderError::Api {
                status: 400,
                message: "code already redeemed".to_string(),
            })
        });
        provider.expect_fetch_profile().times(0);

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let result = resolver.resolve(request()).await;
        assert!(matches!(result, Err(AuthError::TokenExchangeFailed(_))));
        assert_eq!(stores.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_profile_fetch_failure_is_terminal() {
        let mut provider = MockProvider::new();
        provider
            .expect_exchange_code()
            .times(1)
            .returning(|_, _| Ok(grant()));
        provider.expect_fetch_profile().times(1).returning(|_| {
            Err(ProviderError::Transport("connection reset".to_string()))
        });

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let result = resolver.resolve(request()).await;
        assert!(matches!(result, Err(AuthError::IdentityResolution(_))));
        assert_eq!(stores.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_exchange_grant_without_refresh_token_fails() {
        let mut provider = MockProvider::new();
        provider.expect_exchange_code().times(1).returning(|_, _| {
            Ok(ProviderTokens {
                refresh_token: None,
                ..grant()
            })
        });
        provider
            .expect_fetch_profile()
            .times(1)
            .returning(|_| Ok(profile()));

        let stores = MemoryStores::new();
        let resolver = resolver(provider, &stores);

        let result = resolver.resolve(request()).await;
        assert!(matches!(result, Err(AuthError::TokenExchangeFailed(_))));
        assert_eq!(stores.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_disallowed_redirect_rejected_before_exchange() {
        let mut provider = MockProvider::new();
        provider.expect_exchange_code().times(0);

        let stores = MemoryStores::new();
        let stores_arc = Arc::new(stores.clone());
        let resolver = CallbackResolver::new(
            Arc::new(provider),
            stores_arc.clone(),
            stores_arc.clone(),
            SessionIssuer::new(stores_arc, 24),
            vec!["https://app.example.com".to_string()],
        );

        let result = resolver
            .resolve(CallbackRequest {
                redirect_uri: "https://evil.example.com/auth".to_string(),
                ..request()
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidRedirectUri(_))));
    }
}
