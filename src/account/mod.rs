//! Profiles, accounts and the directory the pipeline looks them up in.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::database::BookDatabase;
use crate::http::HttpAuth;
use crate::mime::normalize_full_type;

/// Profile identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Wraps an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account identifier, unique within a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the account's library supports beyond plain downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountCapabilities {
    /// Content may sit behind a SAML sign-in page.
    pub supports_saml: bool,
    /// Borrowing requires an explicit loan request.
    pub requires_loan_request: bool,
}

/// Credentials an account signs in with.
#[derive(Clone, PartialEq, Eq)]
pub enum AccountCredentials {
    /// Barcode and optional PIN.
    Basic {
        /// Barcode or username.
        username: String,
        /// PIN, when the library uses one.
        password: Option<String>,
    },
    /// Basic credentials exchanged for a token.
    BasicToken {
        /// Barcode or username.
        username: String,
        /// PIN, when the library uses one.
        password: Option<String>,
        /// Token issued for them.
        token: String,
    },
    /// OAuth or SAML bearer token.
    Token {
        /// Bearer token.
        token: String,
    },
}

impl AccountCredentials {
    /// Authorization to attach to library requests.
    #[must_use]
    pub fn http_auth(&self) -> HttpAuth {
        match self {
            Self::Basic { username, password } => HttpAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            Self::BasicToken { token, .. } | Self::Token { token } => HttpAuth::Bearer {
                token: token.clone(),
            },
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::BasicToken { username, .. } => f
                .debug_struct("BasicToken")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
        }
    }
}

/// A library account.
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Library provider the account belongs to.
    pub provider: Url,
    /// Full content types (`type/subtype`) the client can handle for this account.
    pub supported_content_types: HashSet<String>,
    /// Library capabilities.
    pub capabilities: AccountCapabilities,
    /// Sign-in credentials, when signed in.
    pub credentials: Option<AccountCredentials>,
    /// The account's book database.
    pub database: Arc<dyn BookDatabase>,
}

impl Account {
    /// Creates an account; content types are normalized to lower-case full types.
    pub fn new<I, S>(
        id: AccountId,
        provider: Url,
        supported_content_types: I,
        database: Arc<dyn BookDatabase>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            provider,
            supported_content_types: supported_content_types
                .into_iter()
                .map(|value| normalize_full_type(value.as_ref()))
                .collect(),
            capabilities: AccountCapabilities::default(),
            credentials: None,
            database,
        }
    }

    /// Sets the capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: AccountCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: AccountCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("provider", &self.provider.as_str())
            .field("supported_content_types", &self.supported_content_types)
            .field("capabilities", &self.capabilities)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// A reader profile holding one or more accounts.
#[derive(Debug)]
pub struct Profile {
    /// Profile identifier.
    pub id: ProfileId,
    accounts: HashMap<AccountId, Arc<Account>>,
}

impl Profile {
    /// Creates a profile from its accounts.
    pub fn new(id: ProfileId, accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            id,
            accounts: accounts
                .into_iter()
                .map(|account| (account.id.clone(), Arc::new(account)))
                .collect(),
        }
    }

    /// Looks up an account.
    #[must_use]
    pub fn account(&self, id: &AccountId) -> Option<Arc<Account>> {
        self.accounts.get(id).cloned()
    }
}

/// Source of profiles.
pub trait ProfileDirectory: Send + Sync {
    /// Looks up a profile.
    fn find_profile(&self, id: &ProfileId) -> Option<Arc<Profile>>;
}

/// Directory over a fixed set of profiles.
#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    profiles: HashMap<ProfileId, Arc<Profile>>,
}

impl InMemoryProfileDirectory {
    /// Creates a directory from profiles.
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.id.clone(), Arc::new(profile)))
                .collect(),
        }
    }
}

impl ProfileDirectory for InMemoryProfileDirectory {
    fn find_profile(&self, id: &ProfileId) -> Option<Arc<Profile>> {
        self.profiles.get(id).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::database::InMemoryBookDatabase;

    fn account(id: &str) -> Account {
        Account::new(
            AccountId::new(id),
            Url::parse("https://library.example/").unwrap(),
            ["Application/EPUB+zip; charset=x"],
            Arc::new(InMemoryBookDatabase::new(std::env::temp_dir())),
        )
    }

    #[test]
    fn test_supported_types_normalized() {
        let account = account("a");
        assert!(
            account
                .supported_content_types
                .contains("application/epub+zip")
        );
    }

    #[test]
    fn test_directory_lookup() {
        let directory = InMemoryProfileDirectory::new([Profile::new(
            ProfileId::new("p"),
            [account("a")],
        )]);
        let profile = directory.find_profile(&ProfileId::new("p")).unwrap();
        assert!(profile.account(&AccountId::new("a")).is_some());
        assert!(profile.account(&AccountId::new("b")).is_none());
        assert!(directory.find_profile(&ProfileId::new("q")).is_none());
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let credentials = AccountCredentials::Basic {
            username: "barcode".to_string(),
            password: Some("1234".to_string()),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("barcode"));
        assert!(!rendered.contains("1234"));
    }

    #[test]
    fn test_token_credentials_use_bearer() {
        let credentials = AccountCredentials::Token {
            token: "abc".to_string(),
        };
        assert!(matches!(credentials.http_auth(), HttpAuth::Bearer { token } if token == "abc"));
    }
}
