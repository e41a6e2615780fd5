use std::fmt;

use serde::{Deserialize, Serialize};

use super::IdentityError;

/// External identity providers supported for social login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub const fn label(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "google" => Some(Provider::Google),
            "github" => Some(Provider::Github),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Userinfo payload as returned by Google's OpenID Connect endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
}

/// User payload as returned by GitHub's `/user` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubProfile {
    pub id: u64,
    pub login: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Provider callback payload, tagged by provider so each shape is parsed on its own terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "profile", rename_all = "lowercase")]
pub enum ProviderProfile {
    Google(GoogleProfile),
    Github(GithubProfile),
}

/// Provider-neutral identity the portal binds to a student record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedIdentity {
    pub provider: Provider,
    pub subject: String,
    pub email: String,
    pub display_name: String,
}

impl ProviderProfile {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderProfile::Google(_) => Provider::Google,
            ProviderProfile::Github(_) => Provider::Github,
        }
    }

    /// Reduce a provider payload to `(provider, subject, email, display_name)`.
    ///
    /// The email is returned as supplied; callers normalize it alongside local registrations.
    pub fn normalize(self) -> Result<DelegatedIdentity, IdentityError> {
        match self {
            ProviderProfile::Google(profile) => {
                if profile.email_verified == Some(false) {
                    return Err(IdentityError::Unauthenticated(
                        "provider email address is not verified",
                    ));
                }
                let email = non_empty(profile.email)
                    .ok_or(IdentityError::Unauthenticated("provider did not share an email"))?;
                let display_name = non_empty(profile.name)
                    .unwrap_or_else(|| local_part(&email).to_string());
                Ok(DelegatedIdentity {
                    provider: Provider::Google,
                    subject: profile.sub,
                    email,
                    display_name,
                })
            }
            ProviderProfile::Github(profile) => {
                let email = non_empty(profile.email)
                    .ok_or(IdentityError::Unauthenticated("provider did not share an email"))?;
                let display_name = non_empty(profile.name).unwrap_or(profile.login);
                Ok(DelegatedIdentity {
                    provider: Provider::Github,
                    subject: profile.id.to_string(),
                    email,
                    display_name,
                })
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn local_part(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}
