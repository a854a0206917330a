use serde::{Deserialize, Serialize};

/// String claims that rule predicates may name even when the identity
/// provider did not assert them. Absent ones are presented as `""`.
const RULE_STRING_CLAIMS: [&str; 6] = [
    "iss",
    "email",
    "name",
    "preferred_username",
    "service_account_name",
    "service_account_namespace",
];

/// `Claims` carries the authenticated identity of one request.
///
/// Built by the identity authorizer (SSO mode) or derived from a credential
/// (Client and Server modes) and handed to downstream handlers once the
/// gatekeeper has resolved the call. The serialized form is the input of
/// service-account rule predicates, so field names follow the token claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer.
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    issuer: String,
    /// Subject: the authenticated user or service account.
    #[serde(rename = "sub", default)]
    subject: String,
    /// Email address, when the identity provider asserts one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_username: Option<String>,
    /// Group memberships in the order the identity provider returned them.
    #[serde(default)]
    groups: Vec<String>,
    /// Service account chosen to act on behalf of the subject.
    /// Written by RBAC delegation; empty until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_account_namespace: Option<String>,
}

impl Claims {
    /// Create a new `Claims` builder
    #[must_use]
    pub fn builder() -> ClaimsBuilder {
        ClaimsBuilder::default()
    }

    /// Claims of a caller whose identity could not be derived.
    #[must_use]
    pub fn anonymous() -> Self {
        ClaimsBuilder::default().build()
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.preferred_username.as_deref()
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[must_use]
    pub fn service_account_name(&self) -> Option<&str> {
        self.service_account_name.as_deref()
    }

    #[must_use]
    pub fn service_account_namespace(&self) -> Option<&str> {
        self.service_account_namespace.as_deref()
    }

    /// Record the service account that will act for this subject.
    pub fn set_service_account_name(&mut self, name: impl Into<String>) {
        self.service_account_name = Some(name.into());
    }

    pub fn set_service_account_namespace(&mut self, namespace: impl Into<String>) {
        self.service_account_namespace = Some(namespace.into());
    }

    /// JSON view of the claims, as seen by rule predicates.
    ///
    /// Every known claim is present: unasserted string claims are `""`, so a
    /// rule naming one evaluates instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(fields) = value.as_object_mut() {
            for key in RULE_STRING_CLAIMS {
                fields
                    .entry(key)
                    .or_insert_with(|| serde_json::Value::String(String::new()));
            }
        }
        Ok(value)
    }
}

#[derive(Default)]
pub struct ClaimsBuilder {
    issuer: Option<String>,
    subject: Option<String>,
    email: Option<String>,
    email_verified: bool,
    name: Option<String>,
    preferred_username: Option<String>,
    groups: Vec<String>,
    service_account_name: Option<String>,
    service_account_namespace: Option<String>,
}

impl ClaimsBuilder {
    #[must_use]
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_owned());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_owned());
        self
    }

    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_owned());
        self
    }

    #[must_use]
    pub fn email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn preferred_username(mut self, username: &str) -> Self {
        self.preferred_username = Some(username.to_owned());
        self
    }

    #[must_use]
    pub fn groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    #[must_use]
    pub fn service_account_name(mut self, name: &str) -> Self {
        self.service_account_name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn service_account_namespace(mut self, namespace: &str) -> Self {
        self.service_account_namespace = Some(namespace.to_owned());
        self
    }

    #[must_use]
    pub fn build(self) -> Claims {
        Claims {
            issuer: self.issuer.unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            email: self.email.filter(|e| !e.is_empty()),
            email_verified: self.email_verified,
            name: self.name,
            preferred_username: self.preferred_username,
            groups: self.groups,
            service_account_name: self.service_account_name,
            service_account_namespace: self.service_account_namespace,
        }
    }
}
