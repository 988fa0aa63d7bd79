//! SecondFactorGate - External authorization before actuation
//!
//! ## Responsibilities
//!
//! - Parse the authorization function reference (`arn:<partition>:<service>:<region>:<account>:function:<name>`)
//! - Decide which identities require a second factor
//! - Invoke the function synchronously and interpret its response
//!
//! Only approved decisions let the door open. Anything the gate cannot read as
//! an approval is a denial.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Function name sent in the invocation payload
pub const MFA_FUNCTION: &str = "MFA-Auth";

/// Parsed function reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub region: String,
    pub name: String,
}

impl FromStr for FunctionRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 7 {
            return Err(Error::Config(format!(
                "function reference pattern is not correct, got {}",
                s
            )));
        }

        let (region, name) = (parts[3], parts[6]);
        if region.is_empty() || name.is_empty() {
            return Err(Error::Config(format!(
                "function reference is missing region or name: {}",
                s
            )));
        }

        Ok(Self {
            region: region.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

/// Invocation payload
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    #[serde(rename = "Function")]
    pub function: String,
    #[serde(rename = "AuthUser")]
    pub auth_user: String,
}

/// Function invocation capability
#[async_trait]
pub trait AuthorizationFunction: Send + Sync {
    /// Invoke `function` with `payload`, returning the raw response bytes
    async fn invoke(&self, function: &FunctionRef, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Invokes functions over HTTP (`POST /2015-03-31/functions/{name}/invocations`)
pub struct HttpFunctionInvoker {
    client: reqwest::Client,
    endpoint_override: Option<String>,
}

impl HttpFunctionInvoker {
    pub fn new(endpoint_override: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint_override: endpoint_override.map(|e| e.trim_end_matches('/').to_string()),
        })
    }

    fn invoke_url(&self, function: &FunctionRef) -> String {
        let base = self
            .endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://lambda.{}.amazonaws.com", function.region));
        format!("{}/2015-03-31/functions/{}/invocations", base, function.name)
    }
}

#[async_trait]
impl AuthorizationFunction for HttpFunctionInvoker {
    async fn invoke(&self, function: &FunctionRef, payload: &[u8]) -> Result<Vec<u8>> {
        let url = self.invoke_url(function);
        tracing::debug!(function = %function, url = %url, "Invoking authorization function");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        if !status.is_success() {
            return Err(Error::SecondFactor(format!(
                "{} returned {}: {}",
                function,
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        Ok(body)
    }
}

/// Outcome of a second-factor check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactorDecision {
    Approved,
    Denied,
}

impl SecondFactorDecision {
    /// Interpret a raw function response.
    ///
    /// Approvals: JSON `true`, an object with `"authorized": true` /
    /// `"approved": true`, or a `status` / `decision` / bare string of
    /// `approved`, `authorized`, `allow` or `ok` (case-insensitive).
    pub fn from_response(raw: &[u8]) -> Self {
        let value: serde_json::Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(_) => serde_json::Value::String(String::from_utf8_lossy(raw).trim().to_string()),
        };

        let approved = match &value {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => is_approval_word(s),
            serde_json::Value::Object(map) => {
                let flag = ["authorized", "approved"]
                    .iter()
                    .filter_map(|k| map.get(*k))
                    .any(|v| v.as_bool() == Some(true));
                let word = ["status", "decision"]
                    .iter()
                    .filter_map(|k| map.get(*k).and_then(|v| v.as_str()))
                    .any(is_approval_word);
                flag || word
            }
            _ => false,
        };

        if approved {
            SecondFactorDecision::Approved
        } else {
            SecondFactorDecision::Denied
        }
    }
}

fn is_approval_word(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "approved" | "authorized" | "allow" | "ok"
    )
}

/// Gate configuration: the function and which identities it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondFactorConfig {
    pub function: FunctionRef,
    /// Optional invoke endpoint replacing the regional default
    pub endpoint: Option<String>,
    /// identity -> user name passed as `AuthUser`
    pub users: HashMap<String, String>,
}

pub struct SecondFactorGate {
    invoker: Arc<dyn AuthorizationFunction>,
    config: SecondFactorConfig,
}

impl SecondFactorGate {
    pub fn new(invoker: Arc<dyn AuthorizationFunction>, config: SecondFactorConfig) -> Self {
        Self { invoker, config }
    }

    /// User name to authorize for `identity`, if the identity is flagged
    pub fn auth_user(&self, identity: &str) -> Option<&str> {
        self.config.users.get(identity).map(String::as_str)
    }

    /// Run the second factor for `identity`. Unflagged identities are approved
    /// without invoking the function.
    pub async fn authorize(&self, identity: &str) -> Result<SecondFactorDecision> {
        let Some(auth_user) = self.auth_user(identity) else {
            return Ok(SecondFactorDecision::Approved);
        };

        let payload = serde_json::to_vec(&AuthorizationRequest {
            function: MFA_FUNCTION.to_string(),
            auth_user: auth_user.to_string(),
        })?;

        let raw = self.invoker.invoke(&self.config.function, &payload).await?;
        let decision = SecondFactorDecision::from_response(&raw);

        tracing::info!(
            identity = %identity,
            auth_user = %auth_user,
            function = %self.config.function,
            response = %String::from_utf8_lossy(&raw),
            decision = ?decision,
            "Second factor decision"
        );

        Ok(decision)
    }
}
