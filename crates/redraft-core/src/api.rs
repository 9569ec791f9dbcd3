//! Create-fork and merge-fork endpoints.
//!
//! Both take a document id plus a caller token and answer with redirect
//! instructions:
//!
//! ```json
//! {"shouldRedirect": true, "redirectUrl": "http://localhost/wp-admin/post.php?post=43&action=edit", "message": "..."}
//! ```
//!
//! The token is checked before the fork engine is touched. Engine failures
//! that an editor can act on keep their message; anything else is reduced to
//! a generic one and the detail stays in the logs.

use crate::error::{ErrorCode, ForkError};
use crate::model::DocumentId;
use crate::store::DocumentStore;
use crate::workflow::{FORK_CREATED_NOTICE, FORK_MERGED_NOTICE, WorkflowTrigger};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

const TOKEN_CONTEXT: &str = "redraft 2024-06 endpoint request tokens";

/// The two remote operations an editor can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointAction {
    Fork,
    Merge,
}

impl EndpointAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for EndpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fork" => Ok(Self::Fork),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown endpoint action '{other}': expected fork or merge")),
        }
    }
}

/// Incoming request for either endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRequest {
    pub document_id: DocumentId,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResponse {
    pub should_redirect: bool,
    pub redirect_url: Option<String>,
    pub message: Option<String>,
}

/// Error payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("request token rejected for {action} on document {id}")]
    Unauthorized { action: EndpointAction, id: DocumentId },

    #[error(transparent)]
    Engine(#[from] ForkError),
}

impl EndpointError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Engine(err) => err.code(),
        }
    }

    /// HTTP-style status for transports that need one.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 403,
            Self::Engine(ForkError::InvalidArgument(_)) => 400,
            Self::Engine(
                ForkError::NotForkable { .. }
                | ForkError::NotAFork { .. }
                | ForkError::InvalidTransition { .. },
            ) => 409,
            Self::Engine(ForkError::ForkFailed(_) | ForkError::Store(_)) => 500,
        }
    }

    /// Message safe to show an editor.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Engine(err) if err.is_actionable() => err.to_string(),
            other => other.code().message().to_string(),
        }
    }

    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().code(),
            status: self.status(),
            message: self.public_message(),
            hint: self.code().hint(),
        }
    }
}

/// Checks a caller token for an action on one document.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, action: EndpointAction, id: DocumentId, token: &str) -> bool;
}

/// Tokens derived with keyed BLAKE3 over `"<action>:<id>"`.
#[derive(Clone)]
pub struct KeyedTokens {
    key: [u8; 32],
}

impl fmt::Debug for KeyedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedTokens").finish_non_exhaustive()
    }
}

impl KeyedTokens {
    #[must_use]
    pub const fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the signing key from a configured secret string.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::from_key(blake3::derive_key(TOKEN_CONTEXT, secret.as_bytes()))
    }

    #[must_use]
    pub fn issue(&self, action: EndpointAction, id: DocumentId) -> String {
        self.digest(action, id).to_hex().to_string()
    }

    fn digest(&self, action: EndpointAction, id: DocumentId) -> blake3::Hash {
        blake3::keyed_hash(&self.key, format!("{action}:{id}").as_bytes())
    }
}

impl TokenVerifier for KeyedTokens {
    fn verify(&self, action: EndpointAction, id: DocumentId, token: &str) -> bool {
        // `blake3::Hash` equality is constant time.
        blake3::Hash::from_hex(token.trim()).is_ok_and(|given| given == self.digest(action, id))
    }
}

/// The two endpoints, bound to a workflow trigger and a token verifier.
#[derive(Debug)]
pub struct Endpoints<'a, S: DocumentStore + ?Sized, V: TokenVerifier> {
    trigger: WorkflowTrigger<'a, S>,
    verifier: &'a V,
}

impl<'a, S: DocumentStore + ?Sized, V: TokenVerifier> Endpoints<'a, S, V> {
    #[must_use]
    pub const fn new(trigger: WorkflowTrigger<'a, S>, verifier: &'a V) -> Self {
        Self { trigger, verifier }
    }

    pub fn create_fork(&self, request: &ForkRequest) -> Result<EndpointResponse, EndpointError> {
        self.authorize(EndpointAction::Fork, request)?;
        let redirect = self
            .trigger
            .request_fork(request.document_id)
            .map_err(|err| Self::log_failure(EndpointAction::Fork, request.document_id, err))?;
        Ok(EndpointResponse {
            should_redirect: true,
            redirect_url: Some(redirect.url),
            message: Some(FORK_CREATED_NOTICE.to_string()),
        })
    }

    pub fn merge_fork(&self, request: &ForkRequest) -> Result<EndpointResponse, EndpointError> {
        self.authorize(EndpointAction::Merge, request)?;
        let redirect = self
            .trigger
            .request_merge(request.document_id)
            .map_err(|err| Self::log_failure(EndpointAction::Merge, request.document_id, err))?;
        Ok(EndpointResponse {
            should_redirect: true,
            redirect_url: Some(redirect.url),
            message: Some(FORK_MERGED_NOTICE.to_string()),
        })
    }

    fn authorize(&self, action: EndpointAction, request: &ForkRequest) -> Result<(), EndpointError> {
        let id = request.document_id;
        if !self.verifier.verify(action, id, &request.token) {
            warn!(action = action.as_str(), document = %id, "endpoint token rejected");
            return Err(EndpointError::Unauthorized { action, id });
        }
        if self.trigger.engine().document(id)?.is_none() {
            return Err(ForkError::InvalidArgument(format!("document {id} is not a valid document")).into());
        }
        Ok(())
    }

    fn log_failure(action: EndpointAction, id: DocumentId, err: ForkError) -> EndpointError {
        if !err.is_actionable() {
            warn!(action = action.as_str(), document = %id, error = %err, "endpoint request failed");
        }
        EndpointError::Engine(err)
    }
}
