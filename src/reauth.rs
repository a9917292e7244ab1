//! Reauthorization request path
//!
//! When an operation discovers its credential has been rejected, the executor
//! asks an external authority for a fresh one through a [`Reauthorizer`].
//! The dependency is explicit — passed in at construction — so tests stub it
//! and embedders choose how requests get answered: in-process via
//! [`IssuerReauthorizer`], from a separate task via [`ChannelReauthorizer`],
//! or not at all via [`DeclineReauthorizer`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::{Credential, ResourceKey};
use crate::executor::OperationFailure;
use crate::issuer::CredentialIssuer;

/// Answers reauthorization requests raised mid-retry
///
/// Returning `None` means the authority declines; the in-flight call fails
/// with a reauthorization error and the stale credential stays live. The
/// executor bounds the wait with its own timeout, so implementations may
/// answer asynchronously.
#[async_trait]
pub trait Reauthorizer: Send + Sync {
    /// Produces a fresh credential for `resource_key`, or declines
    async fn reauthorize(
        &self,
        resource_key: &ResourceKey,
        last_failure: &OperationFailure,
    ) -> Option<Credential>;
}

/// Declines every request
///
/// The default when the embedding application registers no requestor: a
/// rejected credential then surfaces after a single reauthorization attempt
/// instead of looping.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineReauthorizer;

#[async_trait]
impl Reauthorizer for DeclineReauthorizer {
    async fn reauthorize(
        &self,
        resource_key: &ResourceKey,
        _last_failure: &OperationFailure,
    ) -> Option<Credential> {
        debug!(resource_key = %resource_key, "No reauthorization requestor registered; declining");
        None
    }
}

/// Answers by rotating through a [`CredentialIssuer`]
///
/// This is the wiring most embedders want: a rejected credential triggers a
/// full rotation (new pair applied to the resource, installed in the store),
/// and the in-flight call retries with the result. An issuance failure is a
/// decline.
pub struct IssuerReauthorizer {
    issuer: Arc<CredentialIssuer>,
}

impl IssuerReauthorizer {
    /// Creates a requestor that rotates via `issuer`
    pub fn new(issuer: Arc<CredentialIssuer>) -> Self {
        Self { issuer }
    }
}

#[async_trait]
impl Reauthorizer for IssuerReauthorizer {
    async fn reauthorize(
        &self,
        resource_key: &ResourceKey,
        last_failure: &OperationFailure,
    ) -> Option<Credential> {
        debug!(
            resource_key = %resource_key,
            failure = %last_failure,
            "Reauthorizing by issuing a replacement credential"
        );
        match self.issuer.issue_and_install(resource_key).await {
            Ok(credential) => Some(Credential::clone(&credential)),
            Err(error) => {
                warn!(
                    resource_key = %resource_key,
                    error = %error,
                    "Issuance failed during reauthorization; declining"
                );
                None
            }
        }
    }
}

/// One reauthorization request in flight on a [`ChannelReauthorizer`]
///
/// The responder answers through `reply`; dropping it without sending is a
/// decline.
#[derive(Debug)]
pub struct AuthorizationRequest {
    /// Resource key whose credential was rejected
    pub resource_key: ResourceKey,
    /// The rejection that triggered the request
    pub last_failure: OperationFailure,
    /// Channel for the answer (`None` = declined)
    pub reply: oneshot::Sender<Option<Credential>>,
}

/// Forwards requests over a bounded channel to an out-of-band responder
///
/// # Examples
///
/// ```
/// use keyrotor::prelude::*;
/// use keyrotor::reauth::{AuthorizationRequest, ChannelReauthorizer};
///
/// # async fn example() {
/// let (reauthorizer, mut requests) = ChannelReauthorizer::new(8);
///
/// // The embedding application answers requests from its own task:
/// tokio::spawn(async move {
///     while let Some(request) = requests.recv().await {
///         let fresh = Credential::new(request.resource_key.clone(), "NewUser", "newPwd");
///         let _ = request.reply.send(Some(fresh));
///     }
/// });
/// # }
/// ```
pub struct ChannelReauthorizer {
    requests: mpsc::Sender<AuthorizationRequest>,
}

impl ChannelReauthorizer {
    /// Creates the requestor and the receiving end the responder consumes
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuthorizationRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl Reauthorizer for ChannelReauthorizer {
    async fn reauthorize(
        &self,
        resource_key: &ResourceKey,
        last_failure: &OperationFailure,
    ) -> Option<Credential> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = AuthorizationRequest {
            resource_key: resource_key.clone(),
            last_failure: last_failure.clone(),
            reply: reply_tx,
        };

        if self.requests.send(request).await.is_err() {
            warn!(
                resource_key = %resource_key,
                "Reauthorization responder is gone; declining"
            );
            return None;
        }

        // A dropped reply sender is a decline.
        reply_rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ResourceKey {
        ResourceKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn decline_reauthorizer_always_declines() {
        let reauthorizer = DeclineReauthorizer;
        let answer = reauthorizer
            .reauthorize(&key("TestDB"), &OperationFailure::new("login failed"))
            .await;
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn channel_reauthorizer_round_trip() {
        let (reauthorizer, mut requests) = ChannelReauthorizer::new(4);

        let responder = tokio::spawn(async move {
            let request = requests.recv().await.expect("one request");
            assert_eq!(request.resource_key.as_str(), "TestDB");
            assert_eq!(request.last_failure.message, "login failed");
            let fresh =
                Credential::new(request.resource_key.clone(), "NewUser", "newPwd");
            request.reply.send(Some(fresh)).expect("requester waiting");
        });

        let answer = reauthorizer
            .reauthorize(&key("TestDB"), &OperationFailure::new("login failed"))
            .await
            .expect("responder supplied a credential");
        assert_eq!(answer.principal(), "NewUser");

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_reply_is_a_decline() {
        let (reauthorizer, mut requests) = ChannelReauthorizer::new(4);

        let responder = tokio::spawn(async move {
            let request = requests.recv().await.expect("one request");
            drop(request.reply);
        });

        let answer = reauthorizer
            .reauthorize(&key("TestDB"), &OperationFailure::new("login failed"))
            .await;
        assert!(answer.is_none());

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn closed_channel_is_a_decline() {
        let (reauthorizer, requests) = ChannelReauthorizer::new(4);
        drop(requests);

        let answer = reauthorizer
            .reauthorize(&key("TestDB"), &OperationFailure::new("login failed"))
            .await;
        assert!(answer.is_none());
    }
}
