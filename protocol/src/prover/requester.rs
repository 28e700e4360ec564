use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{ProofRequest, ProofResponse, ProverError, ProverService, SpendDescription};
use crate::config::RetryPolicy;

/// Obtains spend proofs from a [`ProverService`].
///
/// Transient failures and per-attempt timeouts are retried with exponential
/// backoff up to the policy's attempt count. A rejection is returned as soon
/// as it arrives. The witness is sealed once; every attempt resends the same
/// request.
#[derive(Clone)]
pub struct ProofRequester {
    service: Arc<dyn ProverService>,
    policy: RetryPolicy,
}

impl ProofRequester {
    pub fn new(service: Arc<dyn ProverService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn request(&self, spend: &SpendDescription) -> Result<ProofResponse, ProverError> {
        let key = self
            .with_retry("encryption_key", || self.service.encryption_key())
            .await?;
        let request = ProofRequest::new(spend, &key)?;
        debug!(
            request = %request.request_id,
            inputs = request.nullifiers.len(),
            amount = request.amount,
            "requesting spend proof"
        );

        let response = self
            .with_retry("request_proof", || self.service.request_proof(&request))
            .await?;
        if response.request_id != request.request_id {
            return Err(ProverError::Rejected(format!(
                "response for {} answers request {}",
                response.request_id, request.request_id
            )));
        }
        Ok(response)
    }

    async fn with_retry<T, F, Fut>(&self, call: &'static str, mut op: F) -> Result<T, ProverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProverError>>,
    {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match timeout(self.policy.attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(ProverError::Transient(msg))) => last_error = msg,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.policy.attempt_timeout)
                }
            }

            if attempt + 1 < attempts {
                let backoff = self.policy.backoff_for(attempt);
                warn!(
                    call,
                    attempt = attempt + 1,
                    of = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_error,
                    "prover call failed, retrying"
                );
                sleep(backoff).await;
            }
        }

        Err(ProverError::Transient(format!(
            "{} failed after {} attempts: {}",
            call, attempts, last_error
        )))
    }
}

impl std::fmt::Debug for ProofRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofRequester")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
