//! Provider selection and governed invocation.
//!
//! Routes each invocation to the primary provider while its budget holds,
//! falling back to the secondary on failure or exhaustion. Actual token
//! consumption is reported to the ledger before the response is returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ProviderId;
use crate::domain::ports::{ProviderClient, ProviderError, ProviderRequest};
use crate::services::budget_ledger::ProviderBudgetLedger;

/// A successful, ledger-recorded invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub text: String,
    pub tokens_used: u64,
    pub provider: ProviderId,
}

/// Router over the configured provider slots.
pub struct ProviderRouter {
    clients: BTreeMap<ProviderId, Arc<dyn ProviderClient>>,
    ledger: Arc<ProviderBudgetLedger>,
    /// Usage fraction at or above which a provider is skipped.
    fallback_threshold: f64,
    /// Per-invocation timeout.
    invoke_timeout: Duration,
}

impl ProviderRouter {
    pub fn new(
        clients: BTreeMap<ProviderId, Arc<dyn ProviderClient>>,
        ledger: Arc<ProviderBudgetLedger>,
        fallback_threshold: f64,
        invoke_timeout_secs: u64,
    ) -> Self {
        Self {
            clients,
            ledger,
            fallback_threshold,
            invoke_timeout: Duration::from_secs(invoke_timeout_secs),
        }
    }

    /// The provider an invocation would be routed to right now.
    ///
    /// Admission checks spend caps against this slot before the invocation
    /// is attempted.
    pub async fn preferred_provider(&self) -> ProviderId {
        let primary_fraction = self.ledger.usage_fraction(ProviderId::Primary).await;
        if primary_fraction < self.fallback_threshold {
            ProviderId::Primary
        } else {
            ProviderId::Secondary
        }
    }

    /// Invoke with fallback.
    ///
    /// Tries each provider in routing order, skipping any at or above its
    /// exhaustion threshold. Transport errors and timeouts fall through to
    /// the next slot. When no slot succeeds the attempt is fatally
    /// `AllProvidersExhausted` — callers record a provider failure; nothing
    /// retries automatically.
    pub async fn invoke(&self, prompt: &str, max_tokens: u32) -> DomainResult<InvocationOutcome> {
        for provider in ProviderId::ROUTING_ORDER {
            let Some(client) = self.clients.get(&provider) else {
                continue;
            };

            let fraction = self.ledger.usage_fraction(provider).await;
            if fraction >= self.fallback_threshold {
                debug!(%provider, fraction, "Skipping provider at exhaustion threshold");
                continue;
            }

            let request = ProviderRequest::new(prompt, max_tokens);
            match timeout(self.invoke_timeout, client.invoke(request)).await {
                Ok(Ok(response)) => {
                    self.ledger
                        .record_usage(provider, response.tokens_used)
                        .await?;
                    debug!(%provider, tokens = response.tokens_used, "Invocation succeeded");
                    return Ok(InvocationOutcome {
                        text: response.text,
                        tokens_used: response.tokens_used,
                        provider,
                    });
                }
                Ok(Err(err)) => {
                    warn!(%provider, error = %err, "Provider invocation failed; trying next");
                }
                Err(_) => {
                    warn!(
                        %provider,
                        timeout_secs = self.invoke_timeout.as_secs(),
                        "Provider invocation timed out; trying next"
                    );
                }
            }
        }

        Err(DomainError::AllProvidersExhausted)
    }
}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(secs) => DomainError::EvaluationTimeout(secs),
            other => DomainError::ProviderInvocationFailed(other.to_string()),
        }
    }
}
