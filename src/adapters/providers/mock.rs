//! Mock provider client for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::domain::ports::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};

/// Behavior of one mock invocation.
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Return this text and token count.
    Succeed { text: String, tokens: u64 },
    /// Fail with a transport error.
    Fail,
    /// Never complete; exercises the router timeout.
    Hang,
}

/// Scriptable in-memory [`ProviderClient`].
pub struct MockProviderClient {
    behavior: MockBehavior,
    calls: Arc<AtomicU32>,
}

impl MockProviderClient {
    pub fn succeeding(text: impl Into<String>, tokens: u64) -> Self {
        Self {
            behavior: MockBehavior::Succeed {
                text: text.into(),
                tokens,
            },
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: MockBehavior::Fail,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: MockBehavior::Hang,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// How many times `invoke` has been called.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockProviderClient {
    fn client_id(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Succeed { text, tokens } => Ok(ProviderResponse {
                text: text.clone(),
                tokens_used: *tokens,
            }),
            MockBehavior::Fail => Err(ProviderError::Transport("mock failure".to_string())),
            MockBehavior::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
        }
    }
}
