//! Optional post-create enrichment hook (A5).
//!
//! The user-facing trait uses `impl Future` for ergonomic implementations,
//! and a boxed wrapper erases that into a `dyn`-compatible type so
//! [`crate::store::Engine::open`] can hold one behind a trait object. No
//! hook is registered by default; the optional `http-enrichment` feature
//! adds a concrete HTTP-based implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// What the hook receives after a successful `create`.
#[derive(Debug, Clone)]
pub struct EnrichmentInput {
    pub item_type: String,
    pub id: String,
    pub title: String,
    pub content: Option<String>,
}

/// A post-create side effect (e.g. embedding extraction). Implementations
/// MUST NOT fail the item write: errors and timeouts are logged and ignored
/// by the caller, never propagated back into `create`.
pub trait EnrichmentHook: Send + Sync {
    fn enrich(&self, input: &EnrichmentInput) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Object-safe wrapper so `Engine` can hold `Box<dyn EnrichmentHookBoxed>`
/// without committing to one concrete hook type at compile time.
pub trait EnrichmentHookBoxed: Send + Sync {
    fn enrich_boxed<'a>(
        &'a self,
        input: &'a EnrichmentInput,
    ) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send + 'a>>;
}

impl<H: EnrichmentHook> EnrichmentHookBoxed for H {
    fn enrich_boxed<'a>(
        &'a self,
        input: &'a EnrichmentInput,
    ) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send + 'a>> {
        Box::pin(self.enrich(input))
    }
}

/// Registered hook plus the caller-supplied deadline it must be driven
/// under. The core never decides this timeout itself.
pub struct BoxedHook {
    inner: Box<dyn EnrichmentHookBoxed>,
    pub timeout: Duration,
}

impl BoxedHook {
    #[must_use]
    pub fn new<H: EnrichmentHook + 'static>(hook: H, timeout: Duration) -> Self {
        Self { inner: Box::new(hook), timeout }
    }

    pub async fn run(&self, input: &EnrichmentInput) -> crate::Result<()> {
        self.inner.enrich_boxed(input).await
    }
}

#[cfg(feature = "http-enrichment")]
pub mod http {
    //! A minimal HTTP-based enrichment hook: POSTs the new item to a
    //! configured endpoint. Used for external AI summarisation/embedding
    //! services; never part of the core's write path.

    use super::{EnrichmentHook, EnrichmentInput};
    use serde_json::json;

    pub struct HttpEnrichmentHook {
        client: reqwest::Client,
        endpoint: String,
    }

    impl HttpEnrichmentHook {
        #[must_use]
        pub fn new(endpoint: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                endpoint: endpoint.into(),
            }
        }
    }

    impl EnrichmentHook for HttpEnrichmentHook {
        async fn enrich(&self, input: &EnrichmentInput) -> crate::Result<()> {
            let body = json!({
                "type": input.item_type,
                "id": input.id,
                "title": input.title,
                "content": input.content,
            });
            self.client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| crate::Error::Internal(format!("enrichment request failed: {e}")))?;
            Ok(())
        }
    }
}
