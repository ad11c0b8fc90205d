//! Custom sink: hands each payload to a user callback

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::ReportSink;
use crate::error::SinkError;

type Callback = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Invokes a user-supplied async function with the raw payload
///
/// A failing callback is reported like any other delivery failure.
///
/// # Example
///
/// ```
/// use busmetrics_reporting::CustomSink;
///
/// let sink = CustomSink::new(|payload: String| async move {
///     println!("{payload}");
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct CustomSink {
    callback: Callback,
}

impl CustomSink {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |payload| callback(payload).boxed()),
        }
    }
}

impl std::fmt::Debug for CustomSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl ReportSink for CustomSink {
    fn kind(&self) -> &'static str {
        "custom"
    }

    fn destination(&self) -> &str {
        "custom report"
    }

    async fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        (self.callback)(payload.to_string())
            .await
            .map_err(|e| SinkError::Callback(format!("{e:#}")))
    }
}
