use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-command settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Upper bound for the whole command. `None` waits forever.
    pub total_timeout: Option<Duration>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            total_timeout: Some(DEFAULT_TOTAL_TIMEOUT),
        }
    }
}

impl Policy {
    pub fn no_timeout() -> Self {
        Self {
            total_timeout: None,
        }
    }

    /// Run `fut` under this policy's deadline.
    pub(crate) async fn bound<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.total_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| StoreError::Timeout { operation, timeout })?,
            None => fut.await,
        }
    }
}

/// What a write does when the record is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordExistsAction {
    /// Merge the written bins into the existing record.
    #[default]
    Update,
    /// Replace every bin of the existing record.
    Replace,
    /// Fail with `KeyExists`.
    CreateOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WritePolicy {
    pub base: Policy,
    pub exists: RecordExistsAction,
}

impl WritePolicy {
    pub fn new(exists: RecordExistsAction) -> Self {
        Self {
            base: Policy::default(),
            exists,
        }
    }
}
