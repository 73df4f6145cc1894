use std::time::Duration;

use aggkit_core::IndexType;
use aggkit_store::{IndexState, Policy, Store, StoreError};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ExampleConfig;
use crate::error::ExampleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    Created,
    AlreadyExisted,
}

const BUILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Create the numeric index on the filter bin and wait for it to build.
///
/// Idempotent: an index of the same name that already exists counts as
/// success once it is readable. The bin being indexed under another name
/// is an error, since queries name `config.index`.
pub async fn ensure_index(
    store: &dyn Store,
    config: &ExampleConfig,
) -> Result<IndexOutcome, ExampleError> {
    let policy = Policy::no_timeout();
    let created = store
        .create_index(
            &policy,
            &config.namespace,
            &config.set,
            &config.index,
            &config.filter_bin,
            IndexType::Numeric,
        )
        .await;

    match created {
        Ok(mut task) => {
            task.wait_till_complete().await.map_err(ExampleError::Index)?;
            info!(index = %config.index, bin = %config.filter_bin, "index created");
            Ok(IndexOutcome::Created)
        }
        Err(e) if e.is_index_already_exists() => {
            wait_until_readable(store, config, e).await?;
            info!(index = %config.index, "index already exists");
            Ok(IndexOutcome::AlreadyExisted)
        }
        Err(e) => Err(ExampleError::Index(e)),
    }
}

/// Poll the existing index until it is ready. `conflict` is returned when
/// no index by our name exists, i.e. the bin is indexed under another name.
async fn wait_until_readable(
    store: &dyn Store,
    config: &ExampleConfig,
    conflict: StoreError,
) -> Result<(), ExampleError> {
    loop {
        let status = store
            .index_status(&Policy::default(), &config.namespace, &config.index)
            .await
            .map_err(ExampleError::Index)?;
        match status {
            Some(IndexState::Ready) => return Ok(()),
            Some(IndexState::Building) => {
                debug!(index = %config.index, "existing index still building");
                tokio::time::sleep(BUILD_POLL_INTERVAL).await;
            }
            None => return Err(ExampleError::Index(conflict)),
        }
    }
}

pub async fn drop_index(store: &dyn Store, config: &ExampleConfig) -> Result<(), ExampleError> {
    store
        .drop_index(&Policy::default(), &config.namespace, &config.set, &config.index)
        .await
        .map_err(ExampleError::Teardown)?;
    info!(index = %config.index, "index dropped");
    Ok(())
}
