use aggkit_core::{Bin, Key};
use aggkit_store::{Policy, Store, WritePolicy};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ExampleConfig;
use crate::error::ExampleError;

/// One record as written, kept so callers can check query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenRecord {
    pub key: String,
    pub filter_value: i64,
    pub group_value: i64,
}

pub async fn truncate_set(store: &dyn Store, config: &ExampleConfig) -> Result<(), ExampleError> {
    store
        .truncate(&Policy::default(), &config.namespace, &config.set)
        .await
        .map_err(ExampleError::Truncate)?;
    info!(namespace = %config.namespace, set = %config.set, "set truncated");
    Ok(())
}

/// Write `record_count` records with random filter and group bins, one at a
/// time, keyed `<key_prefix>1..=<record_count>`.
pub async fn populate<R: Rng>(
    store: &dyn Store,
    config: &ExampleConfig,
    rng: &mut R,
) -> Result<Vec<WrittenRecord>, ExampleError> {
    let policy = WritePolicy::default();
    let (filter_lo, filter_hi) = config.filter_range;
    let (group_lo, group_hi) = config.group_range;

    let mut written = Vec::with_capacity(config.record_count);
    for i in 1..=config.record_count {
        let user_key = format!("{}{i}", config.key_prefix);
        let key = Key::new(&config.namespace, &config.set, user_key.as_str());
        let filter_value = rng.gen_range(filter_lo..=filter_hi);
        let group_value = rng.gen_range(group_lo..=group_hi);
        let bins = [
            Bin::new(&config.filter_bin, filter_value),
            Bin::new(&config.group_bin, group_value),
        ];

        store
            .put(&policy, &key, &bins)
            .await
            .map_err(|source| ExampleError::Write {
                key: key.to_string(),
                source,
            })?;
        debug!(
            %key,
            filter_bin = %config.filter_bin,
            filter_value,
            group_bin = %config.group_bin,
            group_value,
            "wrote record"
        );

        written.push(WrittenRecord {
            key: user_key,
            filter_value,
            group_value,
        });
    }

    info!(records = written.len(), "records written");
    Ok(written)
}
