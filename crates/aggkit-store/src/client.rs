use std::future::Future;
use std::pin::Pin;

use aggkit_core::{Bin, IndexType, Key, Language, Record, Statement, Value};
use serde::{Deserialize, Serialize};

use crate::cursor::{RecordSet, ResultSet};
use crate::error::StoreError;
use crate::policy::{Policy, WritePolicy};
use crate::task::Task;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Build state of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Building,
    Ready,
}

/// Commands a client can issue against a store cluster.
///
/// Methods return boxed futures for dyn compatibility, so callers can hold an
/// `Arc<dyn Store>` regardless of the backend.
pub trait Store: Send + Sync {
    /// Whether the cluster can run UDFs.
    fn supports_udf(&self) -> BoxFuture<'_, bool>;

    /// Upload a UDF package under `server_path` (e.g. `aggAPI.lua`).
    ///
    /// The returned task completes once every node has the package.
    fn register_udf<'a>(
        &'a self,
        policy: &'a Policy,
        body: &'a [u8],
        server_path: &'a str,
        language: Language,
    ) -> BoxFuture<'a, Result<Task, StoreError>>;

    fn remove_udf<'a>(
        &'a self,
        policy: &'a Policy,
        server_path: &'a str,
    ) -> BoxFuture<'a, Result<Task, StoreError>>;

    /// Create a secondary index on `bin_name`.
    ///
    /// Fails with `IndexAlreadyExists` when the name is taken in the
    /// namespace. The returned task completes once the index is readable.
    fn create_index<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
        index_name: &'a str,
        bin_name: &'a str,
        index_type: IndexType,
    ) -> BoxFuture<'a, Result<Task, StoreError>>;

    fn drop_index<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// State of the index called `index_name`, or `None` if the namespace
    /// has no index by that name.
    fn index_status<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<IndexState>, StoreError>>;

    fn put<'a>(
        &'a self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin],
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn get<'a>(
        &'a self,
        policy: &'a Policy,
        key: &'a Key,
    ) -> BoxFuture<'a, Result<Option<Record>, StoreError>>;

    /// Remove every record of a set.
    fn truncate<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn query<'a>(
        &'a self,
        policy: &'a Policy,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<RecordSet, StoreError>>;

    /// Run `package.function` over the records selected by `statement` and
    /// stream back its aggregated output.
    fn query_aggregate<'a>(
        &'a self,
        policy: &'a Policy,
        statement: &'a Statement,
        package: &'a str,
        function: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, Result<ResultSet, StoreError>>;
}
