//! In-process store backend.
//!
//! Records are partitioned across a fixed number of simulated nodes by key
//! hash. Aggregation queries run one partial aggregation per node and merge
//! the partials before yielding, the way a cluster reduces on the client.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aggkit_core::{Bin, Filter, IndexType, Key, Language, Record, Statement, Value};
use aggkit_udf::catalog::{self, Builtin};
use aggkit_udf::{AggregateState, UdfError, exported_functions};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client::{BoxFuture, IndexState, Store};
use crate::cursor::{Cursor, RecordSet, ResultSet};
use crate::error::StoreError;
use crate::policy::{Policy, RecordExistsAction, WritePolicy};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub nodes: usize,
    pub supports_udf: bool,
    /// Pause before a new index starts building, so callers can observe it
    /// while it is not yet readable.
    pub index_build_delay: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            nodes: 2,
            supports_udf: true,
            index_build_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub records: usize,
    pub indexes: usize,
    pub packages: usize,
    pub cursors_opened: u64,
    pub cursors_closed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IndexKey {
    Int(i64),
    Str(String),
}

impl IndexKey {
    fn of(index_type: IndexType, value: &Value) -> Option<Self> {
        match index_type {
            IndexType::Numeric => value.as_i64().map(IndexKey::Int),
            IndexType::String => value.as_str().map(|s| IndexKey::Str(s.to_string())),
        }
    }
}

#[derive(Debug)]
struct SecondaryIndex {
    set_name: String,
    bin: String,
    index_type: IndexType,
    state: IndexState,
    entries: BTreeMap<IndexKey, BTreeSet<Key>>,
}

impl SecondaryIndex {
    fn covers(&self, key: &Key) -> bool {
        self.set_name == key.set_name
    }

    fn entry_key(&self, record: &Record) -> Option<IndexKey> {
        record
            .bin(&self.bin)
            .and_then(|v| IndexKey::of(self.index_type, v))
    }

    fn insert(&mut self, record: &Record) {
        if let Some(ik) = self.entry_key(record) {
            self.entries
                .entry(ik)
                .or_default()
                .insert(record.key.clone());
        }
    }

    fn remove(&mut self, record: &Record) {
        let Some(ik) = self.entry_key(record) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&ik) {
            keys.remove(&record.key);
            if keys.is_empty() {
                self.entries.remove(&ik);
            }
        }
    }

    fn lookup(&self, filter: &Filter) -> Result<BTreeSet<Key>, StoreError> {
        match filter {
            Filter::Equal { value, .. } => {
                let ik = IndexKey::of(self.index_type, value).ok_or_else(|| {
                    StoreError::Parameter(format!(
                        "filter value {value} does not fit a {} index",
                        self.index_type
                    ))
                })?;
                Ok(self.entries.get(&ik).cloned().unwrap_or_default())
            }
            Filter::Range { begin, end, .. } => {
                if self.index_type != IndexType::Numeric {
                    return Err(StoreError::Parameter(format!(
                        "range filter on a {} index",
                        self.index_type
                    )));
                }
                if begin > end {
                    return Ok(BTreeSet::new());
                }
                Ok(self
                    .entries
                    .range(IndexKey::Int(*begin)..=IndexKey::Int(*end))
                    .flat_map(|(_, keys)| keys.iter().cloned())
                    .collect())
            }
        }
    }
}

#[derive(Debug)]
struct Package {
    language: Language,
    exports: BTreeSet<String>,
}

#[derive(Debug)]
struct State {
    nodes: Vec<BTreeMap<Key, Record>>,
    /// Keyed by module name (`aggAPI` for `aggAPI.lua`).
    packages: BTreeMap<String, Package>,
    /// Keyed by (namespace, index name).
    indexes: BTreeMap<(String, String), SecondaryIndex>,
}

impl State {
    fn node_of(&self, key: &Key) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.nodes.len() as u64) as usize
    }

    fn readable_index(
        &self,
        statement: &Statement,
        filter: &Filter,
    ) -> Result<&SecondaryIndex, StoreError> {
        let bin = filter.bin_name();
        let (name, index) = match &statement.index_name {
            Some(name) => {
                let index = self
                    .indexes
                    .get(&(statement.namespace.clone(), name.clone()))
                    .ok_or_else(|| StoreError::IndexNotFound(name.clone()))?;
                if index.bin != bin {
                    return Err(StoreError::Parameter(format!(
                        "index {name} is on bin {}, filter is on {bin}",
                        index.bin
                    )));
                }
                (name.clone(), index)
            }
            None => self
                .indexes
                .iter()
                .find(|((ns, _), index)| {
                    *ns == statement.namespace
                        && index.set_name == statement.set_name
                        && index.bin == bin
                })
                .map(|((_, name), index)| (name.clone(), index))
                .ok_or_else(|| {
                    StoreError::IndexNotFound(format!(
                        "no index on {}.{}.{bin}",
                        statement.namespace, statement.set_name
                    ))
                })?,
        };
        if index.state != IndexState::Ready {
            return Err(StoreError::IndexNotReadable(name));
        }
        Ok(index)
    }

    /// Records selected by `statement`, grouped by the node holding them.
    fn select(&self, statement: &Statement) -> Result<Vec<Vec<Record>>, StoreError> {
        let mut partitions = vec![Vec::new(); self.nodes.len()];
        match &statement.filter {
            Some(filter) => {
                let index = self.readable_index(statement, filter)?;
                for key in index.lookup(filter)? {
                    let node = self.node_of(&key);
                    if let Some(record) = self.nodes[node].get(&key) {
                        partitions[node].push(record.clone());
                    }
                }
            }
            None => {
                for (node, records) in self.nodes.iter().enumerate() {
                    partitions[node].extend(
                        records
                            .values()
                            .filter(|r| {
                                r.key.namespace == statement.namespace
                                    && (statement.set_name.is_empty()
                                        || r.key.set_name == statement.set_name)
                            })
                            .cloned(),
                    );
                }
            }
        }
        Ok(partitions)
    }

    fn resolve_function(&self, package: &str, function: &str) -> Result<Builtin, StoreError> {
        let module = package.strip_suffix(".lua").unwrap_or(package);
        let registered = self
            .packages
            .get(module)
            .ok_or_else(|| StoreError::PackageNotFound(module.to_string()))?;
        if !registered.exports.contains(function) {
            return Err(UdfError::FunctionNotFound {
                package: module.to_string(),
                function: function.to_string(),
            }
            .into());
        }
        debug!(package = module, function, language = %registered.language, "resolved udf");
        Ok(catalog::require(module, function)?)
    }
}

struct Shared {
    config: MemoryConfig,
    state: Mutex<State>,
    cursors_opened: AtomicU64,
    cursors_closed: AtomicU64,
}

/// A store cluster simulated in process.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        let nodes = config.nodes.max(1);
        if nodes != config.nodes {
            warn!(requested = config.nodes, "memory store needs at least one node");
        }
        let state = State {
            nodes: vec![BTreeMap::new(); nodes],
            packages: BTreeMap::new(),
            indexes: BTreeMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                cursors_opened: AtomicU64::new(0),
                cursors_closed: AtomicU64::new(0),
            }),
        }
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.shared.state.lock().await;
        StoreStats {
            records: state.nodes.iter().map(BTreeMap::len).sum(),
            indexes: state.indexes.len(),
            packages: state.packages.len(),
            cursors_opened: self.shared.cursors_opened.load(Ordering::SeqCst),
            cursors_closed: self.shared.cursors_closed.load(Ordering::SeqCst),
        }
    }

    /// Count the cursor as open and as closed once it closes.
    fn track<T>(&self, mut cursor: Cursor<T>) -> Cursor<T> {
        self.shared.cursors_opened.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        cursor.on_close(move || {
            shared.cursors_closed.fetch_add(1, Ordering::SeqCst);
        });
        cursor
    }
}

fn module_name<'a>(server_path: &'a str, language: Language) -> Option<&'a str> {
    server_path
        .strip_suffix(language.extension())
        .and_then(|stem| stem.strip_suffix('.'))
        .filter(|stem| !stem.is_empty())
}

async fn build_index(shared: Arc<Shared>, namespace: String, index_name: String) -> Result<usize, String> {
    let delay = shared.config.index_build_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut guard = shared.state.lock().await;
    let State { nodes, indexes, .. } = &mut *guard;
    let index = indexes
        .get_mut(&(namespace.clone(), index_name))
        .ok_or_else(|| "index dropped while building".to_string())?;

    let set_name = index.set_name.clone();
    for record in nodes
        .iter()
        .flat_map(BTreeMap::values)
        .filter(|r| r.key.in_set(&namespace, &set_name))
    {
        index.insert(record);
    }
    index.state = IndexState::Ready;
    Ok(index.entries.values().map(BTreeSet::len).sum())
}

async fn aggregate(
    builtin: Builtin,
    args: Vec<Value>,
    partitions: Vec<Vec<Record>>,
) -> Result<Option<Value>, StoreError> {
    let aggregation = builtin.prepare(&args)?;

    let mut partials = JoinSet::new();
    for (node, records) in partitions.into_iter().enumerate() {
        let aggregation = aggregation.clone();
        partials.spawn(async move {
            let mut state = AggregateState::default();
            for record in &records {
                aggregation.update(&mut state, &record.to_value())?;
            }
            debug!(
                node,
                records = records.len(),
                groups = state.group_count(),
                "partial aggregation"
            );
            Ok::<_, UdfError>(state)
        });
    }

    let mut merged = AggregateState::default();
    while let Some(joined) = partials.join_next().await {
        let partial = joined.map_err(|e| StoreError::Server(e.to_string()))??;
        merged.merge(partial);
    }

    if merged.is_empty() {
        return Ok(None);
    }
    Ok(Some(aggregation.finish(merged)))
}

impl Store for MemoryStore {
    fn supports_udf(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.shared.config.supports_udf })
    }

    fn register_udf<'a>(
        &'a self,
        policy: &'a Policy,
        body: &'a [u8],
        server_path: &'a str,
        language: Language,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(policy.bound("register_udf", async move {
            let rejected = |reason: &str| StoreError::Registration {
                package: server_path.to_string(),
                reason: reason.to_string(),
            };
            if !self.shared.config.supports_udf {
                return Err(StoreError::Unsupported("udf".into()));
            }
            let module = module_name(server_path, language)
                .ok_or_else(|| rejected(&format!("expected a .{} file", language.extension())))?;
            if body.is_empty() {
                return Err(rejected("package body is empty"));
            }
            let source = std::str::from_utf8(body).map_err(|e| rejected(&e.to_string()))?;

            let exports = exported_functions(source);
            if exports.is_empty() {
                warn!(package = module, "package exports no functions");
            }

            let (task, reporter) = Task::new(format!("udf-register:{server_path}"));
            let shared = Arc::clone(&self.shared);
            let module = module.to_string();
            tokio::spawn(async move {
                let mut state = shared.state.lock().await;
                info!(package = %module, %language, functions = ?exports, "registered udf package");
                state.packages.insert(module, Package { language, exports });
                reporter.complete();
            });
            Ok(task)
        }))
    }

    fn remove_udf<'a>(
        &'a self,
        policy: &'a Policy,
        server_path: &'a str,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(policy.bound("remove_udf", async move {
            let module = server_path.strip_suffix(".lua").unwrap_or(server_path);
            let mut state = self.shared.state.lock().await;
            if state.packages.remove(module).is_none() {
                return Err(StoreError::PackageNotFound(module.to_string()));
            }
            info!(package = module, "removed udf package");

            let (task, reporter) = Task::new(format!("udf-remove:{server_path}"));
            reporter.complete();
            Ok(task)
        }))
    }

    fn create_index<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
        index_name: &'a str,
        bin_name: &'a str,
        index_type: IndexType,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(policy.bound("create_index", async move {
            if index_name.is_empty() {
                return Err(StoreError::Parameter("index name is empty".into()));
            }
            Bin::validate_name(bin_name)?;

            let mut state = self.shared.state.lock().await;
            let id = (namespace.to_string(), index_name.to_string());
            if state.indexes.contains_key(&id) {
                return Err(StoreError::IndexAlreadyExists(index_name.to_string()));
            }
            if let Some(((_, other), _)) = state.indexes.iter().find(|((ns, _), index)| {
                ns == namespace && index.set_name == set_name && index.bin == bin_name
            }) {
                return Err(StoreError::IndexAlreadyExists(format!(
                    "{index_name}: bin {bin_name} is already indexed by {other}"
                )));
            }

            state.indexes.insert(
                id,
                SecondaryIndex {
                    set_name: set_name.to_string(),
                    bin: bin_name.to_string(),
                    index_type,
                    state: IndexState::Building,
                    entries: BTreeMap::new(),
                },
            );
            info!(namespace, set = set_name, index = index_name, bin = bin_name, %index_type, "creating index");

            let (task, reporter) = Task::new(format!("sindex-create:{index_name}"));
            let shared = Arc::clone(&self.shared);
            let namespace = namespace.to_string();
            let index_name = index_name.to_string();
            tokio::spawn(async move {
                match build_index(shared, namespace, index_name.clone()).await {
                    Ok(entries) => {
                        info!(index = %index_name, entries, "index ready");
                        reporter.complete();
                    }
                    Err(reason) => {
                        warn!(index = %index_name, %reason, "index build failed");
                        reporter.fail(reason);
                    }
                }
            });
            Ok(task)
        }))
    }

    fn drop_index<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(policy.bound("drop_index", async move {
            let mut state = self.shared.state.lock().await;
            state
                .indexes
                .remove(&(namespace.to_string(), index_name.to_string()))
                .ok_or_else(|| StoreError::IndexNotFound(index_name.to_string()))?;
            info!(namespace, set = set_name, index = index_name, "dropped index");
            Ok(())
        }))
    }

    fn index_status<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<IndexState>, StoreError>> {
        Box::pin(policy.bound("index_status", async move {
            let state = self.shared.state.lock().await;
            Ok(state
                .indexes
                .get(&(namespace.to_string(), index_name.to_string()))
                .map(|index| index.state))
        }))
    }

    fn put<'a>(
        &'a self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(policy.base.bound("put", async move {
            if key.namespace.is_empty() {
                return Err(StoreError::Parameter("namespace is empty".into()));
            }
            if bins.is_empty() {
                return Err(StoreError::Parameter("no bins to write".into()));
            }
            for bin in bins {
                Bin::validate_name(&bin.name)?;
            }

            let mut guard = self.shared.state.lock().await;
            let node = guard.node_of(key);
            let State { nodes, indexes, .. } = &mut *guard;
            let existing = nodes[node].get(key);

            let (mut merged, generation) = match (existing, policy.exists) {
                (Some(_), RecordExistsAction::CreateOnly) => {
                    return Err(StoreError::KeyExists(key.clone()));
                }
                (Some(old), RecordExistsAction::Update) => (old.bins.clone(), old.generation + 1),
                (Some(old), RecordExistsAction::Replace) => (BTreeMap::new(), old.generation + 1),
                (None, _) => (BTreeMap::new(), 1),
            };
            for bin in bins {
                // Writing nil deletes the bin.
                if bin.value.is_nil() {
                    merged.remove(&bin.name);
                } else {
                    merged.insert(bin.name.clone(), bin.value.clone());
                }
            }
            let record = Record {
                key: key.clone(),
                bins: merged,
                generation,
            };

            for index in indexes
                .iter_mut()
                .filter(|((ns, _), index)| *ns == key.namespace && index.covers(key))
                .map(|(_, index)| index)
            {
                if let Some(old) = nodes[node].get(key) {
                    index.remove(old);
                }
                index.insert(&record);
            }

            debug!(%key, node, generation, "put record");
            nodes[node].insert(key.clone(), record);
            Ok(())
        }))
    }

    fn get<'a>(
        &'a self,
        policy: &'a Policy,
        key: &'a Key,
    ) -> BoxFuture<'a, Result<Option<Record>, StoreError>> {
        Box::pin(policy.bound("get", async move {
            let state = self.shared.state.lock().await;
            let node = state.node_of(key);
            Ok(state.nodes[node].get(key).cloned())
        }))
    }

    fn truncate<'a>(
        &'a self,
        policy: &'a Policy,
        namespace: &'a str,
        set_name: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(policy.bound("truncate", async move {
            let mut state = self.shared.state.lock().await;
            let mut removed = 0;
            for node in &mut state.nodes {
                let before = node.len();
                node.retain(|key, _| !key.in_set(namespace, set_name));
                removed += before - node.len();
            }
            for ((ns, _), index) in &mut state.indexes {
                if ns == namespace && index.set_name == set_name {
                    index.entries.clear();
                }
            }
            info!(namespace, set = set_name, removed, "truncated set");
            Ok(())
        }))
    }

    fn query<'a>(
        &'a self,
        policy: &'a Policy,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<RecordSet, StoreError>> {
        Box::pin(policy.bound("query", async move {
            let partitions = self.shared.state.lock().await.select(statement)?;
            let bin_names = statement.bin_names.clone();
            let cursor = Cursor::spawn(move |tx| async move {
                for record in partitions.into_iter().flatten() {
                    if tx.send(Ok(record.project(&bin_names))).await.is_err() {
                        break;
                    }
                }
            });
            debug!(query_id = %cursor.query_id(), namespace = %statement.namespace, set = %statement.set_name, "query started");
            Ok(self.track(cursor))
        }))
    }

    fn query_aggregate<'a>(
        &'a self,
        policy: &'a Policy,
        statement: &'a Statement,
        package: &'a str,
        function: &'a str,
        args: &'a [Value],
    ) -> BoxFuture<'a, Result<ResultSet, StoreError>> {
        Box::pin(policy.bound("query_aggregate", async move {
            if !self.shared.config.supports_udf {
                return Err(StoreError::Unsupported("udf".into()));
            }
            let (builtin, partitions) = {
                let state = self.shared.state.lock().await;
                let builtin = state.resolve_function(package, function)?;
                (builtin, state.select(statement)?)
            };

            let args = args.to_vec();
            let cursor = Cursor::spawn(move |tx| async move {
                let outcome = match aggregate(builtin, args, partitions).await {
                    Ok(Some(value)) => Ok(value),
                    Ok(None) => return,
                    Err(e) => Err(e),
                };
                let _ = tx.send(outcome).await;
            });
            debug!(query_id = %cursor.query_id(), package, function, "aggregation query started");
            Ok(self.track(cursor))
        }))
    }
}
