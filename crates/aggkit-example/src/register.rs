use aggkit_core::Language;
use aggkit_store::{Policy, Store};
use tracing::info;

use crate::config::ExampleConfig;
use crate::error::ExampleError;

/// Upload `<udf_dir>/<package>.lua` and wait until the cluster has it.
pub async fn register_package(
    store: &dyn Store,
    config: &ExampleConfig,
) -> Result<(), ExampleError> {
    let path = config.package_path();
    let body = tokio::fs::read(&path)
        .await
        .map_err(|source| ExampleError::ReadPackage {
            path: path.clone(),
            source,
        })?;

    let language = Language::Lua;
    let server_path = format!("{}.{}", config.package, language.extension());
    info!(package = %server_path, bytes = body.len(), "registering udf package");

    let mut task = store
        .register_udf(&Policy::default(), &body, &server_path, language)
        .await
        .map_err(ExampleError::Registration)?;
    task.wait_till_complete()
        .await
        .map_err(ExampleError::Registration)?;

    info!(package = %server_path, "udf package registered");
    Ok(())
}
