use crate::error::Result;
use crate::types::{ContainerSpec, ExecOutput, ImageRef};
use async_trait::async_trait;

pub mod docker;
pub use docker::DockerEngine;

#[cfg(test)]
pub mod mock;

/// The container engine operations the runner drives.
///
/// Every call is a single blocking request/response from the caller's point
/// of view: no retries, no timeouts.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn image_exists(&self, image: &ImageRef) -> Result<bool>;

    /// Builds `dockerfile` as the only file of the build context and tags the
    /// result as `image`.
    async fn build_image(&self, image: &ImageRef, dockerfile: &str) -> Result<()>;

    /// Returns the engine-assigned container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    /// Fails if a network with the same name already exists.
    async fn create_network(&self, name: &str) -> Result<()>;

    async fn connect_network(&self, network: &str, container_id: &str) -> Result<()>;

    /// Writes `contents` to the absolute `path` inside the container.
    async fn write_file(&self, container_id: &str, path: &str, contents: &[u8]) -> Result<()>;

    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutput>;
}
