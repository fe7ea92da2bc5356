//! Data structures shared by the image resolver, the launchers and the
//! container engine seam.
//!
//! Everything here is plain data.  Images are addressed by an
//! [`ImageRef`] of the form `{version}-{type}`; containers are handed back
//! by the engine as opaque ids wrapped in a [`ContainerHandle`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Port mongod listens on inside every container.
pub const DEFAULT_PORT: u16 = 27017;

/// Build variant of an image for a given MongoDB version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Shared parent of every other variant.
    Base,
    Standalone,
    ReplicaSet,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Base => "base",
            ImageType::Standalone => "standalone",
            ImageType::ReplicaSet => "replicaset",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a built image in the engine's image store, `{version}-{type}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(version: &str, image_type: ImageType) -> Self {
        Self(format!("{}-{}", version, image_type))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of the deployment to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Standalone,
    ReplicaSet,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::Standalone, Topology::ReplicaSet];

    pub fn as_str(self) -> &'static str {
        match self {
            Topology::Standalone => "standalone",
            Topology::ReplicaSet => "replicaset",
        }
    }

    /// Image variant the topology's containers are created from.
    pub fn image_type(self) -> ImageType {
        match self {
            Topology::Standalone => ImageType::Standalone,
            Topology::ReplicaSet => ImageType::ReplicaSet,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a topology name matches none of [`Topology::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown topology `{0}` (expected one of: standalone, replicaset)")]
pub struct UnknownTopology(pub String);

impl FromStr for Topology {
    type Err = UnknownTopology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topology::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTopology(s.to_string()))
    }
}

/// What the launcher asks the engine to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: ImageRef,
    pub name: Option<String>,
    pub host_port: u16,
    pub container_port: u16,
}

/// A created (and, once returned from a launcher, started) container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub host_port: u16,
}

/// Collected result of a command executed inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
}

/// Summary of a finished launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub topology: Topology,
    pub image: ImageRef,
    pub containers: Vec<ContainerHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// How far a replica-set launch got.  Carried in
/// [`RunnerError::LaunchFailed`](crate::error::RunnerError::LaunchFailed)
/// so a partial failure names what was left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    NotStarted,
    NetworkCreated,
    ImageResolved,
    /// Number of members created, started and connected so far.
    MembersRunning { running: usize, total: usize },
    ScriptUploaded,
    Initiated,
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchStage::NotStarted => f.write_str("before creating any resources"),
            LaunchStage::NetworkCreated => f.write_str("after creating the network"),
            LaunchStage::ImageResolved => f.write_str("after resolving the image"),
            LaunchStage::MembersRunning { running, total } => {
                write!(f, "after creating {} of {} members", running, total)
            }
            LaunchStage::ScriptUploaded => f.write_str("after uploading the initiation script"),
            LaunchStage::Initiated => f.write_str("after initiating the replica set"),
        }
    }
}
