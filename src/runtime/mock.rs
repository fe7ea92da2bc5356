//! Recording engine for tests.  Keeps an in-memory image store and logs
//! every call in order.

use super::ContainerEngine;
use crate::error::{Result, RunnerError};
use crate::types::{ContainerSpec, ExecOutput, ImageRef};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ImageExists(String),
    Build(String),
    CreateContainer {
        id: String,
        name: Option<String>,
        image: String,
        host_port: u16,
        container_port: u16,
    },
    Start(String),
    CreateNetwork(String),
    Connect { network: String, container: String },
    WriteFile { container: String, path: String, contents: String },
    Exec { container: String, cmd: Vec<String> },
}

#[derive(Default)]
pub struct MockEngine {
    images: Mutex<HashSet<String>>,
    networks: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    /// Fail the n-th container creation (0-based).
    fail_create_at: Option<usize>,
    exec_exit_code: Option<i64>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_images(images: &[&str]) -> Self {
        let engine = Self::new();
        engine
            .images
            .lock()
            .unwrap()
            .extend(images.iter().map(|i| i.to_string()));
        engine
    }

    pub fn failing_create_at(mut self, index: usize) -> Self {
        self.fail_create_at = Some(index);
        self
    }

    pub fn exec_exit_code(mut self, code: i64) -> Self {
        self.exec_exit_code = Some(code);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Build(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.images.lock().unwrap().contains(image)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn server_error(message: impl Into<String>, status_code: u16) -> RunnerError {
        RunnerError::Engine(bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: message.into(),
        })
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn image_exists(&self, image: &ImageRef) -> Result<bool> {
        self.record(Call::ImageExists(image.to_string()));
        Ok(self.has_image(image.as_str()))
    }

    async fn build_image(&self, image: &ImageRef, dockerfile: &str) -> Result<()> {
        self.record(Call::Build(image.to_string()));
        // Mirrors the engine: a FROM on a missing local image fails the build.
        for line in dockerfile.lines() {
            if let Some(parent) = line.strip_prefix("FROM ") {
                let parent = parent.trim();
                if !parent.contains(':') && !self.has_image(parent) {
                    return Err(RunnerError::BuildFailed {
                        reference: image.clone(),
                        message: format!("pull access denied for {}", parent),
                    });
                }
            }
        }
        self.images.lock().unwrap().insert(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let index = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::CreateContainer { .. }))
            .count();
        if self.fail_create_at == Some(index) {
            return Err(Self::server_error("port is already allocated", 500));
        }
        if !self.has_image(spec.image.as_str()) {
            return Err(Self::server_error(
                format!("No such image: {}", spec.image),
                404,
            ));
        }
        let id = format!("ctr-{}", index);
        self.record(Call::CreateContainer {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.to_string(),
            host_port: spec.host_port,
            container_port: spec.container_port,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(Call::Start(id.to_string()));
        Ok(())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        self.record(Call::CreateNetwork(name.to_string()));
        if !self.networks.lock().unwrap().insert(name.to_string()) {
            return Err(Self::server_error(
                format!("network with name {} already exists", name),
                409,
            ));
        }
        Ok(())
    }

    async fn connect_network(&self, network: &str, container_id: &str) -> Result<()> {
        self.record(Call::Connect {
            network: network.to_string(),
            container: container_id.to_string(),
        });
        Ok(())
    }

    async fn write_file(&self, container_id: &str, path: &str, contents: &[u8]) -> Result<()> {
        self.record(Call::WriteFile {
            container: container_id.to_string(),
            path: path.to_string(),
            contents: String::from_utf8_lossy(contents).into_owned(),
        });
        Ok(())
    }

    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutput> {
        self.record(Call::Exec {
            container: container_id.to_string(),
            cmd: cmd.to_vec(),
        });
        Ok(ExecOutput {
            exit_code: Some(self.exec_exit_code.unwrap_or(0)),
            stdout: "{ \"ok\" : 1 }\n".to_string(),
            stderr: String::new(),
        })
    }
}
