use super::ContainerEngine;
use crate::error::{Result, RunnerError};
use crate::types::{ContainerSpec, ExecOutput, ImageRef};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, StartContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::BuildImageOptions;
use bollard::models::{EndpointSettings, ExecInspectResponse, HostConfig, PortBinding};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions};
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// The exec stream can close before the daemon marks the exec finished.
const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(100);
const EXEC_POLL_LIMIT: u32 = 50;

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects to the local Docker daemon using default settings
    /// (`DOCKER_HOST`, else the unix socket on Linux).  The connection is
    /// lazy; nothing is sent until the first call.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn image_exists(&self, image: &ImageRef) -> Result<bool> {
        match self.docker.inspect_image(image.as_str()).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_image(&self, image: &ImageRef, dockerfile: &str) -> Result<()> {
        let context = single_file_tar("Dockerfile", dockerfile.as_bytes(), 0o644)?;
        let opts = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: image.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(opts, None, Some(context.into()));
        while let Some(msg) = stream.next().await {
            let info = msg?;
            if let Some(error) = info.error {
                return Err(RunnerError::BuildFailed {
                    reference: image.clone(),
                    message: error,
                });
            }
            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!("[{}] {}", image, line);
                }
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let port_key = format!("{}/tcp", spec.container_port);
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = [(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        )]
        .into_iter()
        .collect();
        let exposed_ports: HashMap<String, HashMap<(), ()>> =
            [(port_key, HashMap::new())].into_iter().collect();

        let config = Config {
            image: Some(spec.image.to_string()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let response = self.docker.create_container(options, config).await?;
        for warning in &response.warnings {
            info!("Engine warning for {}: {}", spec.image, warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let response = self
            .docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await?;
        debug!("Created network {}: {:?}", name, response);
        Ok(())
    }

    async fn connect_network(&self, network: &str, container_id: &str) -> Result<()> {
        self.docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container_id.to_string(),
                    endpoint_config: EndpointSettings::default(),
                },
            )
            .await?;
        Ok(())
    }

    async fn write_file(&self, container_id: &str, path: &str, contents: &[u8]) -> Result<()> {
        let path = Path::new(path);
        let dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RunnerError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("no file name in {}", path.display()),
                ))
            })?;

        let archive = single_file_tar(&file_name, contents, 0o644)?;
        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptions {
                    path: dir,
                    ..Default::default()
                }),
                archive.into(),
            )
            .await?;
        Ok(())
    }

    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutput> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(cmd.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut out = ExecOutput::default();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                match chunk? {
                    LogOutput::StdOut { message } => {
                        out.stdout.push_str(&String::from_utf8_lossy(&message))
                    }
                    LogOutput::StdErr { message } => {
                        out.stderr.push_str(&String::from_utf8_lossy(&message))
                    }
                    _ => {}
                }
            }
        }

        let mut polls = 0;
        out.exit_code = loop {
            let inspect = self.docker.inspect_exec(&exec.id).await?;
            if let Some(code) = finished_exit_code(&inspect) {
                break code;
            }
            polls += 1;
            if polls >= EXEC_POLL_LIMIT {
                warn!("Exec {} still running after output closed", exec.id);
                break None;
            }
            tokio::time::sleep(EXEC_POLL_INTERVAL).await;
        };
        Ok(out)
    }
}

/// `Some(exit_code)` once the daemon no longer reports the exec as running.
fn finished_exit_code(inspect: &ExecInspectResponse) -> Option<Option<i64>> {
    match inspect.running {
        Some(true) => None,
        _ => Some(inspect.exit_code),
    }
}

/// Packs one regular file into an in-memory tar archive.
fn single_file_tar(name: &str, contents: &[u8], mode: u32) -> Result<Vec<u8>> {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(mode);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, name, contents)?;
    Ok(builder.into_inner()?)
}
