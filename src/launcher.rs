//! Topology launchers.
//!
//! A launcher resolves the image its topology needs, then creates and starts
//! containers from it.  Nothing waits for mongod to accept connections and
//! nothing is rolled back on failure: containers and networks created
//! before an error stay in place.

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::image::ImageResolver;
use crate::types::{
    ContainerHandle, ContainerSpec, Deployment, LaunchStage, Topology, DEFAULT_PORT,
};

/// Network joined by every replica-set member.
pub const REPLICA_SET_NETWORK: &str = "mongo-rs";
pub const REPLICA_SET_ID: &str = "rs0";
pub const REPLICA_SET_MEMBERS: usize = 3;
/// Where the initiation script is written inside the primary.
pub const INIT_SCRIPT_PATH: &str = "/replicaSet.js";

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, resolver: &ImageResolver<'_>, version: &str) -> Result<Deployment>;
}

impl Topology {
    pub fn launcher(self, mongo_shell: &str) -> Box<dyn Launcher> {
        match self {
            Topology::Standalone => Box::new(StandaloneLauncher),
            Topology::ReplicaSet => Box::new(ReplicaSetLauncher::new(mongo_shell)),
        }
    }
}

/// One container bound to the default port on the host.
pub struct StandaloneLauncher;

#[async_trait]
impl Launcher for StandaloneLauncher {
    async fn launch(&self, resolver: &ImageResolver<'_>, version: &str) -> Result<Deployment> {
        info!("Starting mongo version {} in standalone mode", version);
        let image = resolver
            .ensure_image(version, Topology::Standalone.image_type())
            .await?;

        info!("Starting docker image {}", image);
        let engine = resolver.engine();
        let id = engine
            .create_container(&ContainerSpec {
                image: image.clone(),
                name: None,
                host_port: DEFAULT_PORT,
                container_port: DEFAULT_PORT,
            })
            .await?;
        engine.start_container(&id).await?;

        Ok(Deployment {
            topology: Topology::Standalone,
            image,
            containers: vec![ContainerHandle {
                id,
                name: None,
                host_port: DEFAULT_PORT,
            }],
            network: None,
        })
    }
}

/// Three networked members; `mongo-0` initiates the set.
pub struct ReplicaSetLauncher {
    mongo_shell: String,
}

impl ReplicaSetLauncher {
    pub fn new(mongo_shell: impl Into<String>) -> Self {
        Self {
            mongo_shell: mongo_shell.into(),
        }
    }

    fn init_command(&self) -> Vec<String> {
        vec![
            self.mongo_shell.clone(),
            format!("localhost:{}/test", DEFAULT_PORT),
            INIT_SCRIPT_PATH.to_string(),
        ]
    }

    async fn run(
        &self,
        resolver: &ImageResolver<'_>,
        version: &str,
        stage: &mut LaunchStage,
    ) -> Result<Deployment> {
        let engine = resolver.engine();

        engine.create_network(REPLICA_SET_NETWORK).await?;
        *stage = LaunchStage::NetworkCreated;

        let image = resolver
            .ensure_image(version, Topology::ReplicaSet.image_type())
            .await?;
        *stage = LaunchStage::ImageResolved;

        let mut members: Vec<ContainerHandle> = Vec::with_capacity(REPLICA_SET_MEMBERS);
        for index in 0..REPLICA_SET_MEMBERS {
            let name = member_name(index);
            let host_port = DEFAULT_PORT + index as u16;
            let id = engine
                .create_container(&ContainerSpec {
                    image: image.clone(),
                    name: Some(name.clone()),
                    host_port,
                    container_port: DEFAULT_PORT,
                })
                .await?;
            engine.start_container(&id).await?;
            engine.connect_network(REPLICA_SET_NETWORK, &id).await?;
            info!("Member {} ({}) listening on host port {}", name, id, host_port);

            members.push(ContainerHandle {
                id,
                name: Some(name),
                host_port,
            });
            *stage = LaunchStage::MembersRunning {
                running: members.len(),
                total: REPLICA_SET_MEMBERS,
            };
        }

        // Members are created in index order, so the first is mongo-0.
        let primary = &members[0].id;
        engine
            .write_file(primary, INIT_SCRIPT_PATH, init_script().as_bytes())
            .await?;
        *stage = LaunchStage::ScriptUploaded;

        let command = self.init_command();
        let output = engine.exec(primary, &command).await?;
        if !output.stdout.is_empty() {
            debug!("{} stdout: {}", self.mongo_shell, output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!("{} stderr: {}", self.mongo_shell, output.stderr.trim_end());
        }
        match output.exit_code {
            Some(0) => {}
            Some(code) => {
                return Err(RunnerError::ExecFailed {
                    container: members[0].name.clone().unwrap_or_else(|| primary.clone()),
                    command: command.join(" "),
                    code,
                })
            }
            None => warn!("Exit code of replica set initiation is unknown"),
        }
        *stage = LaunchStage::Initiated;

        Ok(Deployment {
            topology: Topology::ReplicaSet,
            image,
            containers: members,
            network: Some(REPLICA_SET_NETWORK.to_string()),
        })
    }
}

#[async_trait]
impl Launcher for ReplicaSetLauncher {
    async fn launch(&self, resolver: &ImageResolver<'_>, version: &str) -> Result<Deployment> {
        info!("Starting mongo version {} in replica set mode", version);
        let mut stage = LaunchStage::NotStarted;
        match self.run(resolver, version, &mut stage).await {
            Ok(deployment) => {
                debug!("Replica set launch finished ({})", stage);
                Ok(deployment)
            }
            Err(source) => Err(RunnerError::LaunchFailed {
                stage,
                source: Box::new(source),
            }),
        }
    }
}

/// Address a client on the host uses to reach `deployment`.
pub fn connection_uri(deployment: &Deployment) -> String {
    let hosts = deployment
        .containers
        .iter()
        .map(|c| format!("localhost:{}", c.host_port))
        .collect::<Vec<_>>()
        .join(",");
    match deployment.topology {
        Topology::Standalone => format!("mongodb://{}", hosts),
        Topology::ReplicaSet => format!("mongodb://{}/?replicaSet={}", hosts, REPLICA_SET_ID),
    }
}

pub fn member_name(index: usize) -> String {
    format!("mongo-{}", index)
}

/// `rs.initiate` script naming every member by its container hostname.
pub fn init_script() -> String {
    let members = (0..REPLICA_SET_MEMBERS)
        .map(|i| {
            format!(
                "    {{ \"_id\" : {}, \"host\" : \"{}:{}\" }}",
                i,
                member_name(i),
                DEFAULT_PORT
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "config = {{\n  \"_id\" : \"{}\",\n  \"members\" : [\n{}\n  ]\n}}\nrs.initiate(config)\n",
        REPLICA_SET_ID, members
    )
}
