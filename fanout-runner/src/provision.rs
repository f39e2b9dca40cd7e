//! Container provisioning
//!
//! Makes sure the container a producer talks to exists before a run starts:
//! - Checking that the container engine is installed
//! - Looking up an existing container by name
//! - Starting a detached container with the configured env and ports
//!
//! Runs outside the streaming core. Calls are blocking; async callers should
//! go through `spawn_blocking`.

use anyhow::{Context, Result};
use fanout_core::domain::pipeline::ProvisionSpec;
use std::process::{Command, Output};
use tracing::{debug, error, info};

/// What provisioning had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStatus {
    AlreadyPresent,
    Created,
}

/// Prepares external resources a pipeline depends on
pub trait Provisioner {
    fn ensure(&self) -> Result<ProvisionStatus>;
}

/// Checks if the container engine is installed and available
pub fn check_engine_available(engine: &str) -> Result<()> {
    let output = Command::new(engine)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to execute '{} --version'. Is {} installed?", engine, engine))?;

    if !output.status.success() {
        anyhow::bail!("{} is not working correctly", engine);
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("{} is available: {}", engine, version.trim());

    Ok(())
}

/// Provisions a single named container
pub struct ContainerProvisioner {
    spec: ProvisionSpec,
}

impl ContainerProvisioner {
    pub fn new(spec: ProvisionSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProvisionSpec {
        &self.spec
    }

    /// Whether a container with exactly this name exists, running or not
    pub fn container_exists(&self) -> Result<bool> {
        let output = Command::new(&self.spec.engine)
            .args(self.list_args())
            .output()
            .with_context(|| format!("Failed to list containers with {}", self.spec.engine))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Failed to list containers: exit_code={}, stderr='{}'",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(lists_container(&stdout, &self.spec.container))
    }

    /// Starts the container detached
    ///
    /// # Returns
    /// The container ID printed by the engine
    pub fn start_container(&self) -> Result<String> {
        info!(
            "Creating container {} from image {}",
            self.spec.container, self.spec.image
        );
        // Env values can hold credentials; only their names are logged.
        debug!(
            "Container env keys: {:?}, ports: {:?}",
            self.spec.env.keys().collect::<Vec<_>>(),
            self.spec.ports
        );

        let output = Command::new(&self.spec.engine)
            .args(self.run_args())
            .output()
            .with_context(|| format!("Failed to execute {} run command", self.spec.engine))?;

        let (stdout, stderr) = output_text(&output);

        if !stderr.is_empty() {
            debug!("{} run stderr: {}", self.spec.engine, stderr);
        }

        if !output.status.success() {
            let error_msg = format!(
                "Failed to start container {}: exit_code={}, stderr='{}'",
                self.spec.container,
                output.status.code().unwrap_or(-1),
                stderr
            );

            error!("{}", error_msg);
            anyhow::bail!("{}", error_msg);
        }

        info!(
            "Container {} started successfully with ID: {}",
            self.spec.container, stdout
        );
        Ok(stdout)
    }

    fn list_args(&self) -> Vec<String> {
        vec![
            "ps".to_string(),
            "-a".to_string(),
            "--filter".to_string(),
            format!("name={}", self.spec.container),
            "--format".to_string(),
            "{{.Names}}".to_string(),
        ]
    }

    fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.spec.container.clone(),
        ];

        for (key, value) in &self.spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        for port in &self.spec.ports {
            args.push("-p".to_string());
            args.push(port.clone());
        }

        args.push(self.spec.image.clone());
        args
    }
}

impl Provisioner for ContainerProvisioner {
    fn ensure(&self) -> Result<ProvisionStatus> {
        check_engine_available(&self.spec.engine)?;

        if self.container_exists()? {
            info!("Container {} already exists", self.spec.container);
            return Ok(ProvisionStatus::AlreadyPresent);
        }

        self.start_container()?;
        Ok(ProvisionStatus::Created)
    }
}

/// The engine's name filter is a substring match, so compare whole lines
fn lists_container(listing: &str, name: &str) -> bool {
    listing.lines().any(|line| line.trim() == name)
}

fn output_text(output: &Output) -> (String, String) {
    (
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
        String::from_utf8_lossy(&output.stderr).trim().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn mysql() -> ProvisionSpec {
        ProvisionSpec {
            engine: "docker".to_string(),
            container: "mysql-db".to_string(),
            image: "mysql:latest".to_string(),
            env: BTreeMap::from([("MYSQL_ROOT_PASSWORD".to_string(), "secret".to_string())]),
            ports: vec!["3306:3306".to_string()],
        }
    }

    #[test]
    fn test_run_args() {
        let provisioner = ContainerProvisioner::new(mysql());
        assert_eq!(
            provisioner.run_args(),
            vec![
                "run",
                "-d",
                "--name",
                "mysql-db",
                "-e",
                "MYSQL_ROOT_PASSWORD=secret",
                "-p",
                "3306:3306",
                "mysql:latest"
            ]
        );
    }

    #[test]
    fn test_list_args_filter_by_name() {
        let provisioner = ContainerProvisioner::new(mysql());
        let args = provisioner.list_args();
        assert_eq!(args[0], "ps");
        assert!(args.contains(&"name=mysql-db".to_string()));
        assert!(args.contains(&"{{.Names}}".to_string()));
    }

    #[test]
    fn test_lists_container_matches_whole_name() {
        assert!(lists_container("mysql-db\n", "mysql-db"));
        assert!(lists_container("other\nmysql-db\n", "mysql-db"));
        assert!(!lists_container("mysql-db-old\n", "mysql-db"));
        assert!(!lists_container("", "mysql-db"));
    }

    #[test]
    fn test_missing_engine_is_reported() {
        let result = check_engine_available("fanout-no-such-engine");
        assert!(result.is_err());
    }

    #[test]
    fn test_ensure_fails_without_engine() {
        let mut spec = mysql();
        spec.engine = "fanout-no-such-engine".to_string();
        let provisioner = ContainerProvisioner::new(spec);
        assert!(provisioner.ensure().is_err());
    }
}
