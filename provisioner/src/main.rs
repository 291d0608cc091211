// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use kube::Client;
use log::info;
use std::path::PathBuf;

use provisioner::{PodExecutor, ProvisionConfig, StorageFixture};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with the provisioning configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Namespace of the Rook cluster, overrides the configuration
    #[arg(long)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create pools, secrets, storage classes and claims
    Setup,
    /// Check that the configured storage classes exist and claims are bound
    Verify,
    /// Delete the configured resources in reverse dependency order
    Teardown,
    /// Setup, verify and teardown
    Run,
}

fn load_config(args: &Args) -> Result<ProvisionConfig> {
    let mut config = match &args.config {
        Some(path) => ProvisionConfig::from_file(path)?,
        None => ProvisionConfig::default(),
    };
    if let Some(namespace) = &args.namespace {
        config.cluster_namespace = namespace.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let client = Client::try_default().await?;
    info!(
        "Ceph provisioning in namespace '{}' with {} profile(s)",
        config.cluster_namespace,
        config.profiles.len()
    );
    let executor = PodExecutor::new(client.clone());
    let mut fixture = StorageFixture::new(client, config, executor);

    match args.command {
        Command::Setup => fixture.setup().await?,
        Command::Verify => {
            fixture.assume_provisioned()?;
            fixture.verify().await?
        }
        Command::Teardown => {
            fixture.assume_provisioned()?;
            fixture.teardown().await?
        }
        Command::Run => fixture.run().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_flag_overrides_config() {
        let args = Args::parse_from(["ceph-provision", "--namespace", "rook-ceph", "run"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.cluster_namespace, "rook-ceph");
        assert!(matches!(args.command, Command::Run));
    }
}
