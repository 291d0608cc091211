// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::{fs, path::PathBuf};

use provisioner::manifests::{self, StorageClassParams};
use provisioner::{AdminKey, Interface, ProvisionConfig, StorageProfile};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Output directory to save rendered YAML
    #[arg(long, default_value = "manifests")]
    output_dir: PathBuf,

    /// YAML file with the provisioning configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output of `ceph auth get-key client.admin | base64`. Secrets are
    /// skipped without it.
    #[arg(long)]
    admin_key: Option<String>,

    /// Comma separated `ip:port` list of the Ceph monitors
    #[arg(long, default_value = "rook-ceph-mon-a:6789")]
    monitors: String,
}

/// Rook names the first data pool of a filesystem `<fs>-data0`.
fn default_data_pool(fs_name: &str) -> String {
    format!("{fs_name}-data0")
}

fn render_profile(
    config: &ProvisionConfig,
    profile: &StorageProfile,
    admin_key: Option<&AdminKey>,
    monitors: &str,
) -> Result<String> {
    let namespace = &config.cluster_namespace;
    let mut documents = Vec::new();

    let data_pool = match profile.interface {
        Interface::Rbd => {
            let pool = manifests::block_pool(
                &profile.pool_name,
                namespace,
                profile.replication_size,
                &profile.failure_domain,
            );
            documents.push(manifests::to_yaml(&pool)?);
            None
        }
        Interface::CephFs => {
            let fs = manifests::filesystem(
                &profile.pool_name,
                namespace,
                profile.replication_size,
                &profile.failure_domain,
            );
            documents.push(manifests::to_yaml(&fs)?);
            Some(default_data_pool(&profile.pool_name))
        }
    };

    match admin_key {
        Some(key) => {
            let secret = manifests::secret(
                profile.interface,
                &profile.secret_name,
                &config.secret_namespace,
                key,
            );
            documents.push(manifests::to_yaml(&secret)?);
        }
        None => warn!("No admin key given, skipping Secret {}", profile.secret_name),
    }

    let sc = manifests::storage_class(&StorageClassParams {
        interface: profile.interface,
        name: &profile.storage_class_name,
        monitors,
        pool_name: &profile.pool_name,
        data_pool: data_pool.as_deref(),
        secret_name: &profile.secret_name,
        secret_namespace: &config.secret_namespace,
    });
    documents.push(manifests::to_yaml(&sc)?);

    let pvc = manifests::pvc(
        &profile.pvc_name,
        config.pvc_namespace(profile),
        &profile.storage_class_name,
        &profile.capacity,
    );
    documents.push(manifests::to_yaml(&pvc)?);

    Ok(documents.join("\n---\n"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ProvisionConfig::from_file(path)?,
        None => ProvisionConfig::default(),
    };
    let admin_key = args
        .admin_key
        .as_deref()
        .map(AdminKey::from_base64)
        .transpose()?;

    fs::create_dir_all(&args.output_dir)?;
    for profile in &config.profiles {
        let yaml = render_profile(&config, profile, admin_key.as_ref(), &args.monitors)?;
        let output_path = args
            .output_dir
            .join(format!("{}-{}.yaml", profile.interface, profile.pool_name));
        fs::write(&output_path, yaml)?;
        info!(
            "Generated {} storage manifests at {}",
            profile.interface,
            output_path.display()
        );
    }

    Ok(())
}
