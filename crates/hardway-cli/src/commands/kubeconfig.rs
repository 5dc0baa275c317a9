//! Kubeconfig command

use clap::Args;
use hardway_pki::{write_cluster_kubeconfigs, CertificateStore, FailurePolicy, PkiConfig, RoleReport};
use tracing::info;

use super::{check_reports, failure_policy, print_report, TopologyArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct KubeconfigArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Keep writing remaining kubeconfigs after a failure
    #[arg(long)]
    pub keep_going: bool,
}

pub fn run(args: KubeconfigArgs, config: &PkiConfig) -> Result<()> {
    let mut store = config.open_store()?;
    let report = write(&mut store, config, &args.topology, failure_policy(args.keep_going))?;
    print_report("kubeconfigs", &report);
    check_reports(&[&report])
}

pub(crate) fn write(
    store: &mut CertificateStore,
    config: &PkiConfig,
    topology: &TopologyArgs,
    policy: FailurePolicy,
) -> Result<RoleReport> {
    info!(workdir = %store.root().display(), "writing kubeconfigs");
    Ok(write_cluster_kubeconfigs(
        store,
        &config.assembler(),
        &topology.topology(),
        policy,
    )?)
}
