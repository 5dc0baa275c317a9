//! Certs command

use clap::Args;
use hardway_pki::{issue_cluster, CertificateStore, FailurePolicy, PkiConfig, RoleReport};
use tracing::info;

use super::{check_reports, failure_policy, print_report, TopologyArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct CertsArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Keep issuing remaining roles after a failure
    #[arg(long)]
    pub keep_going: bool,
}

pub fn run(args: CertsArgs, config: &PkiConfig) -> Result<()> {
    let mut store = config.open_store()?;
    let report = issue(&mut store, config, &args.topology, failure_policy(args.keep_going))?;
    print_report("certificates", &report);
    check_reports(&[&report])
}

/// Write the signing profiles if needed, then issue the role catalogue
pub(crate) fn issue(
    store: &mut CertificateStore,
    config: &PkiConfig,
    topology: &TopologyArgs,
    policy: FailurePolicy,
) -> Result<RoleReport> {
    config.signing.ensure_written(store.root())?;
    info!(
        workdir = %store.root().display(),
        nodes = topology.nodes.len(),
        "issuing cluster certificates"
    );
    Ok(issue_cluster(
        store,
        &config.request_builder(),
        &topology.topology(),
        policy,
    )?)
}
