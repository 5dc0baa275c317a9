//! Bootstrap command: certificates, then kubeconfigs

use clap::Args;
use hardway_pki::{FailurePolicy, PkiConfig};
use tracing::warn;

use super::{certs, check_reports, failure_policy, kubeconfig, print_report, TopologyArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Keep going after a failed role in either phase
    #[arg(long)]
    pub keep_going: bool,
}

pub fn run(args: BootstrapArgs, config: &PkiConfig) -> Result<()> {
    let policy = failure_policy(args.keep_going);
    let mut store = config.open_store()?;

    let certificates = certs::issue(&mut store, config, &args.topology, policy)?;
    print_report("certificates", &certificates);
    if policy == FailurePolicy::Abort && !certificates.is_success() {
        warn!("skipping kubeconfigs after certificate failure");
        return check_reports(&[&certificates]);
    }

    let kubeconfigs = kubeconfig::write(&mut store, config, &args.topology, policy)?;
    print_report("kubeconfigs", &kubeconfigs);
    check_reports(&[&certificates, &kubeconfigs])
}
