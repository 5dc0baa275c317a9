//! CLI commands

use clap::Args;
use hardway_pki::{ClusterTopology, FailurePolicy, RoleOutcome, RoleReport};

use crate::{Error, Result};

pub mod bootstrap;
pub mod certs;
pub mod kubeconfig;
pub mod list;

/// API server addresses and node names
#[derive(Args, Debug, Clone)]
pub struct TopologyArgs {
    /// API server address (repeatable or comma separated); the first is the kubeconfig endpoint
    #[arg(long = "apiserver", required = true, value_delimiter = ',')]
    pub apiservers: Vec<String>,

    /// Node host names
    pub nodes: Vec<String>,
}

impl TopologyArgs {
    pub fn topology(&self) -> ClusterTopology {
        ClusterTopology::new(self.apiservers.clone(), self.nodes.clone())
    }
}

pub(crate) fn failure_policy(keep_going: bool) -> FailurePolicy {
    if keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    }
}

pub(crate) fn print_report(title: &str, report: &RoleReport) {
    println!("{title}:");
    for result in &report.results {
        println!("  {:<28} {}", result.role, describe(&result.outcome));
    }
}

fn describe(outcome: &RoleOutcome) -> String {
    match outcome {
        RoleOutcome::Loaded => "present".to_string(),
        RoleOutcome::Issued => "issued".to_string(),
        RoleOutcome::Written(path) => format!("written {}", path.display()),
        RoleOutcome::Failed(e) => format!("FAILED: {e}"),
    }
}

/// Turn failed roles into an error so the process exits non-zero
pub(crate) fn check_reports(reports: &[&RoleReport]) -> Result<()> {
    let failed: usize = reports.iter().map(|r| r.failures().count()).sum();
    let total: usize = reports.iter().map(|r| r.results.len()).sum();
    if failed == 0 {
        Ok(())
    } else {
        Err(Error::RolesFailed { failed, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_going_selects_continue() {
        assert_eq!(failure_policy(true), FailurePolicy::Continue);
        assert_eq!(failure_policy(false), FailurePolicy::Abort);
    }

    #[test]
    fn outcomes_are_described() {
        assert_eq!(describe(&RoleOutcome::Issued), "issued");
        assert_eq!(describe(&RoleOutcome::Loaded), "present");
        let failed = RoleOutcome::Failed(hardway_pki::Error::not_found("admin"));
        assert!(describe(&failed).contains("certificate not found: admin"));
    }

    #[test]
    fn empty_reports_pass() {
        assert!(check_reports(&[&RoleReport::default()]).is_ok());
    }
}
