//! List command

use std::path::Path;

use clap::Args;
use hardway_pki::kubeconfig::{load_bundle, scan_kubeconfigs};
use hardway_pki::{Certificate, PkiConfig};

use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also print subject alternative names
    #[arg(long)]
    pub sans: bool,
}

pub fn run(args: ListArgs, config: &PkiConfig) -> Result<()> {
    if !config.workdir.is_dir() {
        return Err(Error::validation(format!(
            "certificate directory {} does not exist",
            config.workdir.display()
        )));
    }

    let mut store = config.open_store()?;
    let report = store.scan_all()?;

    println!("certificates:");
    for cert in &report.certificates {
        println!("  {}", describe_certificate(cert, args.sans));
    }

    if !report.invalid.is_empty() {
        println!("partial key pairs:");
        for pair in &report.invalid {
            println!("  {:<28} {}", pair.name, pair.reason);
        }
    }

    let kubeconfigs = scan_kubeconfigs(store.root())?;
    if !kubeconfigs.is_empty() {
        println!("kubeconfigs:");
        for role in kubeconfigs.keys() {
            println!("  {}", describe_kubeconfig(store.root(), role));
        }
    }
    Ok(())
}

fn describe_certificate(cert: &Certificate, with_sans: bool) -> String {
    let info = match cert.info() {
        Ok(info) => info,
        Err(e) => return format!("{:<28} unreadable: {e}", cert.name()),
    };

    let status = if info.is_expired() {
        "EXPIRED".to_string()
    } else {
        format!("{}d left", info.remaining().num_days())
    };
    let mut line = format!(
        "{:<28} CN={:<36} expires {} ({status})",
        cert.name(),
        info.subject_cn,
        info.not_after.format("%Y-%m-%d"),
    );
    if with_sans && !info.sans.is_empty() {
        line.push_str(&format!(" SANs={}", info.sans.join(",")));
    }
    line
}

fn describe_kubeconfig(root: &Path, role: &str) -> String {
    match load_bundle(root, role) {
        Ok(Some(config)) => format!(
            "{:<28} user={} server={}",
            role,
            config.username().unwrap_or("-"),
            config.server().unwrap_or("-"),
        ),
        Ok(None) => format!("{role:<28} missing"),
        Err(e) => format!("{role:<28} unreadable: {e}"),
    }
}
