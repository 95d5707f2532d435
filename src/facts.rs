//! Discover facts about the running host

use anyhow::Result;
use manifest::HostFacts;
use manifest::facts::{
    ARCHITECTURE, HOSTNAME, OS_FAMILY, OS_RELEASE, PROCESSOR_COUNT, SELINUX_ENFORCING,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread;

use crate::config::EngineConfig;

const OS_RELEASE_FILE: &str = "/etc/os-release";
const SELINUX_ENFORCE_FILE: &str = "/sys/fs/selinux/enforce";

/// Facts read from this host
pub fn discover() -> HostFacts {
    let mut facts = HostFacts::new()
        .with(ARCHITECTURE, std::env::consts::ARCH)
        .with(
            PROCESSOR_COUNT,
            thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get) as u64,
        )
        .with(HOSTNAME, hostname())
        .with(SELINUX_ENFORCING, selinux_enforcing(Path::new(SELINUX_ENFORCE_FILE)));

    match fs::read_to_string(OS_RELEASE_FILE) {
        Ok(content) => {
            let release = parse_os_release(&content);
            if let Some(family) = os_family(&release) {
                facts.set(OS_FAMILY, family);
            }
            if let Some(version) = release.get("VERSION_ID") {
                facts.set(OS_RELEASE, version.as_str());
            }
        }
        Err(e) => log::warn!("Could not read {OS_RELEASE_FILE}: {e}"),
    }

    log::debug!("Discovered {} facts", facts.iter().count());
    facts
}

/// Discovered facts with overrides applied: config file, then `--facts-file`,
/// then each `--fact`
pub fn resolve(
    config: &EngineConfig,
    facts_file: Option<&Path>,
    assignments: &[String],
) -> Result<HostFacts> {
    let mut facts = discover();
    facts.merge(config.facts.clone());
    if let Some(path) = facts_file {
        facts.merge(HostFacts::from_file(path)?);
    }
    for assignment in assignments {
        facts.set_assignment(assignment)?;
    }
    Ok(facts)
}

fn hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .or_else(|_| fs::read_to_string("/etc/hostname"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

fn selinux_enforcing(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|s| s.trim() == "1")
}

/// `KEY=value` lines of os-release, with quotes removed
fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Map os-release `ID` / `ID_LIKE` to an OS family name
fn os_family(release: &BTreeMap<String, String>) -> Option<&'static str> {
    let ids = release
        .get("ID")
        .into_iter()
        .chain(release.get("ID_LIKE"))
        .flat_map(|v| v.split_whitespace());

    for id in ids {
        match id {
            "debian" | "ubuntu" => return Some("Debian"),
            "rhel" | "fedora" | "centos" | "rocky" | "almalinux" => return Some("RedHat"),
            "suse" | "opensuse" | "sles" => return Some("Suse"),
            "arch" => return Some("Archlinux"),
            _ => {}
        }
    }
    None
}
