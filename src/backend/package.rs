use super::{checked, failed};
use crate::runner;
use declarative::{PackageBackend, ProviderResult};

const APT_ENV: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// Debian family: dpkg for queries, apt-get for changes
pub struct Apt;

impl PackageBackend for Apt {
    fn installed_version(&self, name: &str) -> ProviderResult<Option<String>> {
        let args = ["-W", "-f=${Status}|${Version}", name];
        let captured =
            runner::capture("dpkg-query", &args).map_err(|e| failed("dpkg-query", &args, &e))?;
        // dpkg-query exits 1 for packages it has never seen
        if !captured.success {
            return Ok(None);
        }
        Ok(parse_dpkg_status(&captured.stdout))
    }

    fn install(&self, name: &str, version: Option<&str>) -> ProviderResult<()> {
        let wanted = match version {
            Some(version) => format!("{name}={version}"),
            None => name.to_string(),
        };
        let args = ["install", "-y", "-q", wanted.as_str()];
        runner::run_checked_env("apt-get", &args, APT_ENV)
            .map_err(|e| failed("apt-get", &args, &e))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> ProviderResult<()> {
        let args = ["remove", "-y", "-q", name];
        runner::run_checked_env("apt-get", &args, APT_ENV)
            .map_err(|e| failed("apt-get", &args, &e))?;
        Ok(())
    }
}

/// `Status|Version` as printed by dpkg-query; only fully installed counts
/// One `VERSION-RELEASE` per installed instance; the last one is the newest
fn parse_rpm_versions(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(str::to_string)
}

fn parse_dpkg_status(line: &str) -> Option<String> {
    let (status, version) = line.trim().split_once('|')?;
    (status.split_whitespace().last() == Some("installed") && !version.is_empty())
        .then(|| version.to_string())
}

/// RedHat family: rpm for queries, dnf or yum for changes
pub struct Rpm {
    tool: &'static str,
}

impl Rpm {
    pub fn new(tool: &'static str) -> Self {
        Self { tool }
    }
}

impl PackageBackend for Rpm {
    fn installed_version(&self, name: &str) -> ProviderResult<Option<String>> {
        let args = ["-q", "--qf", "%{VERSION}-%{RELEASE}\n", name];
        let captured = runner::capture("rpm", &args).map_err(|e| failed("rpm", &args, &e))?;
        if !captured.success {
            return Ok(None);
        }
        Ok(parse_rpm_versions(&captured.stdout))
    }

    fn install(&self, name: &str, version: Option<&str>) -> ProviderResult<()> {
        let wanted = match version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        };
        checked(self.tool, &["install", "-y", "-q", &wanted])?;
        Ok(())
    }

    fn remove(&self, name: &str) -> ProviderResult<()> {
        checked(self.tool, &["remove", "-y", "-q", name])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rpm_versions() {
        assert_eq!(parse_rpm_versions("1.24.0-1\n"), Some("1.24.0-1".to_string()));
        assert_eq!(
            parse_rpm_versions("1.24.0-1\n1.26.0-1\n"),
            Some("1.26.0-1".to_string())
        );
        assert_eq!(parse_rpm_versions(""), None);
    }

    #[test]
    fn test_parse_dpkg_status() {
        assert_eq!(
            parse_dpkg_status("install ok installed|1.24.0-2ubuntu7"),
            Some("1.24.0-2ubuntu7".to_string())
        );
        assert_eq!(parse_dpkg_status("deinstall ok config-files|1.24.0"), None);
        assert_eq!(parse_dpkg_status("unknown ok not-installed|"), None);
        assert_eq!(parse_dpkg_status(""), None);
    }
}
