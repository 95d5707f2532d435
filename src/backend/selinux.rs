use super::{checked, failed};
use crate::runner;
use declarative::{BooleanBackend, ProviderError, ProviderResult};

/// SELinux booleans through `getsebool` / `setsebool`
pub struct SeBooleans;

impl BooleanBackend for SeBooleans {
    fn get(&self, name: &str) -> ProviderResult<Option<bool>> {
        let args = [name];
        let captured =
            runner::capture("getsebool", &args).map_err(|e| failed("getsebool", &args, &e))?;
        if !captured.success {
            if captured.stderr.contains("disabled") {
                return Err(ProviderError::backend(
                    runner::describe("getsebool", &args),
                    captured.stderr,
                ));
            }
            // Unknown booleans are reported on stderr with a non-zero exit
            return Ok(None);
        }
        parse_getsebool(&captured.stdout).map(Some).ok_or_else(|| {
            ProviderError::backend(
                runner::describe("getsebool", &args),
                format!("unexpected output '{}'", captured.stdout),
            )
        })
    }

    fn set(&self, name: &str, value: bool, persistent: bool) -> ProviderResult<()> {
        let value = if value { "on" } else { "off" };
        if persistent {
            checked("setsebool", &["-P", name, value])?;
        } else {
            checked("setsebool", &[name, value])?;
        }
        Ok(())
    }
}

/// `httpd_can_network_connect --> on`
fn parse_getsebool(line: &str) -> Option<bool> {
    match line.trim().rsplit_once("-->")?.1.trim() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}
