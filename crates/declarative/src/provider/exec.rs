//! Exec provider - guarded shell commands
//!
//! An exec is "pending" until its guards say otherwise. Guards are run
//! during observation, so they must not modify the host. An exec needs an
//! `unless` or `onlyif` guard, or `refreshonly`, so that a converged host
//! does not run it again.

use super::Provider;
use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, RefreshOutcome, ResourceKind, ResourceState};
use std::path::Path;

/// Runs commands
///
/// Properties:
/// - `command`: shell command (defaults to the title)
/// - `unless`: skip when this command succeeds
/// - `onlyif`: run only when this command succeeds
/// - `refreshonly`: run only when notified
/// - `cwd`: working directory
pub struct ExecProvider;

impl ExecProvider {
    fn command(resource: &Resource) -> &str {
        resource.property("command").unwrap_or(&resource.title)
    }

    fn cwd(resource: &Resource) -> Option<&Path> {
        resource.property("cwd").map(Path::new)
    }

    fn succeeds(command: &str, resource: &Resource, ctx: &ApplyContext) -> ProviderResult<bool> {
        let output = ctx.backends.commands.run(command, Self::cwd(resource))?;
        Ok(output.success)
    }

    /// Whether the guards allow the command to run
    fn guards_allow(resource: &Resource, ctx: &ApplyContext) -> ProviderResult<bool> {
        if let Some(unless) = resource.property("unless")
            && Self::succeeds(unless, resource, ctx)?
        {
            return Ok(false);
        }
        if let Some(onlyif) = resource.property("onlyif")
            && !Self::succeeds(onlyif, resource, ctx)?
        {
            return Ok(false);
        }
        Ok(true)
    }

    fn check_guarded(resource: &Resource) -> ProviderResult<()> {
        let guarded = resource.property("unless").is_some()
            || resource.property("onlyif").is_some()
            || resource.flag("refreshonly", false);
        if guarded {
            Ok(())
        } else {
            Err(ProviderError::invalid(format!(
                "'{}' needs an 'unless' or 'onlyif' guard, or 'refreshonly'",
                Self::command(resource)
            )))
        }
    }

    fn execute(resource: &Resource, ctx: &ApplyContext) -> ProviderResult<()> {
        let command = Self::command(resource);
        log::info!("running {command}");
        let output = ctx.backends.commands.run(command, Self::cwd(resource))?;
        if output.success {
            Ok(())
        } else {
            let stderr = output.stderr_str();
            Err(ProviderError::backend(
                command,
                if stderr.trim().is_empty() {
                    "command exited with non-zero status".to_string()
                } else {
                    stderr.trim().to_string()
                },
            ))
        }
    }
}

impl Provider for ExecProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Exec
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        if resource.flag("refreshonly", false) || !Self::guards_allow(resource, ctx)? {
            return Ok(ResourceState::new("present"));
        }
        Ok(ResourceState::new("pending"))
    }

    fn desired_state(
        &self,
        resource: &Resource,
        _ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        if resource.ensure.is_absent() {
            return Err(ProviderError::invalid("an exec cannot be absent"));
        }
        Self::check_guarded(resource)?;
        Ok(ResourceState::new("present"))
    }

    fn converge(
        &self,
        resource: &Resource,
        diff: &ResourceDiff,
        ctx: &ApplyContext,
    ) -> ProviderResult<ApplyResult> {
        if diff.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        Self::execute(resource, ctx)?;
        Ok(ApplyResult::Modified)
    }

    fn refreshable(&self) -> bool {
        true
    }

    fn refresh(
        &self,
        resource: &Resource,
        own_diff: Option<&ResourceDiff>,
        ctx: &ApplyContext,
    ) -> ProviderResult<RefreshOutcome> {
        if own_diff.is_some_and(|d| !d.is_empty()) {
            return Ok(RefreshOutcome::Skipped {
                reason: "command already ran in this run".to_string(),
            });
        }
        if !Self::guards_allow(resource, ctx)? {
            return Ok(RefreshOutcome::Skipped {
                reason: "guard not satisfied".to_string(),
            });
        }
        Self::execute(resource, ctx)?;
        Ok(RefreshOutcome::Executed)
    }
}
