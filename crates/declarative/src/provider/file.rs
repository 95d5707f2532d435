//! File provider - regular files and directories
//!
//! Content is never compared byte by byte in the state vocabulary: both
//! sides are reduced to a BLAKE3 digest, so reports stay small and never
//! leak file contents.

use super::Provider;
use crate::context::{ApplyContext, FileKind, FileStat};
use crate::diff::ResourceDiff;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::Resource;
use crate::types::{ApplyResult, Ensure, ResourceKind, ResourceState};
use std::path::{Path, PathBuf};

/// Manages files and directories
///
/// Properties:
/// - `path`: absolute path (defaults to the title)
/// - `content`: full file content
/// - `owner`, `group`: names or numeric ids
/// - `mode`: octal permission bits, e.g. `0644`
pub struct FileProvider;

/// Digest used to compare file content
pub fn content_digest(content: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(content).to_hex())
}

/// Parse an octal mode string (`644`, `0644` or `0o644`)
pub fn parse_mode(mode: &str) -> ProviderResult<u32> {
    let digits = mode.trim().trim_start_matches("0o");
    if digits.is_empty() {
        return Err(ProviderError::invalid("empty file mode"));
    }
    match u32::from_str_radix(digits, 8) {
        Ok(bits) if bits <= 0o7777 => Ok(bits),
        _ => Err(ProviderError::invalid(format!("invalid file mode '{mode}'"))),
    }
}

fn format_mode(bits: u32) -> String {
    format!("{bits:04o}")
}

fn kind_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::File => "file",
        FileKind::Directory => "directory",
        FileKind::Symlink => "link",
    }
}

pub(crate) fn resource_path(resource: &Resource) -> ProviderResult<PathBuf> {
    let path = Path::new(resource.property("path").unwrap_or(&resource.title));
    if !path.is_absolute() {
        return Err(ProviderError::invalid(format!(
            "path '{}' is not absolute",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

impl FileProvider {
    fn wanted_kind(resource: &Resource) -> ProviderResult<Option<FileKind>> {
        match &resource.ensure {
            Ensure::Present => Ok(Some(FileKind::File)),
            Ensure::Directory => Ok(Some(FileKind::Directory)),
            Ensure::Absent => Ok(None),
            other => Err(ProviderError::invalid(format!(
                "ensure '{other}' is not valid for a file"
            ))),
        }
    }

    fn resolve_id(
        value: &str,
        what: &str,
        lookup: impl FnOnce(&str) -> ProviderResult<Option<u32>>,
    ) -> ProviderResult<u32> {
        if let Ok(id) = value.parse::<u32>() {
            return Ok(id);
        }
        lookup(value)?.ok_or_else(|| ProviderError::invalid(format!("unknown {what} '{value}'")))
    }

    fn observed(stat: &FileStat) -> ResourceState {
        ResourceState::new(kind_name(stat.kind))
            .with("owner", stat.uid.to_string())
            .with("group", stat.gid.to_string())
            .with("mode", format_mode(stat.mode))
    }
}

impl Provider for FileProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::File
    }

    fn current_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        let path = resource_path(resource)?;
        let Some(stat) = ctx.backends.files.stat(&path)? else {
            return Ok(ResourceState::absent());
        };

        let mut state = Self::observed(&stat);
        if stat.kind == FileKind::File && resource.property("content").is_some() {
            let content = ctx.backends.files.read(&path)?;
            state = state.with("content", content_digest(&content));
        }
        Ok(state)
    }

    fn desired_state(
        &self,
        resource: &Resource,
        ctx: &ApplyContext,
    ) -> ProviderResult<ResourceState> {
        resource_path(resource)?;
        let Some(kind) = Self::wanted_kind(resource)? else {
            return Ok(ResourceState::absent());
        };

        let files = &ctx.backends.files;
        let mut state = ResourceState::new(kind_name(kind));
        if let Some(content) = resource.property("content") {
            if kind == FileKind::Directory {
                return Err(ProviderError::invalid("a directory cannot have content"));
            }
            state = state.with("content", content_digest(content.as_bytes()));
        }
        if let Some(owner) = resource.property("owner") {
            let uid = Self::resolve_id(owner, "user", |name| files.user_id(name))?;
            state = state.with("owner", uid.to_string());
        }
        if let Some(group) = resource.property("group") {
            let gid = Self::resolve_id(group, "group", |name| files.group_id(name))?;
            state = state.with("group", gid.to_string());
        }
        if let Some(mode) = resource.property("mode") {
            state = state.with("mode", format_mode(parse_mode(mode)?));
        }
        Ok(state)
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
        let path = resource_path(resource)?;
        let files = &ctx.backends.files;

        let Some(kind) = Self::wanted_kind(resource)? else {
            log::info!("removing {}", path.display());
            files.remove(&path)?;
            return Ok(ApplyResult::Removed);
        };

        let mut created = false;
        if let Some(change) = diff.get("ensure") {
            match change.from.as_deref() {
                Some("absent") | None => created = true,
                Some(found) => {
                    return Err(ProviderError::invalid(format!(
                        "{} is a {found}, refusing to replace it with a {}",
                        path.display(),
                        kind_name(kind)
                    )));
                }
            }
        }

        if kind == FileKind::Directory {
            if created {
                log::info!("creating directory {}", path.display());
                files.create_dir(&path)?;
            }
        } else if created || diff.touches("content") {
            log::info!("writing {}", path.display());
            let content = resource.property("content").unwrap_or_default();
            files.write_atomic(&path, content.as_bytes())?;
        }

        let uid = diff.get("owner").map(|c| parse_id(&c.to)).transpose()?;
        let gid = diff.get("group").map(|c| parse_id(&c.to)).transpose()?;
        if uid.is_some() || gid.is_some() {
            log::debug!("changing ownership of {}", path.display());
            files.set_owner(&path, uid, gid)?;
        }

        if let Some(change) = diff.get("mode") {
            log::debug!("changing mode of {} to {}", path.display(), change.to);
            files.set_mode(&path, parse_mode(&change.to)?)?;
        }

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }
}

fn parse_id(value: &str) -> ProviderResult<u32> {
    value
        .parse()
        .map_err(|_| ProviderError::invalid(format!("invalid numeric id '{value}'")))
}
