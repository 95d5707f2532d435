use crate::runner;
use declarative::{FileKind, FileStat, FileSystem, ProviderError, ProviderResult};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Mode given to files that did not exist before
const NEW_FILE_MODE: u32 = 0o644;

/// The local filesystem
pub struct LocalFs;

fn io_error(operation: &str, path: &Path, err: &io::Error) -> ProviderError {
    ProviderError::backend(format!("{operation} {}", path.display()), err.to_string())
}

impl FileSystem for LocalFs {
    fn stat(&self, path: &Path) -> ProviderResult<Option<FileStat>> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("stat", path, &e)),
        };
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Ok(Some(FileStat {
            kind,
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
        }))
    }

    fn read(&self, path: &Path) -> ProviderResult<Vec<u8>> {
        fs::read(path).map_err(|e| io_error("read", path, &e))
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> ProviderResult<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ProviderError::invalid(format!("{} has no parent", path.display())))?;
        let previous = fs::metadata(path).ok();

        let mut temp =
            NamedTempFile::new_in(parent).map_err(|e| io_error("create temp in", parent, &e))?;
        temp.write_all(content)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| io_error("write", temp.path(), &e))?;

        let mode = previous
            .as_ref()
            .map_or(NEW_FILE_MODE, |meta| meta.mode() & 0o7777);
        fs::set_permissions(temp.path(), Permissions::from_mode(mode))
            .map_err(|e| io_error("chmod", temp.path(), &e))?;
        if let Some(meta) = &previous {
            std::os::unix::fs::chown(temp.path(), Some(meta.uid()), Some(meta.gid()))
                .map_err(|e| io_error("chown", temp.path(), &e))?;
        }

        temp.persist(path)
            .map_err(|e| io_error("rename onto", path, &e.error))?;
        log::debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> ProviderResult<()> {
        fs::create_dir(path).map_err(|e| io_error("mkdir", path, &e))
    }

    fn remove(&self, path: &Path) -> ProviderResult<()> {
        let meta = fs::symlink_metadata(path).map_err(|e| io_error("stat", path, &e))?;
        if meta.is_dir() {
            fs::remove_dir(path).map_err(|e| io_error("rmdir", path, &e))
        } else {
            fs::remove_file(path).map_err(|e| io_error("rm", path, &e))
        }
    }

    fn set_mode(&self, path: &Path, mode: u32) -> ProviderResult<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| io_error("chmod", path, &e))
    }

    fn set_owner(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> ProviderResult<()> {
        std::os::unix::fs::lchown(path, uid, gid).map_err(|e| io_error("chown", path, &e))
    }

    fn read_link(&self, path: &Path) -> ProviderResult<PathBuf> {
        fs::read_link(path).map_err(|e| io_error("readlink", path, &e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> ProviderResult<()> {
        std::os::unix::fs::symlink(target, link).map_err(|e| io_error("symlink", link, &e))
    }

    fn user_id(&self, name: &str) -> ProviderResult<Option<u32>> {
        lookup_id("passwd", name)
    }

    fn group_id(&self, name: &str) -> ProviderResult<Option<u32>> {
        lookup_id("group", name)
    }
}

/// Resolve a user or group name through `getent`
fn lookup_id(database: &str, name: &str) -> ProviderResult<Option<u32>> {
    let args = [database, name];
    let captured =
        runner::capture("getent", &args).map_err(|e| super::failed("getent", &args, &e))?;
    // getent exits 2 when the key is not in the database
    if !captured.success {
        return Ok(None);
    }
    Ok(parse_getent_id(&captured.stdout))
}

/// Third field of a passwd or group entry
fn parse_getent_id(entry: &str) -> Option<u32> {
    entry.lines().next()?.split(':').nth(2)?.parse().ok()
}
