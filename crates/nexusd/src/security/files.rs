use std::fs::{DirBuilder, Permissions};
use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

const TOKEN_FILE_MODE: u32 = 0o600;
const TOKEN_DIR_MODE: u32 = 0o700;

/// Writes `contents` to `path` through a temporary sibling that is renamed
/// into place, so readers never observe a partial token.
pub(super) fn atomic_write(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "token path did not have a parent directory",
        )
    })?;
    ensure_directory(directory)?;

    let mut builder = Builder::new();
    builder.prefix(path.file_name().unwrap_or("nexus-token"));
    #[cfg(unix)]
    builder.permissions(Permissions::from_mode(TOKEN_FILE_MODE));

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

fn ensure_directory(directory: &Utf8Path) -> io::Result<()> {
    if directory.as_str().is_empty() {
        return Ok(());
    }
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(TOKEN_DIR_MODE);
    builder.create(directory)
}
