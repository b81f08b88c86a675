use std::fs::DirBuilder;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::Config;

/// Upper bound on `sun_path` accepted by the kernel, excluding the terminator.
const MAX_SOCKET_PATH_BYTES: usize = 107;

/// Permission bits applied to a socket directory created on demand.
const SOCKET_DIR_MODE: u32 = 0o750;

/// Derives the filesystem address of each service socket.
///
/// Every worker listens on `<directory>/service_<name>.sock`; the orchestrator,
/// the workers and the client agree on the layout through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSocketLayout {
    directory: Utf8PathBuf,
    permissions: u32,
}

impl ServiceSocketLayout {
    /// Builds a layout rooted at `directory`.
    #[must_use]
    pub fn new(directory: impl Into<Utf8PathBuf>, permissions: u32) -> Self {
        Self {
            directory: directory.into(),
            permissions,
        }
    }

    /// Builds the layout described by the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.socket_dir.clone(), config.socket_permissions.bits())
    }

    /// Directory that holds the sockets.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Permission bits applied to each socket file.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Returns the socket path for the named service.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty, contains a path separator, or produces a
    /// path longer than a Unix socket address can hold.
    pub fn socket_path(&self, service: &str) -> Result<Utf8PathBuf, SocketLayoutError> {
        if service.is_empty() || service.contains('/') || service.contains('\0') {
            return Err(SocketLayoutError::InvalidServiceName {
                name: service.to_owned(),
            });
        }
        let path = self.directory.join(format!("service_{service}.sock"));
        if path.as_str().len() > MAX_SOCKET_PATH_BYTES {
            return Err(SocketLayoutError::PathTooLong { path });
        }
        Ok(path)
    }

    /// Ensures the socket directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`SocketLayoutError::CreateDirectory`] when the directory cannot
    /// be created.
    pub fn prepare_directory(&self) -> Result<(), SocketLayoutError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(SOCKET_DIR_MODE);
        }

        if let Err(source) = builder.create(self.directory.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketLayoutError::CreateDirectory {
                path: self.directory.clone(),
                source,
            });
        }
        Ok(())
    }
}

/// Errors raised while deriving or preparing service socket paths.
#[derive(Debug, Error)]
pub enum SocketLayoutError {
    /// Service name cannot be embedded in a socket file name.
    #[error("invalid service name '{name}'")]
    InvalidServiceName {
        /// Rejected service name.
        name: String,
    },
    /// Derived path exceeds the Unix socket address limit.
    #[error("socket path '{path}' exceeds the unix socket address limit")]
    PathTooLong {
        /// Rejected socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn derives_service_socket_path() {
        let layout = ServiceSocketLayout::new("/tmp/service", 0o770);
        let path = layout.socket_path("home").expect("path should derive");
        assert_eq!(path, Utf8PathBuf::from("/tmp/service/service_home.sock"));
    }

    #[rstest]
    #[case("")]
    #[case("../etc")]
    #[case("a/b")]
    fn rejects_unsafe_service_names(#[case] name: &str) {
        let layout = ServiceSocketLayout::new("/tmp/service", 0o770);
        let error = layout.socket_path(name).expect_err("name should be rejected");
        assert!(matches!(error, SocketLayoutError::InvalidServiceName { .. }));
    }

    #[test]
    fn rejects_overlong_paths() {
        let layout = ServiceSocketLayout::new(format!("/tmp/{}", "d".repeat(120)), 0o770);
        let error = layout.socket_path("home").expect_err("path should be too long");
        assert!(matches!(error, SocketLayoutError::PathTooLong { .. }));
    }

    #[test]
    fn prepares_missing_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let directory = Utf8PathBuf::from_path_buf(temp.path().join("nested/sockets"))
            .expect("utf8 temp path");
        let layout = ServiceSocketLayout::new(directory.clone(), 0o770);
        layout.prepare_directory().expect("directory should be created");
        assert!(directory.is_dir());
        layout
            .prepare_directory()
            .expect("preparing twice should succeed");
    }
}
