//! Placeholder/update API (C5): shape the projected tree from outside the event dispatcher.

use crate::error::{Code, ProjFsError, ProjFsResult, UpdateFailureCause};
use crate::model::{PlaceholderId, ProjectionState, ID_LEN};
use crate::session::Session;
use std::path::Path;

/// Supplies a placeholder's projection state. Implemented by [`Session`]; test doubles implement
/// it directly so `delete_file`'s branching can be exercised without a real driver.
pub trait StateSource {
    fn get_proj_state(&self, relative_path: &str) -> ProjFsResult<(Code, ProjectionState)>;
}

impl StateSource for Session {
    fn get_proj_state(&self, relative_path: &str) -> ProjFsResult<(Code, ProjectionState)> {
        Session::get_proj_state(self, relative_path)
    }
}

/// Supplies the placeholder-creation operations, on top of [`StateSource`]. Implemented by
/// [`Session`]; test doubles implement it directly so the write/update/replace paths can be
/// exercised without a real driver.
pub trait PlaceholderTarget: StateSource {
    fn create_proj_dir(&self, relative_path: &str, mode: u32) -> ProjFsResult<Code>;

    fn create_proj_file(
        &self,
        relative_path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ProjFsResult<Code>;

    fn create_proj_symlink(&self, relative_path: &str, target: &str) -> ProjFsResult<Code>;
}

impl PlaceholderTarget for Session {
    fn create_proj_dir(&self, relative_path: &str, mode: u32) -> ProjFsResult<Code> {
        Session::create_proj_dir(self, relative_path, mode)
    }

    fn create_proj_file(
        &self,
        relative_path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ProjFsResult<Code> {
        Session::create_proj_file(self, relative_path, size, mode, provider_id, content_id)
    }

    fn create_proj_symlink(&self, relative_path: &str, target: &str) -> ProjFsResult<Code> {
        Session::create_proj_symlink(self, relative_path, target)
    }
}

/// Validates and copies a caller-supplied id slice into the fixed-width wire format. Property 2:
/// rejects any id whose length is not exactly [`ID_LEN`] bytes, without touching the filesystem.
fn to_placeholder_id(bytes: &[u8]) -> ProjFsResult<PlaceholderId> {
    if bytes.len() != ID_LEN {
        return Err(ProjFsError::InvalidArgument(format!(
            "placeholder id must be exactly {ID_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(bytes);
    Ok(id)
}

pub fn write_placeholder_dir<S: PlaceholderTarget>(
    session: &S,
    relative_path: &str,
) -> ProjFsResult<Code> {
    let code = session.create_proj_dir(relative_path, 0o777)?;
    tracing::debug!(path = relative_path, ?code, "write_placeholder_dir");
    Ok(code)
}

pub fn write_placeholder_file<S: PlaceholderTarget>(
    session: &S,
    relative_path: &str,
    provider_id: &[u8],
    content_id: &[u8],
    size: u64,
    mode: u32,
) -> ProjFsResult<Code> {
    let provider_id = to_placeholder_id(provider_id)?;
    let content_id = to_placeholder_id(content_id)?;
    let code = session.create_proj_file(relative_path, size, mode, &provider_id, &content_id)?;
    tracing::debug!(path = relative_path, size, ?code, "write_placeholder_file");
    Ok(code)
}

pub fn write_symlink<S: PlaceholderTarget>(
    session: &S,
    relative_path: &str,
    target: &str,
) -> ProjFsResult<Code> {
    let code = session.create_proj_symlink(relative_path, target)?;
    tracing::debug!(path = relative_path, target, ?code, "write_symlink");
    Ok(code)
}

/// Deletes `relative_path` from the projected tree. The virtualization root (empty path) is
/// undeletable; a fully-hydrated file refuses deletion with `DirtyData` rather than silently
/// discarding real data. Deleting something that no longer exists is treated as success.
pub fn delete_file<S: StateSource>(
    session: &S,
    virt_root: &Path,
    relative_path: &str,
) -> ProjFsResult<(Code, UpdateFailureCause)> {
    if relative_path.is_empty() {
        return Ok((Code::DirectoryNotEmpty, UpdateFailureCause::NoFailure));
    }

    let full_path = virt_root.join(relative_path);
    let is_directory = full_path.is_dir();

    if !is_directory {
        let (state_code, state) = session.get_proj_state(relative_path)?;
        let is_dirty = state == ProjectionState::Full
            || (state == ProjectionState::Unknown && state_code == Code::Invalid);
        if is_dirty {
            tracing::debug!(path = relative_path, "refusing delete of hydrated file");
            return Ok((
                Code::VirtualizationInvalidOperation,
                UpdateFailureCause::DirtyData,
            ));
        }
    }

    let removal = if is_directory {
        std::fs::remove_dir(&full_path)
    } else {
        std::fs::remove_file(&full_path)
    };

    match removal {
        Ok(()) => Ok((Code::Success, UpdateFailureCause::NoFailure)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok((Code::Success, UpdateFailureCause::NoFailure))
        }
        Err(e) => match e.raw_os_error() {
            Some(libc::ENOTEMPTY) => Ok((Code::DirectoryNotEmpty, UpdateFailureCause::NoFailure)),
            Some(libc::EACCES) | Some(libc::EPERM) => {
                Ok((Code::AccessDenied, UpdateFailureCause::ReadOnly))
            }
            Some(_) => Ok((Code::IoError, UpdateFailureCause::NoFailure)),
            None => Ok((Code::Invalid, UpdateFailureCause::NoFailure)),
        },
    }
}

pub fn update_placeholder_if_needed<S: PlaceholderTarget>(
    session: &S,
    virt_root: &Path,
    relative_path: &str,
    provider_id: &[u8],
    content_id: &[u8],
    size: u64,
    mode: u32,
) -> ProjFsResult<(Code, UpdateFailureCause)> {
    // Property 2: reject malformed ids before touching the filesystem — otherwise a bad id would
    // delete the live placeholder via `delete_file` below and then fail the rewrite, losing it.
    let provider_id = to_placeholder_id(provider_id)?;
    let content_id = to_placeholder_id(content_id)?;

    let (code, cause) = delete_file(session, virt_root, relative_path)?;
    if code != Code::Success {
        return Ok((code, cause));
    }

    let code = write_placeholder_file(session, relative_path, &provider_id, &content_id, size, mode)?;
    Ok((code, UpdateFailureCause::NoFailure))
}

pub fn replace_placeholder_with_symlink<S: PlaceholderTarget>(
    session: &S,
    virt_root: &Path,
    relative_path: &str,
    target: &str,
) -> ProjFsResult<(Code, UpdateFailureCause)> {
    let (code, cause) = delete_file(session, virt_root, relative_path)?;
    if code != Code::Success {
        return Ok((code, cause));
    }

    let code = write_symlink(session, relative_path, target)?;
    Ok((code, UpdateFailureCause::NoFailure))
}

/// Reserved: asynchronous command completion is not part of this implementation.
pub fn complete_command(_command_id: u64) -> Code {
    Code::NotYetImplemented
}

/// Reserved: converting a fully-populated directory back into a placeholder is not part of this
/// implementation.
pub fn convert_directory_to_placeholder(_relative_path: &str) -> Code {
    Code::NotYetImplemented
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeState(Code, ProjectionState);
    impl StateSource for FakeState {
        fn get_proj_state(&self, _relative_path: &str) -> ProjFsResult<(Code, ProjectionState)> {
            Ok((self.0, self.1))
        }
    }

    /// A [`PlaceholderTarget`] double that records every write it's asked to perform, so tests
    /// can assert a call never reached the filesystem layer.
    struct FakeTarget {
        state_code: Code,
        state: ProjectionState,
        create_file_calls: std::sync::atomic::AtomicUsize,
    }

    impl FakeTarget {
        fn missing() -> Self {
            FakeTarget {
                state_code: Code::FileNotFound,
                state: ProjectionState::Placeholder,
                create_file_calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl StateSource for FakeTarget {
        fn get_proj_state(&self, _relative_path: &str) -> ProjFsResult<(Code, ProjectionState)> {
            Ok((self.state_code, self.state))
        }
    }

    impl PlaceholderTarget for FakeTarget {
        fn create_proj_dir(&self, _relative_path: &str, _mode: u32) -> ProjFsResult<Code> {
            Ok(Code::Success)
        }

        fn create_proj_file(
            &self,
            _relative_path: &str,
            _size: u64,
            _mode: u32,
            _provider_id: &PlaceholderId,
            _content_id: &PlaceholderId,
        ) -> ProjFsResult<Code> {
            self.create_file_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Code::Success)
        }

        fn create_proj_symlink(&self, _relative_path: &str, _target: &str) -> ProjFsResult<Code> {
            Ok(Code::Success)
        }
    }

    #[test]
    fn rejects_short_placeholder_ids() {
        let err = to_placeholder_id(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, ProjFsError::InvalidArgument(_)));
    }

    #[test]
    fn accepts_exactly_128_byte_ids() {
        let id = to_placeholder_id(&[1u8; ID_LEN]).unwrap();
        assert_eq!(id.len(), ID_LEN);
    }

    #[test]
    fn deleting_the_root_is_refused_without_touching_disk() {
        let state = FakeState(Code::Success, ProjectionState::Full);
        let virt_root = Path::new("/nonexistent-marker-for-this-test");
        let (code, cause) = delete_file(&state, virt_root, "").unwrap();
        assert_eq!(code, Code::DirectoryNotEmpty);
        assert_eq!(cause, UpdateFailureCause::NoFailure);
    }

    #[test]
    fn delete_of_missing_file_is_idempotent_success() {
        let dir = tempfile::tempdir().unwrap();
        let state = FakeState(Code::FileNotFound, ProjectionState::Placeholder);
        let (code, cause) = delete_file(&state, dir.path(), "missing.txt").unwrap();
        assert_eq!(code, Code::Success);
        assert_eq!(cause, UpdateFailureCause::NoFailure);
    }

    #[test]
    fn refuses_to_delete_a_fully_hydrated_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("hydrated.txt");
        std::fs::write(&file_path, b"real bytes").unwrap();

        let state = FakeState(Code::Success, ProjectionState::Full);
        let (code, cause) = delete_file(&state, dir.path(), "hydrated.txt").unwrap();

        assert_eq!(code, Code::VirtualizationInvalidOperation);
        assert_eq!(cause, UpdateFailureCause::DirtyData);
        assert!(file_path.exists());
    }

    #[test]
    fn deletes_an_unhydrated_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("placeholder.txt");
        std::fs::write(&file_path, b"").unwrap();

        let state = FakeState(Code::Success, ProjectionState::Placeholder);
        let (code, cause) = delete_file(&state, dir.path(), "placeholder.txt").unwrap();

        assert_eq!(code, Code::Success);
        assert_eq!(cause, UpdateFailureCause::NoFailure);
        assert!(!file_path.exists());
    }

    #[test]
    fn update_rejects_malformed_provider_id_before_deleting_anything() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("placeholder.txt");
        std::fs::write(&file_path, b"").unwrap();

        let target = FakeTarget::missing();
        let err = update_placeholder_if_needed(
            &target,
            dir.path(),
            "placeholder.txt",
            &[0u8; 16],
            &[0u8; ID_LEN],
            0,
            0o644,
        )
        .unwrap_err();

        assert!(matches!(err, ProjFsError::InvalidArgument(_)));
        assert_eq!(
            target.create_file_calls.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
        // The existing placeholder must still be there: validation happens before `delete_file`.
        assert!(file_path.exists());
    }

    #[test]
    fn update_rejects_malformed_content_id_before_deleting_anything() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("placeholder.txt");
        std::fs::write(&file_path, b"").unwrap();

        let target = FakeTarget::missing();
        let err = update_placeholder_if_needed(
            &target,
            dir.path(),
            "placeholder.txt",
            &[0u8; ID_LEN],
            &[0u8; 4],
            0,
            0o644,
        )
        .unwrap_err();

        assert!(matches!(err, ProjFsError::InvalidArgument(_)));
        assert!(file_path.exists());
    }

    #[test]
    fn update_deletes_then_rewrites_when_ids_are_valid() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("placeholder.txt");
        std::fs::write(&file_path, b"").unwrap();

        let target = FakeTarget::missing();
        let (code, cause) = update_placeholder_if_needed(
            &target,
            dir.path(),
            "placeholder.txt",
            &[1u8; ID_LEN],
            &[2u8; ID_LEN],
            4096,
            0o644,
        )
        .unwrap();

        assert_eq!(code, Code::Success);
        assert_eq!(cause, UpdateFailureCause::NoFailure);
        assert!(!file_path.exists());
        assert_eq!(
            target.create_file_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
