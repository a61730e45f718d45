//! Virtualization instance lifecycle (C6): start/stop orchestration, including mount-completion
//! detection via device-id polling.

use crate::callbacks::ProviderCallbacks;
use crate::error::{Code, ProjFsError, ProjFsResult, UpdateFailureCause};
use crate::model::ProjectionState;
use crate::placeholder;
use crate::session::Session;
use parking_lot::RwLock;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MOUNT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const MOUNT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// One virtualization instance per provider process. Either the session handle is `None` and
/// every operation but [`VirtualizationInstance::start`] fails with `DriverNotLoaded`, or it is
/// `Some` and `start` rejects re-entry with `InvalidState`.
pub struct VirtualizationInstance {
    virt_root: PathBuf,
    own_pid: u32,
    session: RwLock<Option<Arc<Session>>>,
}

impl VirtualizationInstance {
    /// Constructs an inert instance. Call [`Self::start`] to bind it to the projection driver.
    pub fn new(virt_root: impl Into<PathBuf>) -> Self {
        Self {
            virt_root: virt_root.into(),
            own_pid: std::process::id(),
            session: RwLock::new(None),
        }
    }

    pub fn virt_root(&self) -> &Path {
        &self.virt_root
    }

    fn session_handle(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    /// Binds to the projection driver and blocks until the mount is observed complete.
    ///
    /// Returns `Code::InvalidState` if a session is already live, `Code::Invalid` if the
    /// virtualization root cannot be stat'd, the session fails to construct or start, or the
    /// mount does not complete within 30 seconds. `Code::Success` otherwise.
    pub fn start(
        &self,
        storage_root: &str,
        callbacks: Arc<dyn ProviderCallbacks>,
        pool_threads: i32,
        initialize_storage_root: bool,
    ) -> ProjFsResult<Code> {
        if self.session.read().is_some() {
            return Ok(Code::InvalidState);
        }

        let prior_dev = match std::fs::metadata(&self.virt_root) {
            Ok(meta) => meta.dev(),
            Err(e) => {
                tracing::warn!(error = %e, root = %self.virt_root.display(), "cannot stat virtualization root");
                return Ok(Code::Invalid);
            }
        };

        let virt_root_str = self.virt_root.to_string_lossy().into_owned();
        let session = match Session::new(
            storage_root,
            &virt_root_str,
            callbacks,
            self.own_pid,
            initialize_storage_root,
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to construct projection session");
                return Ok(Code::Invalid);
            }
        };

        if let Err(e) = session.start(pool_threads) {
            tracing::warn!(error = %e, "failed to start projection session");
            session.stop();
            return Ok(Code::Invalid);
        }

        if !self.wait_for_mount(prior_dev) {
            tracing::warn!(root = %self.virt_root.display(), "mount did not complete within timeout");
            session.stop();
            return Ok(Code::Invalid);
        }

        *self.session.write() = Some(Arc::new(session));
        tracing::info!(root = %self.virt_root.display(), "virtualization instance started");
        Ok(Code::Success)
    }

    /// Polls the virtualization root's device id every 200ms; returns true once it differs from
    /// `prior_dev`, or false after 30 seconds with no change.
    fn wait_for_mount(&self, prior_dev: u64) -> bool {
        let deadline = Instant::now() + MOUNT_WAIT_TIMEOUT;
        loop {
            if let Ok(meta) = std::fs::metadata(&self.virt_root) {
                if meta.dev() != prior_dev {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(MOUNT_POLL_INTERVAL);
        }
    }

    /// Stops the session and clears the handle. Idempotent.
    pub fn stop(&self) {
        let existing = self.session.write().take();
        if let Some(session) = existing {
            session.stop();
            tracing::info!(root = %self.virt_root.display(), "virtualization instance stopped");
        }
    }

    pub fn write_placeholder_dir(&self, relative_path: &str) -> ProjFsResult<Code> {
        match self.session_handle() {
            Some(session) => placeholder::write_placeholder_dir(session.as_ref(), relative_path),
            None => Ok(Code::DriverNotLoaded),
        }
    }

    pub fn write_placeholder_file(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        size: u64,
        mode: u32,
    ) -> ProjFsResult<Code> {
        match self.session_handle() {
            Some(session) => placeholder::write_placeholder_file(
                session.as_ref(),
                relative_path,
                provider_id,
                content_id,
                size,
                mode,
            ),
            None => Ok(Code::DriverNotLoaded),
        }
    }

    pub fn write_symlink(&self, relative_path: &str, target: &str) -> ProjFsResult<Code> {
        match self.session_handle() {
            Some(session) => placeholder::write_symlink(session.as_ref(), relative_path, target),
            None => Ok(Code::DriverNotLoaded),
        }
    }

    pub fn delete_file(
        &self,
        relative_path: &str,
    ) -> ProjFsResult<(Code, UpdateFailureCause)> {
        match self.session_handle() {
            Some(session) => {
                placeholder::delete_file(session.as_ref(), &self.virt_root, relative_path)
            }
            None => Ok((Code::DriverNotLoaded, UpdateFailureCause::NoFailure)),
        }
    }

    pub fn update_placeholder_if_needed(
        &self,
        relative_path: &str,
        provider_id: &[u8],
        content_id: &[u8],
        size: u64,
        mode: u32,
    ) -> ProjFsResult<(Code, UpdateFailureCause)> {
        match self.session_handle() {
            Some(session) => placeholder::update_placeholder_if_needed(
                session.as_ref(),
                &self.virt_root,
                relative_path,
                provider_id,
                content_id,
                size,
                mode,
            ),
            None => Ok((Code::DriverNotLoaded, UpdateFailureCause::NoFailure)),
        }
    }

    pub fn replace_placeholder_with_symlink(
        &self,
        relative_path: &str,
        target: &str,
    ) -> ProjFsResult<(Code, UpdateFailureCause)> {
        match self.session_handle() {
            Some(session) => placeholder::replace_placeholder_with_symlink(
                session.as_ref(),
                &self.virt_root,
                relative_path,
                target,
            ),
            None => Ok((Code::DriverNotLoaded, UpdateFailureCause::NoFailure)),
        }
    }

    pub fn get_proj_state(&self, relative_path: &str) -> ProjFsResult<(Code, ProjectionState)> {
        match self.session_handle() {
            Some(session) => session.get_proj_state(relative_path),
            None => Err(ProjFsError::InvalidState(
                "no active projection session".into(),
            )),
        }
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<VirtualizationInstance>;
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inert_instance_has_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let instance = VirtualizationInstance::new(dir.path());
        assert!(instance.session_handle().is_none());
    }

    #[test]
    fn operations_on_inert_instance_report_driver_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let instance = VirtualizationInstance::new(dir.path());

        assert_eq!(
            instance.write_placeholder_dir("a").unwrap(),
            Code::DriverNotLoaded
        );
        let (code, cause) = instance.delete_file("a").unwrap();
        assert_eq!(code, Code::DriverNotLoaded);
        assert_eq!(cause, UpdateFailureCause::NoFailure);
    }

    #[test]
    fn stop_on_inert_instance_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let instance = VirtualizationInstance::new(dir.path());
        instance.stop();
        instance.stop();
    }
}
