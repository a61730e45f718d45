//! Safe wrapper around `projfs-sys` (C2): session construction, start/stop, placeholder
//! attribute/state queries, and the unsafe callback trampolines that bridge the driver's C ABI
//! back into [`crate::dispatcher`].

use crate::callbacks::ProviderCallbacks;
use crate::dispatcher::{self, AttrSource, SessionLiveness};
use crate::error::{Code, ProjFsError, ProjFsResult};
use crate::model::{PlaceholderId, RawEvent, Trigger, ID_LEN};
use crate::process;
use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Per-session state handed to the driver as the opaque instance-context pointer. Outlives the
/// `projfs_session` itself: allocated before `projfs_new`, freed only after `projfs_stop` has
/// drained every in-flight callback.
struct SessionContext {
    own_pid: u32,
    callbacks: Arc<dyn ProviderCallbacks>,
    session_ptr: AtomicPtr<projfs_sys::projfs_session>,
}

impl SessionLiveness for SessionContext {
    /// §4.4 preamble step 1: the driver session is live iff the context's pointer back to it has
    /// been set. Checked by every dispatcher entry point before it decodes an event or invokes a
    /// provider callback.
    fn is_running(&self) -> bool {
        !self.session_ptr.load(Ordering::Acquire).is_null()
    }
}

impl AttrSource for SessionContext {
    fn get_proj_attrs(&self, relative_path: &str) -> (Code, PlaceholderId, PlaceholderId) {
        let ptr = self.session_ptr.load(Ordering::Acquire);
        if ptr.is_null() {
            return (Code::DriverNotLoaded, [0u8; ID_LEN], [0u8; ID_LEN]);
        }

        let mut provider_id = [0u8; ID_LEN];
        let mut content_id = [0u8; ID_LEN];
        let Ok(c_path) = CString::new(relative_path) else {
            return (Code::InvalidArgument, provider_id, content_id);
        };

        let rc = unsafe {
            projfs_sys::projfs_get_proj_attrs(
                ptr,
                c_path.as_ptr(),
                provider_id.as_mut_ptr(),
                content_id.as_mut_ptr(),
            )
        };

        (Code::from_errno(rc.unsigned_abs() as i32), provider_id, content_id)
    }
}

/// Handle to a running (or just-constructed) projection session.
pub struct Session {
    ptr: *mut projfs_sys::projfs_session,
    ctx: *mut SessionContext,
}

// The raw pointers are only ever dereferenced through `libprojfs`'s own thread-safe entry
// points; the driver itself is documented to invoke handlers from multiple worker threads.
unsafe impl Send for Session {}
unsafe impl Sync for Session {}

impl Session {
    pub fn new(
        storage_root: &str,
        virt_root: &str,
        callbacks: Arc<dyn ProviderCallbacks>,
        own_pid: u32,
        initialize_storage_root: bool,
    ) -> ProjFsResult<Self> {
        let ctx = Box::into_raw(Box::new(SessionContext {
            own_pid,
            callbacks,
            session_ptr: AtomicPtr::new(std::ptr::null_mut()),
        }));

        let storage_root_c = CString::new(storage_root)
            .map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let virt_root_c =
            CString::new(virt_root).map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;

        let handlers = projfs_sys::projfs_handlers {
            proj: Some(trampoline_proj),
            notify: Some(trampoline_notify),
            perm: Some(trampoline_perm),
        };
        let options = projfs_sys::projfs_options {
            initialize_storage_root: initialize_storage_root as c_int,
        };

        let raw = unsafe {
            projfs_sys::projfs_new(
                storage_root_c.as_ptr(),
                virt_root_c.as_ptr(),
                &handlers,
                ctx as *mut c_void,
                &options,
            )
        };

        if raw.is_null() {
            // SAFETY: ctx was allocated above and never shared beyond this function on this path.
            drop(unsafe { Box::from_raw(ctx) });
            return Err(ProjFsError::Session(format!(
                "projfs_new failed for {}",
                virt_root
            )));
        }

        // SAFETY: ctx is still solely owned here; raw has not been handed to any other thread yet.
        unsafe { &*ctx }
            .session_ptr
            .store(raw, Ordering::Release);

        tracing::debug!(storage_root, virt_root, "projection session constructed");
        Ok(Session { ptr: raw, ctx })
    }

    pub fn start(&self, pool_threads: i32) -> ProjFsResult<()> {
        let rc = unsafe { projfs_sys::projfs_start(self.ptr, pool_threads) };
        if rc != 0 {
            return Err(ProjFsError::Session(format!(
                "projfs_start failed with code {rc}"
            )));
        }
        tracing::debug!(pool_threads, "projection session started");
        Ok(())
    }

    /// Stops dispatching events, blocking until in-flight handler invocations drain. Idempotent
    /// from the caller's perspective — `Drop` is the only other caller and only runs once.
    pub fn stop(&self) {
        unsafe { projfs_sys::projfs_stop(self.ptr) };
        tracing::debug!("projection session stopped");
    }

    pub fn get_proj_state(&self, relative_path: &str) -> ProjFsResult<(Code, crate::model::ProjectionState)> {
        use crate::model::ProjectionState;

        let c_path = CString::new(relative_path)
            .map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let mut state_out: c_int = 0;
        let rc = unsafe {
            projfs_sys::projfs_get_proj_state(self.ptr, c_path.as_ptr(), &mut state_out)
        };

        let code = Code::from_errno(rc.unsigned_abs() as i32);
        let state = match state_out {
            projfs_sys::PROJFS_STATE_PLACEHOLDER => ProjectionState::Placeholder,
            projfs_sys::PROJFS_STATE_FULL => ProjectionState::Full,
            _ => ProjectionState::Unknown,
        };
        Ok((code, state))
    }

    pub fn create_proj_dir(&self, relative_path: &str, mode: u32) -> ProjFsResult<Code> {
        let c_path = CString::new(relative_path)
            .map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let rc = unsafe { projfs_sys::projfs_create_proj_dir(self.ptr, c_path.as_ptr(), mode) };
        Ok(Code::from_errno(rc.unsigned_abs() as i32))
    }

    pub fn create_proj_file(
        &self,
        relative_path: &str,
        size: u64,
        mode: u32,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
    ) -> ProjFsResult<Code> {
        let c_path = CString::new(relative_path)
            .map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let rc = unsafe {
            projfs_sys::projfs_create_proj_file(
                self.ptr,
                c_path.as_ptr(),
                size,
                mode,
                provider_id.as_ptr(),
                content_id.as_ptr(),
            )
        };
        Ok(Code::from_errno(rc.unsigned_abs() as i32))
    }

    pub fn create_proj_symlink(&self, relative_path: &str, target: &str) -> ProjFsResult<Code> {
        let c_path = CString::new(relative_path)
            .map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let c_target =
            CString::new(target).map_err(|e| ProjFsError::InvalidArgument(e.to_string()))?;
        let rc = unsafe {
            projfs_sys::projfs_create_proj_symlink(self.ptr, c_path.as_ptr(), c_target.as_ptr())
        };
        Ok(Code::from_errno(rc.unsigned_abs() as i32))
    }
}

impl SessionLiveness for Session {
    fn is_running(&self) -> bool {
        // SAFETY: ctx outlives the session for its entire lifetime.
        unsafe { &*self.ctx }.is_running()
    }
}

impl AttrSource for Session {
    fn get_proj_attrs(&self, relative_path: &str) -> (Code, PlaceholderId, PlaceholderId) {
        // SAFETY: ctx outlives the session for its entire lifetime.
        unsafe { &*self.ctx }.get_proj_attrs(relative_path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        unsafe {
            projfs_sys::projfs_free(self.ptr);
            drop(Box::from_raw(self.ctx));
        }
    }
}

unsafe fn decode_event(event: *const projfs_sys::projfs_event) -> RawEvent {
    let event = unsafe { &*event };
    let path = unsafe { CStr::from_ptr(event.path) }
        .to_string_lossy()
        .into_owned();
    let target_path = if event.target_path.is_null() {
        None
    } else {
        Some(
            unsafe { CStr::from_ptr(event.target_path) }
                .to_string_lossy()
                .into_owned(),
        )
    };
    let pid = event.pid as u32;

    RawEvent {
        mask: event.mask,
        trigger: Trigger {
            pid,
            process_name: process::process_name(pid),
        },
        path,
        target_path,
        fd: event.fd,
    }
}

unsafe extern "C" fn trampoline_proj(
    ctx: *mut c_void,
    event: *const projfs_sys::projfs_event,
) -> c_int {
    let ctx = unsafe { &*(ctx as *const SessionContext) };
    let raw_event = unsafe { decode_event(event) };
    dispatcher::on_demand(ctx.callbacks.as_ref(), ctx.own_pid, ctx, &raw_event)
}

unsafe extern "C" fn trampoline_notify(
    ctx: *mut c_void,
    event: *const projfs_sys::projfs_event,
) -> c_int {
    let ctx = unsafe { &*(ctx as *const SessionContext) };
    let raw_event = unsafe { decode_event(event) };
    dispatcher::on_notify(ctx.callbacks.as_ref(), ctx.own_pid, ctx, &raw_event)
}

unsafe extern "C" fn trampoline_perm(
    ctx: *mut c_void,
    event: *const projfs_sys::projfs_event,
) -> c_int {
    let ctx = unsafe { &*(ctx as *const SessionContext) };
    let raw_event = unsafe { decode_event(event) };
    dispatcher::on_permission(ctx.callbacks.as_ref(), ctx.own_pid, ctx, &raw_event)
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Session>;
};
