//! Raw C ABI of `libprojfs`, the projection driver's userspace companion library.
//!
//! This crate is a thin, unsafe declaration layer only — no logic lives here. The shape mirrors
//! the low-level FUSE/ProjFS session APIs: an opaque session handle returned by a constructor, a
//! struct of callback function pointers registered once at construction, and a `projfs_event`
//! struct describing each kernel-delivered event. `projfs-core` is the safe wrapper built on top.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void, mode_t, pid_t};

/// Opaque handle to a live projection session. Never constructed or inspected from Rust; only
/// passed back into the other `projfs_*` entry points.
#[repr(C)]
pub struct projfs_session {
    _private: [u8; 0],
}

/// Event mask bits, matching the driver's wire protocol.
pub const PROJFS_ONDIR: u32 = 1 << 0;
pub const PROJFS_ONLINK: u32 = 1 << 1;
pub const PROJFS_CREATE: u32 = 1 << 2;
pub const PROJFS_DELETE: u32 = 1 << 3;
pub const PROJFS_MOVE: u32 = 1 << 4;
pub const PROJFS_CLOSE_WRITE: u32 = 1 << 5;
pub const PROJFS_OPEN_PERM: u32 = 1 << 6;
pub const PROJFS_DELETE_PERM: u32 = 1 << 7;
pub const PROJFS_MOVE_PERM: u32 = 1 << 8;

/// Permission-event responses.
pub const PROJFS_ALLOW: c_int = 0;
pub const PROJFS_DENY: c_int = 1;

/// Projection states as reported by `projfs_get_proj_state`.
pub const PROJFS_STATE_UNKNOWN: c_int = 0;
pub const PROJFS_STATE_PLACEHOLDER: c_int = 1;
pub const PROJFS_STATE_FULL: c_int = 2;

/// Fixed width of the two opaque placeholder identifiers.
pub const PROJFS_ID_LEN: usize = 128;

/// One kernel-delivered event, valid only for the duration of the callback invocation.
#[repr(C)]
pub struct projfs_event {
    pub mask: u32,
    pub pid: pid_t,
    /// NUL-terminated, relative to the virtualization root.
    pub path: *const c_char,
    /// NUL-terminated; null unless the event carries a rename/link destination.
    pub target_path: *const c_char,
    /// Valid only for projection events; the driver owns and closes this descriptor.
    pub fd: c_int,
}

pub type projfs_proj_handler =
    unsafe extern "C" fn(ctx: *mut c_void, event: *const projfs_event) -> c_int;
pub type projfs_notify_handler =
    unsafe extern "C" fn(ctx: *mut c_void, event: *const projfs_event) -> c_int;
pub type projfs_perm_handler =
    unsafe extern "C" fn(ctx: *mut c_void, event: *const projfs_event) -> c_int;

#[repr(C)]
pub struct projfs_handlers {
    pub proj: Option<projfs_proj_handler>,
    pub notify: Option<projfs_notify_handler>,
    pub perm: Option<projfs_perm_handler>,
}

#[repr(C)]
pub struct projfs_options {
    pub initialize_storage_root: c_int,
}

unsafe extern "C" {
    /// Allocates a new session bound to `storage_root`/`virt_root`. `ctx` is an opaque
    /// instance-context pointer handed back unmodified on every callback invocation. Returns
    /// null on construction failure.
    pub fn projfs_new(
        storage_root: *const c_char,
        virt_root: *const c_char,
        handlers: *const projfs_handlers,
        ctx: *mut c_void,
        options: *const projfs_options,
    ) -> *mut projfs_session;

    /// Starts dispatching events on `pool_threads` driver-owned worker threads. Non-zero return
    /// indicates failure; the session must still be passed to `projfs_stop`/`projfs_free`.
    pub fn projfs_start(session: *mut projfs_session, pool_threads: c_int) -> c_int;

    /// Stops dispatching events, blocking until in-flight handler invocations drain.
    pub fn projfs_stop(session: *mut projfs_session);

    /// Releases all resources held by `session`. Must not be called while the session is running.
    pub fn projfs_free(session: *mut projfs_session);

    pub fn projfs_get_proj_state(
        session: *mut projfs_session,
        relative_path: *const c_char,
        state_out: *mut c_int,
    ) -> c_int;

    pub fn projfs_get_proj_attrs(
        session: *mut projfs_session,
        relative_path: *const c_char,
        provider_id_out: *mut u8,
        content_id_out: *mut u8,
    ) -> c_int;

    pub fn projfs_create_proj_dir(
        session: *mut projfs_session,
        relative_path: *const c_char,
        mode: mode_t,
    ) -> c_int;

    pub fn projfs_create_proj_file(
        session: *mut projfs_session,
        relative_path: *const c_char,
        size: u64,
        mode: mode_t,
        provider_id: *const u8,
        content_id: *const u8,
    ) -> c_int;

    pub fn projfs_create_proj_symlink(
        session: *mut projfs_session,
        relative_path: *const c_char,
        target: *const c_char,
    ) -> c_int;
}
