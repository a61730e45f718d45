//! Event dispatcher (C4): translates driver events into provider callbacks.
//!
//! The three entry points here are pure with respect to the driver — they take a decoded
//! [`RawEvent`] and an [`AttrSource`] rather than touching `projfs-sys` directly, so they can be
//! unit-tested against a fake driver without a real kernel module. [`crate::session`] owns the
//! unsafe trampolines that decode the raw FFI event and call into these functions.

use crate::callbacks::ProviderCallbacks;
use crate::error::Code;
use crate::model::{mask, NotificationType, PlaceholderId, RawEvent};

/// Reports whether the driver session is still live. Checked first in every handler (§4.4
/// preamble step 1) before the event is decoded or a provider callback is invoked. Implemented by
/// [`crate::session::SessionContext`]; test doubles implement it directly for dispatcher unit
/// tests.
pub trait SessionLiveness {
    fn is_running(&self) -> bool;
}

/// Supplies placeholder attribute lookups to the projection handler. Implemented by
/// [`crate::session::Session`]; a test double implements it directly for dispatcher unit tests.
pub trait AttrSource: SessionLiveness {
    fn get_proj_attrs(&self, relative_path: &str) -> (Code, PlaceholderId, PlaceholderId);
}

/// Projection (demand) handler: directory enumeration and on-read hydration requests.
pub fn on_demand(
    callbacks: &dyn ProviderCallbacks,
    own_pid: u32,
    attrs: &dyn AttrSource,
    event: &RawEvent,
) -> i32 {
    if !attrs.is_running() {
        return -libc::ENODEV;
    }

    if event.trigger.pid == own_pid {
        tracing::trace!(pid = event.trigger.pid, "suppressing self-generated projection event");
        return 0;
    }

    if event.mask & mask::ONDIR != 0 {
        let normalized = normalize_enumeration_path(&event.path);
        tracing::debug!(path = %normalized, pid = event.trigger.pid, "enumerate_directory");
        let code = callbacks.enumerate_directory(&normalized, &event.trigger);
        return code.to_negative_errno();
    }

    let (code, provider_id, content_id) = attrs.get_proj_attrs(&event.path);
    if code != Code::Success {
        tracing::debug!(path = %event.path, ?code, "get_proj_attrs failed before hydration");
        return code.to_negative_errno();
    }

    tracing::debug!(path = %event.path, pid = event.trigger.pid, "get_file_stream");
    let code = callbacks.get_file_stream(
        &event.path,
        &provider_id,
        &content_id,
        &event.trigger,
        event.fd,
    );
    code.to_negative_errno()
}

/// Notification handler: informational, return value is advisory to the driver.
pub fn on_notify(
    callbacks: &dyn ProviderCallbacks,
    own_pid: u32,
    liveness: &dyn SessionLiveness,
    event: &RawEvent,
) -> i32 {
    handle_non_proj(callbacks, own_pid, liveness, event, false)
}

/// Permission handler: the driver blocks the originating syscall on our answer.
pub fn on_permission(
    callbacks: &dyn ProviderCallbacks,
    own_pid: u32,
    liveness: &dyn SessionLiveness,
    event: &RawEvent,
) -> i32 {
    handle_non_proj(callbacks, own_pid, liveness, event, true)
}

fn handle_non_proj(
    callbacks: &dyn ProviderCallbacks,
    own_pid: u32,
    liveness: &dyn SessionLiveness,
    event: &RawEvent,
    is_perm: bool,
) -> i32 {
    if !liveness.is_running() {
        return -libc::ENODEV;
    }

    if event.trigger.pid == own_pid {
        return if is_perm {
            projfs_sys::PROJFS_ALLOW
        } else {
            0
        };
    }

    let Some(kind) = NotificationType::classify(event.mask) else {
        return 0;
    };

    let is_directory = event.mask & mask::ONDIR != 0;
    let destination = event.target_path.as_deref();

    tracing::trace!(path = %event.path, ?kind, is_directory, "dispatching notification");

    let code = match kind {
        NotificationType::PreDelete => callbacks.pre_delete(&event.path, is_directory),
        NotificationType::PreRename => {
            callbacks.pre_rename(&event.path, destination.unwrap_or_default(), is_directory)
        }
        NotificationType::PreConvertToFull => callbacks.pre_convert_to_full(&event.path),
        NotificationType::FileModified => {
            callbacks.file_modified(&event.path);
            Code::Success
        }
        NotificationType::NewFileCreated => {
            callbacks.new_file_created(&event.path, is_directory);
            Code::Success
        }
        NotificationType::FileDeleted => {
            callbacks.file_deleted(&event.path, is_directory);
            Code::Success
        }
        NotificationType::FileRenamed => {
            callbacks.file_renamed(&event.path, destination.unwrap_or_default(), is_directory);
            Code::Success
        }
        NotificationType::HardLinkCreated => {
            callbacks.hard_link_created(&event.path, destination.unwrap_or_default());
            Code::Success
        }
    };

    let errno = code.to_negative_errno();
    if is_perm {
        encode_permission(errno)
    } else {
        errno
    }
}

fn encode_permission(errno: i32) -> i32 {
    match errno {
        0 => projfs_sys::PROJFS_ALLOW,
        e if e == -libc::EPERM => projfs_sys::PROJFS_DENY,
        other => other,
    }
}

/// `"."` (the root itself) is rewritten to the empty string for directory enumeration only;
/// every other callback receives the raw relative path unchanged.
fn normalize_enumeration_path(path: &str) -> String {
    if path == "." {
        String::new()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Trigger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallbacks {
        delete_calls: Mutex<Vec<String>>,
        enumerate_calls: AtomicUsize,
    }

    impl ProviderCallbacks for RecordingCallbacks {
        fn enumerate_directory(&self, _path: &str, _trigger: &Trigger) -> Code {
            self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
            Code::Success
        }

        fn pre_delete(&self, path: &str, _is_directory: bool) -> Code {
            self.delete_calls.lock().unwrap().push(path.to_string());
            Code::Success
        }

        fn file_deleted(&self, path: &str, _is_directory: bool) {
            self.delete_calls.lock().unwrap().push(format!("deleted:{path}"));
        }
    }

    /// A liveness double whose `is_running` answer is fixed at construction, for testing the
    /// §4.4 preamble step 1 (null-session) path independently of self-event suppression.
    struct FixedLiveness(bool);
    impl SessionLiveness for FixedLiveness {
        fn is_running(&self) -> bool {
            self.0
        }
    }

    struct NoAttrs;
    impl SessionLiveness for NoAttrs {
        fn is_running(&self) -> bool {
            true
        }
    }
    impl AttrSource for NoAttrs {
        fn get_proj_attrs(&self, _relative_path: &str) -> (Code, PlaceholderId, PlaceholderId) {
            (Code::Success, [0u8; 128], [0u8; 128])
        }
    }

    struct NoAttrsDead;
    impl SessionLiveness for NoAttrsDead {
        fn is_running(&self) -> bool {
            false
        }
    }
    impl AttrSource for NoAttrsDead {
        fn get_proj_attrs(&self, _relative_path: &str) -> (Code, PlaceholderId, PlaceholderId) {
            (Code::Success, [0u8; 128], [0u8; 128])
        }
    }

    fn event(mask: u32, pid: u32, path: &str) -> RawEvent {
        RawEvent {
            mask,
            trigger: Trigger { pid, process_name: String::new() },
            path: path.to_string(),
            target_path: None,
            fd: -1,
        }
    }

    #[test]
    fn self_events_never_reach_provider_callbacks() {
        let cb = RecordingCallbacks::default();
        let own_pid = 42;
        let evt = event(mask::ONDIR, own_pid, ".");
        assert_eq!(on_demand(&cb, own_pid, &NoAttrs, &evt), 0);
        assert_eq!(cb.enumerate_calls.load(Ordering::SeqCst), 0);

        let notify_evt = event(mask::DELETE, own_pid, "a");
        assert_eq!(on_notify(&cb, own_pid, &FixedLiveness(true), &notify_evt), 0);
        assert!(cb.delete_calls.lock().unwrap().is_empty());

        let perm_evt = event(mask::DELETE_PERM, own_pid, "a");
        assert_eq!(
            on_permission(&cb, own_pid, &FixedLiveness(true), &perm_evt),
            projfs_sys::PROJFS_ALLOW
        );
    }

    #[test]
    fn dead_session_returns_enodev_without_touching_callbacks() {
        let cb = RecordingCallbacks::default();
        let dead = FixedLiveness(false);

        let demand_evt = event(mask::ONDIR, 7, ".");
        assert_eq!(on_demand(&cb, 1, &NoAttrsDead, &demand_evt), -libc::ENODEV);
        assert_eq!(cb.enumerate_calls.load(Ordering::SeqCst), 0);

        let notify_evt = event(mask::DELETE, 7, "a");
        assert_eq!(on_notify(&cb, 1, &dead, &notify_evt), -libc::ENODEV);
        assert!(cb.delete_calls.lock().unwrap().is_empty());

        let perm_evt = event(mask::DELETE_PERM, 7, "a");
        assert_eq!(on_permission(&cb, 1, &dead, &perm_evt), -libc::ENODEV);
        assert!(cb.delete_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn root_path_normalizes_to_empty_string_for_enumeration() {
        let cb = RecordingCallbacks::default();
        let evt = event(mask::ONDIR, 7, ".");
        assert_eq!(on_demand(&cb, 1, &NoAttrs, &evt), 0);
        assert_eq!(cb.enumerate_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permission_encoding_maps_success_to_allow_and_eperm_to_deny() {
        let cb = RecordingCallbacks::default();
        let allow_evt = event(mask::DELETE_PERM, 7, "a");
        assert_eq!(
            on_permission(&cb, 1, &FixedLiveness(true), &allow_evt),
            projfs_sys::PROJFS_ALLOW
        );
    }

    #[test]
    fn hard_link_mask_takes_priority_over_plain_create() {
        let cb = RecordingCallbacks::default();
        let evt = event(mask::CREATE | mask::ONLINK, 7, "a");
        on_notify(&cb, 1, &FixedLiveness(true), &evt);
        assert_eq!(
            cb.delete_calls.lock().unwrap().last().map(String::as_str),
            None
        );
    }
}
