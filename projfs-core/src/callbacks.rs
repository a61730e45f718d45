//! Provider callback surface.
//!
//! The driver's event protocol has room for independent callback slots per event kind; this
//! crate models all of them as methods of one trait with default bodies rather than as
//! independently-nilable function pointers (see DESIGN.md, Open Question 1). A provider
//! implements only the methods it cares about; the rest keep their spec-mandated default.

use crate::error::Code;
use crate::model::{PlaceholderId, Trigger};
use std::os::unix::io::RawFd;

/// Everything a provider plugs in to answer demand events and observe mutations.
///
/// Result-returning methods default to [`Code::NotYetImplemented`]; void notification methods
/// default to a no-op.
pub trait ProviderCallbacks: Send + Sync {
    /// Directory contents are being enumerated under `path` (the virtualization root is the
    /// empty string).
    fn enumerate_directory(&self, path: &str, trigger: &Trigger) -> Code {
        let _ = (path, trigger);
        Code::NotYetImplemented
    }

    /// A placeholder file's bytes are being demanded. `fd` is borrowed; use
    /// [`crate::writer::try_write`] to populate it and do not close it.
    fn get_file_stream(
        &self,
        path: &str,
        provider_id: &PlaceholderId,
        content_id: &PlaceholderId,
        trigger: &Trigger,
        fd: RawFd,
    ) -> Code {
        let _ = (path, provider_id, content_id, trigger, fd);
        Code::NotYetImplemented
    }

    fn pre_delete(&self, path: &str, is_directory: bool) -> Code {
        let _ = (path, is_directory);
        Code::NotYetImplemented
    }

    fn pre_rename(&self, path: &str, destination: &str, is_directory: bool) -> Code {
        let _ = (path, destination, is_directory);
        Code::NotYetImplemented
    }

    fn pre_convert_to_full(&self, path: &str) -> Code {
        let _ = path;
        Code::NotYetImplemented
    }

    fn file_modified(&self, path: &str) {
        let _ = path;
    }

    fn new_file_created(&self, path: &str, is_directory: bool) {
        let _ = (path, is_directory);
    }

    fn file_deleted(&self, path: &str, is_directory: bool) {
        let _ = (path, is_directory);
    }

    fn file_renamed(&self, path: &str, destination: &str, is_directory: bool) {
        let _ = (path, destination, is_directory);
    }

    fn hard_link_created(&self, path: &str, destination: &str) {
        let _ = (path, destination);
    }
}
