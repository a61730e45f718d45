//! Shared data model: placeholder identity, projection state, event shapes.

/// Width in bytes of both placeholder identifiers. Not negotiable — see
/// [`crate::placeholder::write_placeholder_file`].
pub const ID_LEN: usize = 128;

/// An opaque, provider-defined 128-byte placeholder identifier.
pub type PlaceholderId = [u8; ID_LEN];

/// Projection state of a path as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionState {
    /// The driver cannot classify the entry (sockets, devices, and similar non-regular files).
    Unknown,
    /// Bytes have not yet been hydrated.
    Placeholder,
    /// Bytes exist in the backing store; no longer under projection.
    Full,
}

/// Information about the process that triggered an event.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub pid: u32,
    /// Best-effort; empty if unavailable. See [`crate::process::process_name`].
    pub process_name: String,
}

/// Raw event delivered by the driver, already decoded from the wire struct but not yet
/// classified into a [`NotificationType`].
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub mask: u32,
    pub trigger: Trigger,
    pub path: String,
    pub target_path: Option<String>,
    /// Valid only for projection events; `-1` otherwise. The driver owns and closes this
    /// descriptor once the handler returns.
    pub fd: std::os::unix::io::RawFd,
}

/// Mask bits, re-exported from `projfs-sys` under names matching this crate's vocabulary.
pub mod mask {
    pub const ONDIR: u32 = projfs_sys::PROJFS_ONDIR;
    pub const ONLINK: u32 = projfs_sys::PROJFS_ONLINK;
    pub const CREATE: u32 = projfs_sys::PROJFS_CREATE;
    pub const DELETE: u32 = projfs_sys::PROJFS_DELETE;
    pub const MOVE: u32 = projfs_sys::PROJFS_MOVE;
    pub const CLOSE_WRITE: u32 = projfs_sys::PROJFS_CLOSE_WRITE;
    pub const OPEN_PERM: u32 = projfs_sys::PROJFS_OPEN_PERM;
    pub const DELETE_PERM: u32 = projfs_sys::PROJFS_DELETE_PERM;
    pub const MOVE_PERM: u32 = projfs_sys::PROJFS_MOVE_PERM;
}

/// Notification/permission event classification, in dispatch priority order (see
/// [`NotificationType::classify`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    PreDelete,
    PreRename,
    PreConvertToFull,
    FileModified,
    NewFileCreated,
    FileDeleted,
    FileRenamed,
    HardLinkCreated,
}

impl NotificationType {
    /// Decodes a mask into a notification type using first-match-wins priority. Returns `None`
    /// for masks that carry no classification the provider needs to see.
    pub fn classify(m: u32) -> Option<NotificationType> {
        if m & mask::DELETE_PERM != 0 {
            Some(NotificationType::PreDelete)
        } else if m & mask::MOVE_PERM != 0 {
            Some(NotificationType::PreRename)
        } else if m & mask::CLOSE_WRITE != 0 {
            Some(NotificationType::FileModified)
        } else if m & mask::CREATE != 0 && m & mask::ONLINK == 0 {
            Some(NotificationType::NewFileCreated)
        } else if m & mask::MOVE != 0 {
            Some(NotificationType::FileRenamed)
        } else if m & mask::CREATE != 0 && m & mask::ONLINK != 0 {
            Some(NotificationType::HardLinkCreated)
        } else if m & mask::DELETE != 0 {
            Some(NotificationType::FileDeleted)
        } else if m & mask::OPEN_PERM != 0 {
            Some(NotificationType::PreConvertToFull)
        } else {
            None
        }
    }
}
