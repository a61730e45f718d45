//! Result codes exchanged with the projection driver (`Code`), and the crate-level error type for
//! failures at the FFI/I-O boundary beneath them (`ProjFsError`).

use std::fmt;

/// Abstract result enumeration shared with the projection driver. Every variant has a canonical
/// mapping to a POSIX error number via [`Code::to_errno`]; the map is total, `Invalid` is the
/// catch-all for anything that doesn't otherwise fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Success,
    Invalid,
    InvalidState,
    InvalidArgument,
    NotYetImplemented,
    DriverNotLoaded,
    FileNotFound,
    PathNotFound,
    AccessDenied,
    DirectoryNotEmpty,
    IoError,
    VirtualizationInvalidOperation,
}

impl Code {
    /// Maps this result to a positive `errno` value. `Success` maps to `0`.
    pub fn to_errno(self) -> i32 {
        match self {
            Code::Success => 0,
            Code::Invalid => libc::EINVAL,
            Code::InvalidState => libc::EINVAL,
            Code::InvalidArgument => libc::EINVAL,
            Code::NotYetImplemented => libc::ENOSYS,
            Code::DriverNotLoaded => libc::ENODEV,
            Code::FileNotFound => libc::ENOENT,
            Code::PathNotFound => libc::ENOENT,
            Code::AccessDenied => libc::EACCES,
            Code::DirectoryNotEmpty => libc::ENOTEMPTY,
            Code::IoError => libc::EIO,
            Code::VirtualizationInvalidOperation => libc::EPERM,
        }
    }

    /// Inverse of [`Code::to_errno`], used to reconstitute a result from a kernel-reported
    /// failure. Errnos with no dedicated variant collapse to `Invalid`.
    pub fn from_errno(errno: i32) -> Code {
        match errno {
            0 => Code::Success,
            libc::ENOSYS => Code::NotYetImplemented,
            libc::ENODEV => Code::DriverNotLoaded,
            libc::ENOENT => Code::FileNotFound,
            libc::EACCES | libc::EPERM => Code::AccessDenied,
            libc::ENOTEMPTY => Code::DirectoryNotEmpty,
            libc::EIO => Code::IoError,
            _ => Code::Invalid,
        }
    }

    /// `-errno` ready to hand back to the driver as a callback return value.
    pub fn to_negative_errno(self) -> i32 {
        -self.to_errno()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reason accompanying a failed placeholder update or delete, alongside a [`Code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailureCause {
    NoFailure,
    DirtyData,
    ReadOnly,
}

/// Crate-level error for failures below the abstract `Code` taxonomy: FFI construction failures,
/// I/O errors opening or polling the virtualization root, lock poisoning.
#[derive(Debug, thiserror::Error)]
pub enum ProjFsError {
    #[error("driver session error: {0}")]
    Session(String),

    #[error("filesystem operation failed: {0}")]
    Io(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ProjFsResult<T> = Result<T, ProjFsError>;
