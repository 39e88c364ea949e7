//! System related APIs

use std::io;

use log::{debug, trace};

use crate::error::{ServiceError, ServiceResult};

/// Soft limit target on the darwin family, which keeps an artificially low
/// `RLIMIT_NOFILE` default for compatibility with code that uses select and
/// its hard-coded maximum file descriptor (limited by the size of fd_set).
///
/// http://0pointer.net/blog/file-descriptor-limits.html
pub const NOFILE_TARGET_DARWIN: u64 = 10_240;

/// Soft limit target everywhere else. Raising the hard limit this far
/// requires CAP_SYS_RESOURCE.
pub const NOFILE_TARGET_DEFAULT: u64 = 60_000;

/// A soft/hard pair for the "max open files" resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NofileLimit {
    /// Soft limit, the enforced ceiling
    pub cur: u64,
    /// Hard limit, the most the soft limit may be raised to unprivileged
    pub max: u64,
}

/// Access to the process resource-limit table.
///
/// The real table is process-global OS state mutated once during startup;
/// routing through this trait keeps the raise policy testable against a
/// fake table.
pub trait NofileTable {
    fn get_nofile(&mut self) -> io::Result<NofileLimit>;
    fn set_nofile(&mut self, limit: NofileLimit) -> io::Result<()>;
}

/// Outcome of a raise attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NofileStatus {
    /// The soft limit already met the target, nothing was written
    Unchanged(NofileLimit),
    /// The limits were updated to the contained pair
    Raised(NofileLimit),
}

/// Soft limit target for the platform named by `os`
/// (in `std::env::consts::OS` terms)
pub fn nofile_target(os: &str) -> u64 {
    match os {
        "macos" | "ios" | "tvos" | "watchos" => NOFILE_TARGET_DARWIN,
        _ => NOFILE_TARGET_DEFAULT,
    }
}

/// Raise the soft "max open files" limit in `table` up to `target`.
///
/// The soft limit is only ever raised, never lowered, and never set above
/// the hard limit. A hard limit below the target is raised first; if the OS
/// refuses (no CAP_SYS_RESOURCE), the soft limit is capped at the existing
/// hard limit instead.
///
/// A failing query or a rejected update is fatal: the server must not start
/// with an unknown or unverified descriptor budget.
pub fn raise_nofile<T: NofileTable>(table: &mut T, target: u64) -> ServiceResult<NofileStatus> {
    let lim = table
        .get_nofile()
        .map_err(|err| ServiceError::LimitQuery(format!("getrlimit NOFILE failed, {err}")))?;

    if lim.cur >= target {
        trace!("rlimit NOFILE {lim:?} already meets target {target}");
        return Ok(NofileStatus::Unchanged(lim));
    }

    if lim.max < target {
        let raised = NofileLimit {
            cur: target,
            max: target,
        };
        if table.set_nofile(raised).is_ok() {
            debug!("rlimit NOFILE adjusted {raised:?}");
            return Ok(NofileStatus::Raised(raised));
        }

        // The hard cap stays where it is, the soft limit can still reach it.
        let capped = NofileLimit {
            cur: lim.max,
            max: lim.max,
        };
        table
            .set_nofile(capped)
            .map_err(|err| ServiceError::LimitSet(format!("setrlimit NOFILE {capped:?} failed, {err}")))?;
        debug!("rlimit NOFILE adjusted {capped:?}, raising the hard limit was refused");
        return Ok(NofileStatus::Raised(capped));
    }

    let raised = NofileLimit {
        cur: target,
        max: lim.max,
    };
    table
        .set_nofile(raised)
        .map_err(|err| ServiceError::LimitSet(format!("setrlimit NOFILE {raised:?} failed, {err}")))?;
    debug!("rlimit NOFILE adjusted {raised:?}");
    Ok(NofileStatus::Raised(raised))
}

#[cfg(all(unix, not(target_os = "android")))]
mod os {
    use std::{io, mem};

    use super::{NofileLimit, NofileTable};

    /// The real process limit table
    pub struct OsNofileTable;

    impl NofileTable for OsNofileTable {
        fn get_nofile(&mut self) -> io::Result<NofileLimit> {
            unsafe {
                let mut lim: libc::rlimit = mem::zeroed();
                if libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) < 0 {
                    return Err(io::Error::last_os_error());
                }

                Ok(NofileLimit {
                    cur: lim.rlim_cur as u64,
                    max: lim.rlim_max as u64,
                })
            }
        }

        fn set_nofile(&mut self, limit: NofileLimit) -> io::Result<()> {
            let lim = libc::rlimit {
                rlim_cur: limit.cur as libc::rlim_t,
                rlim_max: limit.max as libc::rlim_t,
            };

            unsafe {
                if libc::setrlimit(libc::RLIMIT_NOFILE, &lim) < 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            Ok(())
        }
    }
}

#[cfg(all(unix, not(target_os = "android")))]
pub use self::os::OsNofileTable;

/// Raise the process file-descriptor ceiling before the listener starts.
///
/// `explicit` substitutes an operator-provided target (`--nofile`) for the
/// platform default.
#[cfg(all(unix, not(target_os = "android")))]
pub fn adjust_nofile(explicit: Option<u64>) -> ServiceResult<NofileStatus> {
    let target = explicit.unwrap_or_else(|| nofile_target(std::env::consts::OS));
    raise_nofile(&mut OsNofileTable, target)
}
