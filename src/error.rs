//! Launcher-specific error encoding.

/// A result with a launcher-specific error.
pub type ServiceResult<T = ()> = Result<T, ServiceError>;

/// A generic error class which encodes all possible ways startup and
/// supervision of the proxy can fail, along with operator-facing detail.
#[derive(Clone, Debug)]
pub enum ServiceError {
    MalformedListenAddr(String),
    LimitQuery(String),
    LimitSet(String),
    LoadConfigFailure(String),
    InsufficientParams(String),
    ServerExitUnexpectedly(String),
    ServerAborted(String),
}

impl ServiceError {
    /// The corresponding `sysexits::ExitCode` for this error.
    pub fn exit_code(&self) -> sysexits::ExitCode {
        match self {
            Self::MalformedListenAddr(_) | Self::InsufficientParams(_) => sysexits::ExitCode::Usage,
            Self::LoadConfigFailure(_) => sysexits::ExitCode::Config,
            Self::LimitQuery(_) | Self::LimitSet(_) => sysexits::ExitCode::OsErr,
            Self::ServerExitUnexpectedly(_) | Self::ServerAborted(_) => sysexits::ExitCode::Software,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedListenAddr(msg)
            | Self::LimitQuery(msg)
            | Self::LimitSet(msg)
            | Self::LoadConfigFailure(msg)
            | Self::InsufficientParams(msg)
            | Self::ServerExitUnexpectedly(msg)
            | Self::ServerAborted(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}
