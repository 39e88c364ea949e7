//! This is a mod for storing and parsing configuration
//!
//! Everything can be set from command line parameters, but the same keys are
//! also accepted from a JSON5 configuration file passed with `-c`:
//!
//! ```json5
//! {
//!     listen: "0.0.0.0:1080",
//!     server_ip: "203.0.113.9",
//!     username: "user",
//!     password: "pass",
//!     udp_timeout: 60,
//!     log: {
//!         level: 1,
//!     },
//! }
//! ```
//!
//! Command line parameters always take precedence over file values.

use std::{
    fmt::{self, Debug, Display, Formatter},
    fs::OpenOptions,
    io::Read,
    net::IpAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use cfg_if::cfg_if;
use clap::ArgMatches;
use serde::Deserialize;

/// Default deadline for UDP associations
pub const DEFAULT_UDP_TIMEOUT: Duration = Duration::from_secs(60);

/// Listen address of the SOCKS5 server, `host:port` where the host part may
/// be empty (bind all interfaces, e.g. `:1080`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenAddr {
    host: String,
    port: u16,
}

impl ListenAddr {
    pub fn new<H: Into<String>>(host: H, port: u16) -> ListenAddr {
        ListenAddr {
            host: host.into(),
            port,
        }
    }

    /// The host part as written, possibly empty
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address to hand to the TCP listener. An empty host binds all
    /// interfaces, which `ToSocketAddrs` cannot express as `:port`.
    pub fn bind_addr(&self) -> String {
        if self.host.is_empty() {
            format!("0.0.0.0:{}", self.port)
        } else {
            self.to_string()
        }
    }
}

/// Parse `ListenAddr` error
#[derive(Debug)]
pub struct ListenAddrError;

impl Display for ListenAddrError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("malformed listen address")
    }
}

impl std::error::Error for ListenAddrError {}

impl FromStr for ListenAddr {
    type Err = ListenAddrError;

    fn from_str(s: &str) -> Result<ListenAddr, ListenAddrError> {
        let (host, port) = match s.rfind(':') {
            Some(idx) => (&s[..idx], &s[idx + 1..]),
            None => return Err(ListenAddrError),
        };

        let host = if let Some(stripped) = host.strip_prefix('[') {
            // bracketed IPv6 host, [::1]:1080
            stripped.strip_suffix(']').ok_or(ListenAddrError)?
        } else {
            if host.contains(':') {
                return Err(ListenAddrError);
            }
            host
        };

        let port = port.parse::<u16>().map_err(|_| ListenAddrError)?;

        Ok(ListenAddr {
            host: host.to_owned(),
            port,
        })
    }
}

impl Display for ListenAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    /// Verbosity level, `0` logs info and above
    pub level: u32,
    /// Output format
    pub format: LogFormatConfig,
    /// log4rs configuration file
    pub config_path: Option<PathBuf>,
}

/// Logging output format configuration
#[derive(Clone, Debug, Default)]
pub struct LogFormatConfig {
    /// Suppress the datetime prefix
    pub without_time: bool,
}

/// Runtime mode (Tokio)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeMode {
    /// Single-Thread Runtime
    SingleThread,
    /// Multi-Thread Runtime
    #[cfg(feature = "multi-threaded")]
    MultiThread,
}

impl Default for RuntimeMode {
    fn default() -> RuntimeMode {
        cfg_if! {
            if #[cfg(feature = "multi-threaded")] {
                RuntimeMode::MultiThread
            } else {
                RuntimeMode::SingleThread
            }
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<RuntimeMode, Self::Err> {
        match s {
            "single_thread" => Ok(RuntimeMode::SingleThread),
            #[cfg(feature = "multi-threaded")]
            "multi_thread" => Ok(RuntimeMode::MultiThread),
            _ => Err(()),
        }
    }
}

/// Runtime configuration
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// Runtime mode
    pub mode: RuntimeMode,
    /// Worker count, the runtime's default when unset
    pub worker_count: Option<usize>,
}

/// Configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the SOCKS5 listener binds to
    pub listen: ListenAddr,
    /// Explicit override for the IP advertised in UDP ASSOCIATE replies
    pub server_ip: Option<IpAddr>,
    /// Username for RFC 1929 authentication
    pub username: Option<String>,
    /// Password for RFC 1929 authentication
    pub password: Option<String>,
    /// TCP deadline, `None` disables it
    pub tcp_timeout: Option<Duration>,
    /// UDP association deadline
    pub udp_timeout: Duration,
    /// Restrict UDP associations to the connecting client's address
    pub limit_udp: bool,
    /// Explicit `RLIMIT_NOFILE` target
    #[cfg(all(unix, not(target_os = "android")))]
    pub nofile: Option<u64>,
    /// Logging configuration
    pub log: LogConfig,
    /// Runtime configuration
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen: ListenAddr::new("0.0.0.0", 1080),
            server_ip: None,
            username: None,
            password: None,
            tcp_timeout: None,
            udp_timeout: DEFAULT_UDP_TIMEOUT,
            limit_udp: false,
            #[cfg(all(unix, not(target_os = "android")))]
            nofile: None,
            log: LogConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Raw configuration file content
#[derive(Deserialize, Debug, Default)]
struct SvcConfig {
    listen: Option<String>,
    server_ip: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tcp_timeout: Option<u64>,
    udp_timeout: Option<u64>,
    limit_udp: Option<bool>,
    #[cfg(all(unix, not(target_os = "android")))]
    nofile: Option<u64>,
    log: Option<SvcLogConfig>,
    runtime: Option<SvcRuntimeConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct SvcLogConfig {
    level: Option<u32>,
    format: Option<SvcLogFormat>,
    config_path: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SvcLogFormat {
    without_time: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct SvcRuntimeConfig {
    mode: Option<String>,
    worker_count: Option<usize>,
}

/// Configuration parsing error kind
#[derive(Copy, Clone, Debug)]
pub enum ErrorKind {
    /// Missing required fields
    MissingField,
    /// Missing some keys that must be provided together
    Malformed,
    /// Invalid value of some configuration keys
    Invalid,
    /// Invalid JSON
    JsonParsingError,
    /// `std::io::Error`
    IoError,
}

/// Configuration parsing error
pub struct Error {
    pub kind: ErrorKind,
    pub desc: &'static str,
    pub detail: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, desc: &'static str, detail: Option<String>) -> Error {
        Error { kind, desc, detail }
    }
}

macro_rules! impl_from {
    ($error:ty, $kind:expr, $desc:expr) => {
        impl From<$error> for Error {
            fn from(err: $error) -> Self {
                Error::new($kind, $desc, Some(format!("{err:?}")))
            }
        }
    };
}

impl_from!(::std::io::Error, ErrorKind::IoError, "error while reading file");
impl_from!(json5::Error, ErrorKind::JsonParsingError, "json parse error");

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.detail {
            None => write!(f, "{}", self.desc),
            Some(ref det) => write!(f, "{} {}", self.desc, det),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.detail {
            None => f.write_str(self.desc),
            Some(ref d) => write!(f, "{}, {}", self.desc, d),
        }
    }
}

impl Config {
    /// Load configuration from a JSON5 string
    pub fn load_from_str(s: &str) -> Result<Config, Error> {
        let raw: SvcConfig = json5::from_str(s)?;
        Config::load_from_raw(raw)
    }

    /// Load configuration from a JSON5 file
    pub fn load_from_file<P: AsRef<Path>>(filename: P) -> Result<Config, Error> {
        let mut reader = OpenOptions::new().read(true).open(filename.as_ref())?;
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        Config::load_from_str(&content)
    }

    fn load_from_raw(raw: SvcConfig) -> Result<Config, Error> {
        let mut config = Config::default();

        if let Some(listen) = raw.listen {
            match listen.parse::<ListenAddr>() {
                Ok(addr) => config.listen = addr,
                Err(..) => {
                    return Err(Error::new(
                        ErrorKind::Invalid,
                        "`listen` should be host:port or :port",
                        Some(listen),
                    ));
                }
            }
        }

        if let Some(server_ip) = raw.server_ip {
            match server_ip.parse::<IpAddr>() {
                Ok(ip) => config.server_ip = Some(ip),
                Err(..) => {
                    return Err(Error::new(
                        ErrorKind::Invalid,
                        "`server_ip` should be an IPv4 or IPv6 address",
                        Some(server_ip),
                    ));
                }
            }
        }

        config.username = raw.username;
        config.password = raw.password;

        if let Some(timeout) = raw.tcp_timeout {
            config.tcp_timeout = match timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }

        if let Some(timeout) = raw.udp_timeout {
            config.udp_timeout = Duration::from_secs(timeout);
        }

        if let Some(limit_udp) = raw.limit_udp {
            config.limit_udp = limit_udp;
        }

        #[cfg(all(unix, not(target_os = "android")))]
        {
            config.nofile = raw.nofile;
        }

        if let Some(log) = raw.log {
            if let Some(level) = log.level {
                config.log.level = level;
            }
            if let Some(format) = log.format {
                if let Some(without_time) = format.without_time {
                    config.log.format.without_time = without_time;
                }
            }
            if let Some(config_path) = log.config_path {
                config.log.config_path = Some(PathBuf::from(config_path));
            }
        }

        if let Some(runtime) = raw.runtime {
            if let Some(mode) = runtime.mode {
                match mode.parse::<RuntimeMode>() {
                    Ok(m) => config.runtime.mode = m,
                    Err(..) => {
                        return Err(Error::new(
                            ErrorKind::Invalid,
                            "`runtime.mode` should be \"single_thread\" or \"multi_thread\"",
                            Some(mode),
                        ));
                    }
                }
            }
            config.runtime.worker_count = runtime.worker_count;
        }

        Ok(config)
    }

    /// Override configuration with command line parameters.
    ///
    /// The listen address is handled by the caller, because an explicitly
    /// empty `--listen` asks for the usage text instead of a value.
    pub fn set_options(&mut self, matches: &ArgMatches) {
        if let Some(ip) = matches.get_one::<IpAddr>("SERVER_IP") {
            self.server_ip = Some(*ip);
        }

        if let Some(username) = matches.get_one::<String>("USERNAME") {
            self.username = Some(username.clone());
        }

        if let Some(password) = matches.get_one::<String>("PASSWORD") {
            self.password = Some(password.clone());
        }

        if let Some(&timeout) = matches.get_one::<u64>("TCP_TIMEOUT") {
            self.tcp_timeout = match timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }

        if let Some(&timeout) = matches.get_one::<u64>("UDP_TIMEOUT") {
            self.udp_timeout = Duration::from_secs(timeout);
        }

        if matches.get_flag("LIMIT_UDP") {
            self.limit_udp = true;
        }

        #[cfg(all(unix, not(target_os = "android")))]
        if let Some(&nofile) = matches.get_one::<u64>("NOFILE") {
            self.nofile = Some(nofile);
        }

        #[cfg(feature = "logging")]
        {
            let verbose = matches.get_count("VERBOSE");
            if verbose > 0 {
                self.log.level = u32::from(verbose);
            }
            if matches.get_flag("LOG_WITHOUT_TIME") {
                self.log.format.without_time = true;
            }
            if let Some(config_path) = matches.get_one::<PathBuf>("LOG_CONFIG") {
                self.log.config_path = Some(config_path.clone());
            }
        }

        #[cfg(feature = "multi-threaded")]
        {
            if matches.get_flag("SINGLE_THREADED") {
                self.runtime.mode = RuntimeMode::SingleThread;
            }
            if let Some(&worker_count) = matches.get_one::<usize>("WORKER_THREADS") {
                self.runtime.worker_count = Some(worker_count);
            }
        }
    }

    /// The IP address advertised to clients in UDP ASSOCIATE replies.
    ///
    /// An explicit `server_ip` always replaces the listen host, even a
    /// concrete one. Returns `None` when the listen host is empty and no
    /// override was supplied; the caller warns but startup continues, since
    /// only the operator can know a reachable relay address.
    pub fn advertised_ip(&self) -> Option<String> {
        if let Some(ip) = self.server_ip {
            return Some(ip.to_string());
        }

        if !self.listen.host().is_empty() {
            return Some(self.listen.host().to_owned());
        }

        None
    }

    /// Check if the configuration is valid as a whole
    pub fn check_integrity(&self) -> Result<(), Error> {
        if self.username.is_some() != self.password.is_some() {
            return Err(Error::new(
                ErrorKind::Malformed,
                "`username` and `password` must be specified together",
                None,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_with_host() {
        let addr = "1.2.3.4:1080".parse::<ListenAddr>().unwrap();
        assert_eq!(addr.host(), "1.2.3.4");
        assert_eq!(addr.port(), 1080);
        assert_eq!(addr.to_string(), "1.2.3.4:1080");
    }

    #[test]
    fn listen_addr_wildcard() {
        let addr = ":1080".parse::<ListenAddr>().unwrap();
        assert_eq!(addr.host(), "");
        assert_eq!(addr.port(), 1080);
    }

    #[test]
    fn listen_addr_bind_addr_expands_empty_host() {
        let addr = ":1080".parse::<ListenAddr>().unwrap();
        assert_eq!(addr.bind_addr(), "0.0.0.0:1080");

        let addr = "192.168.1.5:1080".parse::<ListenAddr>().unwrap();
        assert_eq!(addr.bind_addr(), "192.168.1.5:1080");
    }

    #[test]
    fn listen_addr_bracketed_v6() {
        let addr = "[::1]:1080".parse::<ListenAddr>().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), 1080);
        assert_eq!(addr.to_string(), "[::1]:1080");
    }

    #[test]
    fn listen_addr_rejects_missing_colon() {
        assert!("1080".parse::<ListenAddr>().is_err());
        assert!("".parse::<ListenAddr>().is_err());
    }

    #[test]
    fn listen_addr_rejects_bad_port() {
        assert!("1.2.3.4:http".parse::<ListenAddr>().is_err());
        assert!("1.2.3.4:".parse::<ListenAddr>().is_err());
        assert!("1.2.3.4:65536".parse::<ListenAddr>().is_err());
    }

    #[test]
    fn listen_addr_rejects_unbracketed_v6() {
        assert!("::1:1080:".parse::<ListenAddr>().is_err());
        assert!("[::1:1080".parse::<ListenAddr>().is_err());
    }

    #[test]
    fn advertised_ip_from_listen_host() {
        let mut config = Config::default();
        config.listen = "192.168.1.5:1080".parse().unwrap();
        assert_eq!(config.advertised_ip().as_deref(), Some("192.168.1.5"));
    }

    #[test]
    fn advertised_ip_missing() {
        let mut config = Config::default();
        config.listen = ":1080".parse().unwrap();
        assert_eq!(config.advertised_ip(), None);
    }

    #[test]
    fn advertised_ip_override_on_wildcard() {
        let mut config = Config::default();
        config.listen = ":1080".parse().unwrap();
        config.server_ip = Some("203.0.113.9".parse().unwrap());
        assert_eq!(config.advertised_ip().as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn advertised_ip_override_wins() {
        let mut config = Config::default();
        config.listen = "10.0.0.1:1080".parse().unwrap();
        config.server_ip = Some("9.9.9.9".parse().unwrap());
        assert_eq!(config.advertised_ip().as_deref(), Some("9.9.9.9"));
    }

    #[test]
    fn load_from_str_basic() {
        let config = Config::load_from_str(
            r#"{
                listen: ":1080",
                server_ip: "203.0.113.9",
                username: "user",
                password: "pass",
                tcp_timeout: 30,
                udp_timeout: 120,
                limit_udp: true,
            }"#,
        )
        .unwrap();

        assert_eq!(config.listen.host(), "");
        assert_eq!(config.listen.port(), 1080);
        assert_eq!(config.server_ip, Some("203.0.113.9".parse().unwrap()));
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("pass"));
        assert_eq!(config.tcp_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.udp_timeout, Duration::from_secs(120));
        assert!(config.limit_udp);
    }

    #[test]
    fn load_from_str_zero_tcp_timeout_means_disabled() {
        let config = Config::load_from_str("{ tcp_timeout: 0 }").unwrap();
        assert_eq!(config.tcp_timeout, None);
    }

    #[test]
    fn load_from_str_rejects_bad_listen() {
        assert!(Config::load_from_str(r#"{ listen: "1080" }"#).is_err());
    }

    #[test]
    fn load_from_str_rejects_bad_server_ip() {
        assert!(Config::load_from_str(r#"{ server_ip: "example.com" }"#).is_err());
    }

    #[test]
    fn check_integrity_requires_credential_pair() {
        let mut config = Config::default();
        config.username = Some("user".to_owned());
        assert!(config.check_integrity().is_err());

        config.password = Some("pass".to_owned());
        assert!(config.check_integrity().is_ok());

        config.username = None;
        assert!(config.check_integrity().is_err());
    }

    #[test]
    fn set_options_overrides_file_values() {
        let matches = crate::service::server::build_command()
            .try_get_matches_from(["socks5d", "--server-ip", "9.9.9.9", "--tcp-timeout", "30", "--limit-udp"])
            .unwrap();

        let mut config = Config::load_from_str(r#"{ server_ip: "1.1.1.1", udp_timeout: 120 }"#).unwrap();
        config.set_options(&matches);

        assert_eq!(config.server_ip, Some("9.9.9.9".parse().unwrap()));
        assert_eq!(config.tcp_timeout, Some(Duration::from_secs(30)));
        assert!(config.limit_udp);
        // untouched flags keep the file's values
        assert_eq!(config.udp_timeout, Duration::from_secs(120));
    }

    #[test]
    fn default_config_advertises_wildcard_host() {
        // the default 0.0.0.0 host is non-empty, exactly like the original
        let config = Config::default();
        assert_eq!(config.advertised_ip().as_deref(), Some("0.0.0.0"));
    }
}
