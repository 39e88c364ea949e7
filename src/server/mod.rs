//! SOCKS5 server runner
//!
//! The SOCKS5 protocol itself is handled by the embedded
//! [`fast-socks5`](https://crates.io/crates/fast-socks5) engine; this module
//! prepares the engine configuration and owns the accept loop.

use std::{
    io,
    net::{IpAddr, ToSocketAddrs},
    sync::Arc,
};

use fast_socks5::server::{Config as EngineConfig, SimpleUserPassword, Socks5Socket};
use log::{debug, error, info, trace, warn};
use tokio::net::TcpListener;

use crate::config::{Config, DEFAULT_UDP_TIMEOUT};

/// Starts a SOCKS5 proxy server with a specific configuration.
///
/// Runs until aborted. Binding the listener is the only fallible step;
/// per-connection failures are logged and do not stop the server.
pub async fn run_server(config: Config) -> io::Result<()> {
    let reply_ip = match config.advertised_ip() {
        Some(host) => match resolve_reply_ip(&host) {
            Some(ip) => Some(ip),
            None => {
                warn!("advertised address {host} does not resolve to an IP, UDP replies will carry the bound address");
                None
            }
        },
        None => None,
    };

    let mut engine: EngineConfig = EngineConfig::default();
    engine.set_dns_resolve(true);
    engine.set_execute_command(true);
    engine.set_udp_support(true);
    if let Some(timeout) = config.tcp_timeout {
        engine.set_request_timeout(timeout.as_secs());
    }

    if config.limit_udp {
        warn!("limit-udp is not enforced by the embedded engine, associations stay open to any source address");
    }
    if config.udp_timeout != DEFAULT_UDP_TIMEOUT {
        debug!(
            "udp-timeout {}s has no effect, association lifetimes are managed by the embedded engine",
            config.udp_timeout.as_secs()
        );
    }

    let listen = config.listen.bind_addr();
    let listener = TcpListener::bind(&listen).await?;
    info!("socks5 TCP listening on {listen}");

    // The engine config is typed by its authentication mode, so each mode
    // gets its own monomorphic accept loop.
    match (config.username, config.password) {
        (Some(username), Some(password)) => {
            info!("username/password authentication enabled");
            let engine = Arc::new(engine.with_authentication(SimpleUserPassword { username, password }));

            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(s) => s,
                    Err(err) => {
                        error!("accept failed, {err}");
                        continue;
                    }
                };
                trace!("accepted TCP connection from {peer_addr}");

                let mut socket = Socks5Socket::new(stream, engine.clone());
                if let Some(ip) = reply_ip {
                    socket.set_reply_ip(ip);
                }
                tokio::spawn(async move {
                    if let Err(err) = socket.upgrade_to_socks5().await {
                        error!("socks5 session with {peer_addr} failed, {err}");
                    }
                });
            }
        }
        _ => {
            let engine = Arc::new(engine);

            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(s) => s,
                    Err(err) => {
                        error!("accept failed, {err}");
                        continue;
                    }
                };
                trace!("accepted TCP connection from {peer_addr}");

                let mut socket = Socks5Socket::new(stream, engine.clone());
                if let Some(ip) = reply_ip {
                    socket.set_reply_ip(ip);
                }
                tokio::spawn(async move {
                    if let Err(err) = socket.upgrade_to_socks5().await {
                        error!("socks5 session with {peer_addr} failed, {err}");
                    }
                });
            }
        }
    }
}

/// The advertised host as an `IpAddr`, through a name lookup when it is not
/// an address literal
fn resolve_reply_ip(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }

    match (host, 0u16).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(..) => None,
    }
}
