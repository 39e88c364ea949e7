//! Server launcher

use std::{path::PathBuf, process::ExitCode};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use futures::future::{self, Either};
use log::{info, trace};
use tokio::runtime::Builder;

use crate::{
    config::{Config, ListenAddr, RuntimeMode},
    error::ServiceError,
    monitor,
    server,
    vparser,
};

#[cfg(feature = "logging")]
use crate::logging;

/// Defines command line options
pub fn define_command_line_options(mut app: Command) -> Command {
    app = app
        .arg(
            Arg::new("CONFIG")
                .short('c')
                .long("config")
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file in JSON5 format"),
        )
        .arg(
            Arg::new("LISTEN")
                .short('b')
                .long("listen")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Socks5 server listen address, like :1080 or 1.2.3.4:1080 (default 0.0.0.0:1080)"),
        )
        .arg(
            Arg::new("SERVER_IP")
                .long("server-ip")
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(vparser::parse_ip_addr)
                .help("IP told to clients for UDP associations, only if your server IP differs from the listen host"),
        )
        .arg(
            Arg::new("USERNAME")
                .short('u')
                .long("username")
                .num_args(1)
                .action(ArgAction::Set)
                .help("User name, optional"),
        )
        .arg(
            Arg::new("PASSWORD")
                .short('k')
                .long("password")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Password, optional"),
        )
        .arg(
            Arg::new("TCP_TIMEOUT")
                .long("tcp-timeout")
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(vparser::parse_u64)
                .help("Connection deadline seconds for TCP, 0 disables the deadline"),
        )
        .arg(
            Arg::new("UDP_TIMEOUT")
                .long("udp-timeout")
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(vparser::parse_u64)
                .help("Association deadline seconds for UDP relay"),
        )
        .arg(
            Arg::new("LIMIT_UDP")
                .long("limit-udp")
                .action(ArgAction::SetTrue)
                .help(
                    "Restrict UDP association access to the connecting client. \
                     This usually causes connection failures in a NAT environment, where most clients are",
                ),
        );

    #[cfg(feature = "logging")]
    {
        app = app
            .arg(
                Arg::new("VERBOSE")
                    .short('v')
                    .action(ArgAction::Count)
                    .help("Set log level"),
            )
            .arg(
                Arg::new("LOG_WITHOUT_TIME")
                    .long("log-without-time")
                    .action(ArgAction::SetTrue)
                    .help("Log without datetime prefix"),
            )
            .arg(
                Arg::new("LOG_CONFIG")
                    .long("log-config")
                    .num_args(1)
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("log4rs configuration file"),
            );
    }

    #[cfg(unix)]
    {
        app = app
            .arg(
                Arg::new("DAEMONIZE")
                    .short('d')
                    .long("daemonize")
                    .action(ArgAction::SetTrue)
                    .help("Daemonize"),
            )
            .arg(
                Arg::new("DAEMONIZE_PID_PATH")
                    .long("daemonize-pid")
                    .num_args(1)
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("File path to store daemonized process's PID"),
            );
    }

    #[cfg(all(unix, not(target_os = "android")))]
    {
        app = app.arg(
            Arg::new("NOFILE")
                .short('n')
                .long("nofile")
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(vparser::parse_u64)
                .help("Raise RLIMIT_NOFILE to this target instead of the platform default"),
        );
    }

    #[cfg(feature = "multi-threaded")]
    {
        app = app
            .arg(
                Arg::new("SINGLE_THREADED")
                    .long("single-threaded")
                    .action(ArgAction::SetTrue)
                    .help("Run the program all in one thread"),
            )
            .arg(
                Arg::new("WORKER_THREADS")
                    .long("worker-threads")
                    .num_args(1)
                    .action(ArgAction::Set)
                    .value_parser(vparser::parse_usize)
                    .help("Sets the number of worker threads the `Runtime` will use"),
            );
    }

    app
}

/// Assemble the `socks5d` command line definition
pub fn build_command() -> Command {
    define_command_line_options(
        Command::new("socks5d")
            .version(crate::VERSION)
            .about("A standalone SOCKS5 proxy server"),
    )
}

fn print_usage() {
    let _ = build_command().print_help();
}

/// Program entrance `main`
pub fn main(matches: &ArgMatches) -> ExitCode {
    let mut config = match matches.get_one::<PathBuf>("CONFIG") {
        Some(config_path) => match Config::load_from_file(config_path) {
            Ok(cfg) => cfg,
            Err(err) => {
                let err = ServiceError::LoadConfigFailure(format!(
                    "loading config {}, {}",
                    config_path.display(),
                    err
                ));
                eprintln!("{err}");
                return err.exit_code().into();
            }
        },
        None => Config::default(),
    };

    if let Some(listen) = matches.get_one::<String>("LISTEN") {
        // an explicitly empty listen address asks for the usage text
        if listen.is_empty() {
            print_usage();
            return ExitCode::SUCCESS;
        }

        match listen.parse::<ListenAddr>() {
            Ok(addr) => config.listen = addr,
            Err(..) => {
                let err = ServiceError::MalformedListenAddr(format!(
                    "invalid listen address \"{listen}\", expecting host:port or :port"
                ));
                eprintln!("{err}");
                return err.exit_code().into();
            }
        }
    }

    config.set_options(matches);

    #[cfg(feature = "logging")]
    match config.log.config_path {
        Some(ref path) => logging::init_with_file(path),
        None => logging::init_with_config("socks5d", &config.log),
    }

    trace!("{config:?}");

    if let Err(err) = config.check_integrity() {
        let err = ServiceError::InsufficientParams(format!("config integrity check failed, {err}"));
        eprintln!("{err}");
        return err.exit_code().into();
    }

    match config.advertised_ip() {
        Some(ip) => info!("advertising {ip} for UDP associations"),
        // plain line on stdout, operators must see this even with logging off
        None => println!(
            "socks5 server requires a clear IP for UDP, only a port is not enough; \
             you may use a public IP or LAN IP with --server-ip, we can not decide for you"
        ),
    }

    // the listener must never start under an unknown or unverified fd budget
    #[cfg(all(unix, not(target_os = "android")))]
    match crate::sys::adjust_nofile(config.nofile) {
        Ok(crate::sys::NofileStatus::Raised(lim)) => log::debug!("rlimit NOFILE raised, {lim:?}"),
        Ok(crate::sys::NofileStatus::Unchanged(lim)) => trace!("rlimit NOFILE {lim:?} left as-is"),
        Err(err) => {
            eprintln!("{err}");
            return err.exit_code().into();
        }
    }

    #[cfg(unix)]
    if matches.get_flag("DAEMONIZE") || matches.contains_id("DAEMONIZE_PID_PATH") {
        use crate::daemonize;
        daemonize::daemonize(matches.get_one::<PathBuf>("DAEMONIZE_PID_PATH"));
    }

    info!("socks5d {}", crate::VERSION);

    let mut builder = match config.runtime.mode {
        RuntimeMode::SingleThread => Builder::new_current_thread(),
        #[cfg(feature = "multi-threaded")]
        RuntimeMode::MultiThread => {
            let mut builder = Builder::new_multi_thread();
            if let Some(worker_count) = config.runtime.worker_count {
                builder.worker_threads(worker_count);
            }

            builder
        }
    };

    let runtime = builder.enable_all().build().expect("create tokio Runtime");

    runtime.block_on(async move {
        let abort_signal = monitor::create_signal_monitor();
        let srv = server::run_server(config);

        tokio::pin!(abort_signal);
        tokio::pin!(srv);

        match future::select(srv, abort_signal).await {
            // Server future resolved without an error. This should never happen.
            Either::Left((Ok(..), ..)) => {
                let err = ServiceError::ServerExitUnexpectedly("server exited unexpectedly".to_owned());
                eprintln!("{err}");
                err.exit_code().into()
            }
            // Server future resolved with error, which are listener errors in most cases
            Either::Left((Err(err), ..)) => {
                let err = ServiceError::ServerAborted(format!("server aborted with {err}"));
                eprintln!("{err}");
                err.exit_code().into()
            }
            // The abort signal future resolved. Means we should just exit.
            Either::Right(..) => ExitCode::SUCCESS,
        }
    })
}
