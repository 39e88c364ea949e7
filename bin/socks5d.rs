//! This is a binary running a standalone SOCKS5 proxy server
//!
//! You have to provide all needed configuration attributes via command line
//! parameters, or you could specify a configuration file. The format of
//! configuration file is defined in mod `config`.

use std::process::ExitCode;

use socks5_rust::service::server;

fn main() -> ExitCode {
    let matches = server::build_command().get_matches();
    server::main(&matches)
}
