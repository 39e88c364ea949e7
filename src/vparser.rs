//! Command line argument parsers

#![allow(dead_code)]

use std::net::IpAddr;

macro_rules! value_parser_type {
    ($name:ident, $ty:ty, $help:expr) => {
        pub fn $name(v: &str) -> Result<$ty, String> {
            match v.parse::<$ty>() {
                Ok(t) => Ok(t),
                Err(..) => Err($help.to_owned()),
            }
        }
    };
}

value_parser_type!(parse_ip_addr, IpAddr, "should be a valid IPv4 or IPv6 address");
value_parser_type!(parse_u64, u64, "should be unsigned integer");
value_parser_type!(parse_usize, usize, "should be unsigned integer");
