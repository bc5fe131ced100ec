#![allow(dead_code)]

pub mod fixtures;
pub mod tls_server;
pub mod wiremock_helpers;
