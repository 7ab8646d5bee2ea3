//! Routes served by both roles
use serde::Serialize;

use crate::node::NodeAddress;
use crate::settings::{APP_NAME, APP_VERSION};

pub async fn root() -> String {
    format!("{} {}", APP_NAME, APP_VERSION)
}

pub async fn health() -> &'static str {
    "OK"
}

/// Identity of the answering node
#[derive(Debug, Serialize)]
pub struct AboutResponse {
    name: &'static str,
    version: &'static str,
    role: &'static str,
    address: String,
}

impl AboutResponse {
    pub fn new(role: &'static str, address: &NodeAddress) -> Self {
        Self {
            name: APP_NAME,
            version: APP_VERSION,
            role,
            address: address.to_string(),
        }
    }
}
