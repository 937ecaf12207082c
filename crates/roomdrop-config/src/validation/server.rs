use std::net::IpAddr;

use crate::schema::RoomdropConfig;

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &RoomdropConfig) {
    if config.server.bind.parse::<IpAddr>().is_err() {
        errors.push(format!(
            "server.bind = {:?} is not an IP address",
            config.server.bind
        ));
    }
}
