use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const HUB_CONFIG: &str = "FLEETWATCH_CONFIG";

const DEFAULT_CONFIG: &str = "./fleetwatch.json";

pub fn get_config_path() -> String {
    std::env::var(HUB_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG.to_string())
}

const HUB_BIND: &str = "FLEETWATCH_BIND";

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

pub fn get_default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR
}

pub fn get_bind_addr() -> SocketAddr {
    let bind_from_env = std::env::var(HUB_BIND);
    bind_from_env.map_or(DEFAULT_BIND_ADDR, |res| {
        res.parse().unwrap_or(DEFAULT_BIND_ADDR)
    })
}

/// Round to two decimal places, the precision the query API reports in
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
