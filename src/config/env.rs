use super::GatewayConfig;

/// Apply environment overrides on top of file/default values.
///
/// Unparseable values are ignored and the configured value is kept.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(v) = std::env::var("KNOT_SERVER_HOST") {
        config.server.host = v;
    }
    if let Ok(v) = std::env::var("KNOT_SERVER_PORT") {
        if let Ok(port) = v.parse::<u16>() {
            config.server.port = port;
        }
    }
    if let Ok(v) = std::env::var("NATS_URL") {
        config.bus.url = v;
    }
    if let Ok(v) = std::env::var("KNOT_BUS_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            config.bus.request_timeout_ms = ms;
        }
    }
    if let Ok(v) = std::env::var("KNOT_ALIAS_SERVER_URI") {
        config.alias.server_uri = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_replace_file_values() {
        std::env::set_var("KNOT_SERVER_PORT", "4100");
        std::env::set_var("KNOT_BUS_REQUEST_TIMEOUT_MS", "not-a-number");
        std::env::set_var("KNOT_ALIAS_SERVER_URI", "http://aliases:3003");

        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config);

        std::env::remove_var("KNOT_SERVER_PORT");
        std::env::remove_var("KNOT_BUS_REQUEST_TIMEOUT_MS");
        std::env::remove_var("KNOT_ALIAS_SERVER_URI");

        assert_eq!(config.server.port, 4100);
        assert_eq!(config.bus.request_timeout_ms, 5000);
        assert_eq!(config.alias.server_uri, "http://aliases:3003");
    }
}
