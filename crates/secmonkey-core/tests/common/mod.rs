use secmonkey_core::hashing::EphemeralPath;
use secmonkey_core::{ConfigSnapshot, ConfigValue, Location};

/// Build a snapshot from a JSON config
#[allow(dead_code)]
pub fn snap(
    technology: &str,
    account: &str,
    region: &str,
    name: &str,
    config: serde_json::Value,
) -> ConfigSnapshot {
    ConfigSnapshot::new(
        Location::new(technology, account, region, name),
        ConfigValue::from(config),
    )
}

/// Parse ephemeral paths, panicking on malformed input
#[allow(dead_code)]
pub fn paths(raw: &[&str]) -> Vec<EphemeralPath> {
    EphemeralPath::parse_all(raw).expect("valid ephemeral paths")
}

#[allow(dead_code)]
pub fn accounts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
