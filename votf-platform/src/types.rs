// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use serde::{Deserialize, de};
use serde_yaml::Value;
use votf_models::table::LayoutQuirk;
use votf_models::types::{Module, ModuleType, Service};

/// Parse a value which could be an integer or a string and return a u32
///
/// The string can be a hex string with underscores or a decimal string. Some
/// examples are:
///  0x10000000
///  0x1000_0000
///  4096
pub fn parse_hex<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: de::Deserializer<'de>,
{
    // We need to first deserialize to a generic `Value` so that we can
    // support the case where it is already a number.
    let value: Value = Deserialize::deserialize(deserializer)?;

    if let Some(number) = value.as_u64() {
        return u32::try_from(number)
            .map_err(|_| de::Error::custom(format!("{number:#x} does not fit in 32 bits")));
    }

    let s = match value.as_str() {
        Some(s) => s.to_owned(),
        None => {
            return Err(de::Error::custom(format!(
                "'{value:?}': Unsupported type for Deserialize (should be u32 or String)"
            )));
        }
    };

    let without_underscore = s.to_lowercase().replace('_', "");
    match without_underscore.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map_err(|e| de::Error::custom(format!("Unable to parse {s} as hex string: {e}"))),
        None => without_underscore
            .parse()
            .map_err(|e| de::Error::custom(format!("Unable to parse {s} as number: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    pub module_types: Vec<ModuleTypeSection>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSection>,
    pub poll: Option<PollSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleTypeSection {
    pub module_type: ModuleType,
    #[serde(deserialize_with = "parse_hex")]
    pub tws_addr: u32,
    #[serde(deserialize_with = "parse_hex")]
    pub tws_gap: u32,
    #[serde(deserialize_with = "parse_hex")]
    pub trs_addr: u32,
    #[serde(deserialize_with = "parse_hex")]
    pub trs_gap: u32,
    /// Irregular channel spacing. The module type's built-in quirks are used
    /// when this is absent; an empty list disables them.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub quirks: Option<Vec<LayoutQuirk>>,
}

/// One IP block.
///
/// Endpoints are assigned IP slots in the order they are listed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    pub name: Option<String>,
    #[serde(deserialize_with = "parse_hex")]
    pub addr: u32,
    #[serde(deserialize_with = "parse_hex")]
    pub ip: u32,
    pub channels: usize,
    pub module: Module,
    pub service: Service,
    pub module_type: ModuleType,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSection {
    pub max_iterations: Option<u32>,
    pub delay_us: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "parse_hex")]
        value: u32,
    }

    fn parse(s: &str) -> Result<u32, serde_yaml::Error> {
        serde_yaml::from_str::<Holder>(s).map(|h| h.value)
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse("value: 4096").unwrap(), 4096);
        assert_eq!(parse("value: \"0x1000_0000\"").unwrap(), 0x1000_0000);
        assert_eq!(parse("value: \"0X20\"").unwrap(), 0x20);
        assert_eq!(parse("value: \"1_024\"").unwrap(), 1024);
    }

    #[test]
    fn bad_values() {
        assert!(parse("value: \"0xzz\"").is_err());
        assert!(parse("value: 0x100000000").is_err());
        assert!(parse("value: [1]").is_err());
    }
}
