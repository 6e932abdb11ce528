// config.rs — Generator configuration
//
// Build-time choices that shape the generated header: environment region
// capacity, safety-check policy, vector type support, and the names the
// header shares with the execution layer.

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, Result};
use crate::layout::POINTER_SIZE;

/// Default environment region capacity in bytes.
pub const DEFAULT_ENVIRONMENT_CAPACITY: usize = 10240;

/// Default name of the device-resident buffer symbol.
pub const DEFAULT_SYMBOL_NAME: &str = "curve_rtc_data";

/// Namespace that wraps every generated declaration.
pub const DEVICE_NAMESPACE: &str = "curve_rtc";

/// How accessor safety checks ("seatbelts") are emitted.
///
/// With checks off, failed lookups and bad indices read or store a zero
/// value silently. Downstream code relies on that for its fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seatbelts {
    /// Emit type, length, bounds, and not-found checks.
    #[default]
    Enabled,
    /// Emit no checks.
    Disabled,
    /// Emit both forms behind `#if !defined(SEATBELTS) || SEATBELTS` and let
    /// the downstream compile decide.
    Preprocessor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Size of the environment region. Must be a multiple of the pointer size.
    pub environment_capacity: usize,
    pub seatbelts: Seatbelts,
    /// Allow aggregate vector types through scalar accessors. Their size
    /// check covers the whole aggregate, and cached reads use a plain load.
    pub vector_types: bool,
    pub symbol_name: String,
    /// Fault-reporting macro supplied by the execution layer.
    pub fault_macro: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            environment_capacity: DEFAULT_ENVIRONMENT_CAPACITY,
            seatbelts: Seatbelts::default(),
            vector_types: false,
            symbol_name: DEFAULT_SYMBOL_NAME.to_string(),
            fault_macro: "DTHROW".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.environment_capacity % POINTER_SIZE != 0 {
            return Err(CurveError::InvalidConfig(format!(
                "environment capacity {} is not a multiple of {}",
                self.environment_capacity, POINTER_SIZE
            )));
        }
        if !is_identifier(&self.symbol_name) {
            return Err(CurveError::InvalidConfig(format!(
                "symbol name '{}' is not a valid identifier",
                self.symbol_name
            )));
        }
        if !is_identifier(&self.fault_macro) {
            return Err(CurveError::InvalidConfig(format!(
                "fault macro '{}' is not a valid identifier",
                self.fault_macro
            )));
        }
        Ok(())
    }

    /// Fully qualified symbol name, as resolved inside a compiled module.
    pub fn device_symbol(&self) -> String {
        format!("{}::{}", DEVICE_NAMESPACE, self.symbol_name)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        GeneratorConfig::default().validate().unwrap();
    }

    #[test]
    fn capacity_must_be_pointer_multiple() {
        let cfg = GeneratorConfig {
            environment_capacity: POINTER_SIZE + 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(CurveError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_bad_identifiers() {
        let cfg = GeneratorConfig {
            symbol_name: "9lives".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = GeneratorConfig {
            fault_macro: "FAULT!".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: GeneratorConfig =
            serde_json::from_str(r#"{"seatbelts": "preprocessor", "environment_capacity": 64}"#)
                .unwrap();
        assert_eq!(cfg.seatbelts, Seatbelts::Preprocessor);
        assert_eq!(cfg.environment_capacity, 64);
        assert_eq!(cfg.symbol_name, DEFAULT_SYMBOL_NAME);
        assert_eq!(cfg.device_symbol(), "curve_rtc::curve_rtc_data");
    }
}
