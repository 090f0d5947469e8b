//! Typed deployment parameters and layered resolution.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::Module;

/// Declared shape of a deployment parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParamType {
    Address,
    Uint,
    String,
    Bool,
}

/// A concrete, type-checked parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Address(Address),
    Uint(U256),
    String(String),
    Bool(bool),
}

impl ParamValue {
    /// The type this value conforms to.
    pub fn ty(&self) -> ParamType {
        match self {
            ParamValue::Address(_) => ParamType::Address,
            ParamValue::Uint(_) => ParamType::Uint,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Bool(_) => ParamType::Bool,
        }
    }

    /// Parse a raw string (CLI override or environment entry) against a
    /// declared parameter type. Malformed input fails fast here, before any
    /// chain action is attempted.
    pub fn parse(name: &str, ty: ParamType, raw: &str) -> Result<Self> {
        let invalid = |expected: &'static str| Error::InvalidParameterType {
            name: name.to_string(),
            expected,
            got: raw.to_string(),
        };

        match ty {
            ParamType::Address => raw
                .parse::<Address>()
                .map(ParamValue::Address)
                .map_err(|_| invalid("0x-prefixed 20-byte hex address")),
            ParamType::Uint => raw
                .parse::<U256>()
                .map(ParamValue::Uint)
                .map_err(|_| invalid("decimal or 0x-prefixed unsigned integer")),
            ParamType::String => Ok(ParamValue::String(raw.to_string())),
            ParamType::Bool => match raw {
                "true" => Ok(ParamValue::Bool(true)),
                "false" => Ok(ParamValue::Bool(false)),
                _ => Err(invalid("'true' or 'false'")),
            },
        }
    }
}

/// A named parameter declared by a module, with an optional default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<ParamValue>,
}

/// The immutable output of parameter resolution.
///
/// Resolution happens exactly once per run; every action executed afterwards
/// sees the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref, derive_more::From)]
pub struct ResolvedParameters(BTreeMap<String, ParamValue>);

impl ResolvedParameters {
    /// Render values as plain strings, for fingerprinting and reports.
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    ParamValue::Address(a) => a.to_string(),
                    ParamValue::Uint(u) => u.to_string(),
                    ParamValue::String(s) => s.clone(),
                    ParamValue::Bool(b) => b.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

/// Resolve every parameter a module declares.
///
/// Precedence, highest first: explicit per-deployment override, environment
/// entry, module-declared default. A parameter with none of the three fails
/// with [`Error::UnresolvedParameter`]; an override naming an undeclared
/// parameter is rejected as a configuration mistake, while unrelated
/// environment keys are ignored.
pub fn resolve(
    module: &Module,
    overrides: &BTreeMap<String, String>,
    environment: &BTreeMap<String, String>,
) -> Result<ResolvedParameters> {
    for name in overrides.keys() {
        if !module.parameters().iter().any(|p| &p.name == name) {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "override for unknown parameter '{}' (module '{}' declares: {})",
                    name,
                    module.name(),
                    module
                        .parameters()
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }
    }

    let mut resolved = BTreeMap::new();
    for param in module.parameters() {
        let value = if let Some(raw) = overrides.get(&param.name) {
            tracing::debug!(parameter = %param.name, source = "override", "Resolving parameter");
            ParamValue::parse(&param.name, param.ty, raw)?
        } else if let Some(raw) = environment.get(&param.name) {
            tracing::debug!(parameter = %param.name, source = "environment", "Resolving parameter");
            ParamValue::parse(&param.name, param.ty, raw)?
        } else if let Some(default) = &param.default {
            tracing::debug!(parameter = %param.name, source = "default", "Resolving parameter");
            default.clone()
        } else {
            return Err(Error::UnresolvedParameter {
                name: param.name.clone(),
            });
        };
        resolved.insert(param.name.clone(), value);
    }

    Ok(ResolvedParameters(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;

    const USDT: &str = "0xCdD595184EE2Ece14d16ee60Afe83337Dd04dE67";
    const NOTARY: &str = "0x7cfE552f36359D1c74Bd6b89e448a6d4CcC4eca8";

    fn escrow_module() -> Module {
        Module::build("EscrowModule", |m| {
            let usdt = m.param(
                "_usdt",
                ParamType::Address,
                Some(ParamValue::Address(USDT.parse().unwrap())),
            )?;
            let notary = m.param(
                "_notary",
                ParamType::Address,
                Some(ParamValue::Address(NOTARY.parse().unwrap())),
            )?;
            m.deploy("USDT_Escrow", vec![usdt.into(), notary.into()])?;
            Ok(())
        })
        .expect("escrow module should build")
    }

    #[test]
    fn all_defaults_resolve_to_declared_defaults() {
        let module = escrow_module();
        let resolved = resolve(&module, &BTreeMap::new(), &BTreeMap::new()).unwrap();

        assert_eq!(
            resolved.get("_usdt"),
            Some(&ParamValue::Address(USDT.parse().unwrap()))
        );
        assert_eq!(
            resolved.get("_notary"),
            Some(&ParamValue::Address(NOTARY.parse().unwrap()))
        );
    }

    #[test]
    fn override_beats_default() {
        let module = escrow_module();
        let other = "0xAAA0000000000000000000000000000000000aaa";
        let overrides = BTreeMap::from([("_notary".to_string(), other.to_string())]);

        let resolved = resolve(&module, &overrides, &BTreeMap::new()).unwrap();
        assert_eq!(
            resolved.get("_notary"),
            Some(&ParamValue::Address(other.parse().unwrap()))
        );
        // The untouched parameter keeps its default.
        assert_eq!(
            resolved.get("_usdt"),
            Some(&ParamValue::Address(USDT.parse().unwrap()))
        );
    }

    #[test]
    fn override_beats_environment_beats_default() {
        let module = escrow_module();
        let from_env = "0xBBB0000000000000000000000000000000000bbb";
        let from_override = "0xAAA0000000000000000000000000000000000aaa";
        let environment = BTreeMap::from([
            ("_usdt".to_string(), from_env.to_string()),
            ("_notary".to_string(), from_env.to_string()),
            ("UNRELATED".to_string(), "ignored".to_string()),
        ]);
        let overrides = BTreeMap::from([("_notary".to_string(), from_override.to_string())]);

        let resolved = resolve(&module, &overrides, &environment).unwrap();
        assert_eq!(
            resolved.get("_usdt"),
            Some(&ParamValue::Address(from_env.parse().unwrap()))
        );
        assert_eq!(
            resolved.get("_notary"),
            Some(&ParamValue::Address(from_override.parse().unwrap()))
        );
    }

    #[test]
    fn missing_parameter_without_default_fails() {
        let module = Module::build("NoDefaults", |m| {
            let owner = m.param("owner", ParamType::Address, None)?;
            m.deploy("Vault", vec![owner.into()])?;
            Ok(())
        })
        .unwrap();

        let err = resolve(&module, &BTreeMap::new(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedParameter { name } if name == "owner"));
    }

    #[test]
    fn malformed_address_override_fails_fast() {
        let module = escrow_module();
        let overrides = BTreeMap::from([("_notary".to_string(), "not-hex".to_string())]);

        let err = resolve(&module, &overrides, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameterType { name, .. } if name == "_notary"));
    }

    #[test]
    fn unknown_override_name_is_rejected() {
        let module = escrow_module();
        let overrides = BTreeMap::from([("_nonexistent".to_string(), "1".to_string())]);

        let err = resolve(&module, &overrides, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn uint_and_bool_parsing() {
        assert_eq!(
            ParamValue::parse("n", ParamType::Uint, "42").unwrap(),
            ParamValue::Uint(U256::from(42u64))
        );
        assert_eq!(
            ParamValue::parse("n", ParamType::Uint, "0x2a").unwrap(),
            ParamValue::Uint(U256::from(42u64))
        );
        assert_eq!(
            ParamValue::parse("b", ParamType::Bool, "true").unwrap(),
            ParamValue::Bool(true)
        );
        assert!(ParamValue::parse("b", ParamType::Bool, "yes").is_err());
        assert!(ParamValue::parse("n", ParamType::Uint, "12abc").is_err());
    }
}
