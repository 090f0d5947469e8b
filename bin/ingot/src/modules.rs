//! Built-in deployment modules.

use anyhow::Result;
use ingot_engine::{Module, ParamType, ParamValue};

/// Default USDT token contract on Scroll Sepolia.
const USDT_DEFAULT: &str = "0xCdD595184EE2Ece14d16ee60Afe83337Dd04dE67";
/// Default notary account for the escrow.
const NOTARY_DEFAULT: &str = "0x7cfE552f36359D1c74Bd6b89e448a6d4CcC4eca8";

/// Names of the modules this binary can deploy.
pub const AVAILABLE: &[&str] = &["EscrowModule"];

/// Build a module by name.
pub fn build(name: &str) -> Result<Module> {
    match name {
        "EscrowModule" => escrow_module(),
        _ => anyhow::bail!(
            "unknown module '{}' (available: {})",
            name,
            AVAILABLE.join(", ")
        ),
    }
}

/// The USDT escrow: one contract taking the token and notary addresses.
/// Both addresses are overridable parameters with production defaults.
fn escrow_module() -> Result<Module> {
    let module = Module::build("EscrowModule", |m| {
        let usdt = m.param(
            "_usdt",
            ParamType::Address,
            Some(ParamValue::Address(
                USDT_DEFAULT.parse().expect("default USDT address is valid"),
            )),
        )?;
        let notary = m.param(
            "_notary",
            ParamType::Address,
            Some(ParamValue::Address(
                NOTARY_DEFAULT.parse().expect("default notary address is valid"),
            )),
        )?;

        m.deploy("USDT_Escrow", vec![usdt.into(), notary.into()])?;
        Ok(())
    })?;
    Ok(module)
}
