//! ERC20 Token Helpers
//!
//! Read helpers for token metadata, plus unit formatting.

use alloy::primitives::{utils::format_units, Address, U256};
use eyre::{eyre, Result};

use crate::evm::client::HttpProvider;
use crate::evm::contracts::ERC20;

/// Get token decimals
pub async fn get_token_decimals(provider: &HttpProvider, token_address: Address) -> Result<u8> {
    let contract = ERC20::new(token_address, provider);
    let decimals = contract
        .decimals()
        .call()
        .await
        .map_err(|e| eyre!("Failed to get decimals: {}", e))?;
    Ok(decimals._0)
}

/// Get token symbol
pub async fn get_token_symbol(provider: &HttpProvider, token_address: Address) -> Result<String> {
    let contract = ERC20::new(token_address, provider);
    let symbol = contract
        .symbol()
        .call()
        .await
        .map_err(|e| eyre!("Failed to get symbol: {}", e))?;
    Ok(symbol._0)
}

/// Get token name
pub async fn get_token_name(provider: &HttpProvider, token_address: Address) -> Result<String> {
    let contract = ERC20::new(token_address, provider);
    let name = contract
        .name()
        .call()
        .await
        .map_err(|e| eyre!("Failed to get name: {}", e))?;
    Ok(name._0)
}

/// Format raw token units for display (`12500000`, 6 -> `"12.5"`).
///
/// Falls back to the raw integer if `decimals` is out of range.
pub fn format_token_amount(raw: U256, decimals: u8) -> String {
    match format_units(raw, decimals) {
        Ok(formatted) => {
            let trimmed = if formatted.contains('.') {
                formatted.trim_end_matches('0').trim_end_matches('.')
            } else {
                formatted.as_str()
            };
            trimmed.to_string()
        }
        Err(_) => raw.to_string(),
    }
}
