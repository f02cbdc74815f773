//! String parsing helpers shared by the TOML loaders.

use alloy::primitives::{Address, U256};
use anyhow::Result;

/// Expand a `${VAR}` reference from the environment.
///
/// Non-references are returned unchanged; unset variables are left as the
/// literal reference so the parse error names the missing variable.
pub fn expand_env(s: &str) -> String {
    if s.starts_with("${") && s.ends_with('}') {
        let var_name = &s[2..s.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Parse an address, expanding `${VAR}` references first.
pub fn parse_address(s: &str) -> Result<Address> {
    let value = expand_env(s);
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", value, e))
}

/// Parse a raw token amount (decimal or `0x` hex), expanding `${VAR}` first.
/// Underscores are accepted as digit separators.
pub fn parse_amount(s: &str) -> Result<U256> {
    let value = expand_env(s).trim().replace('_', "");
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_expansion() {
        std::env::set_var("UNWINDER_TEST_VAR", "test_value");

        assert_eq!(expand_env("${UNWINDER_TEST_VAR}"), "test_value");
        assert_eq!(expand_env("literal"), "literal");
        assert_eq!(expand_env("${UNWINDER_NONEXISTENT}"), "${UNWINDER_NONEXISTENT}");

        std::env::remove_var("UNWINDER_TEST_VAR");
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x0000000000000000000000000000000000000001").unwrap();
        assert_eq!(addr, Address::with_last_byte(1));
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1_000").unwrap(), U256::from(1000));
        assert_eq!(parse_amount("0x10").unwrap(), U256::from(16));
        assert!(parse_amount("ten").is_err());
    }
}
