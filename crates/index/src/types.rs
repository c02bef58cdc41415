//! Indexed markets and borrower positions.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lending market as indexed by the subgraph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    /// pToken contract address
    #[serde(deserialize_with = "deserialize_address")]
    pub id: Address,

    #[serde(default)]
    pub name: String,

    /// pToken symbol, used as the position query key
    pub symbol: String,

    /// Underlying ERC20 (absent for the native-asset market)
    #[serde(default, deserialize_with = "deserialize_optional_address")]
    pub underlying_address: Option<Address>,

    #[serde(default)]
    pub underlying_name: String,

    #[serde(default)]
    pub underlying_symbol: String,

    #[serde(deserialize_with = "deserialize_u64")]
    pub accrual_block_number: u64,

    #[serde(default, deserialize_with = "deserialize_u64")]
    pub block_timestamp: u64,
}

impl Market {
    /// Timestamp of the last indexed accrual, if the index supplied one.
    pub fn block_time(&self) -> Option<DateTime<Utc>> {
        if self.block_timestamp == 0 {
            return None;
        }
        DateTime::from_timestamp(self.block_timestamp as i64, 0)
    }
}

/// Borrower reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Account {
    #[serde(deserialize_with = "deserialize_address")]
    pub id: Address,
}

/// Market reference nested inside a position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRef {
    #[serde(deserialize_with = "deserialize_address")]
    pub id: Address,

    #[serde(default, deserialize_with = "deserialize_optional_address")]
    pub underlying_address: Option<Address>,

    #[serde(default)]
    pub underlying_symbol: String,
}

/// A borrower's stake in one market (`accountPToken` entity).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// `<market>-<account>`
    pub id: String,

    pub symbol: String,

    /// Deposited pTokens, decimal string as indexed
    #[serde(rename = "pTokenBalance", deserialize_with = "deserialize_decimal")]
    pub ptoken_balance: String,

    #[serde(deserialize_with = "deserialize_u64")]
    pub accrual_block_number: u64,

    /// Debt at last accrual, decimal string as indexed
    #[serde(deserialize_with = "deserialize_decimal")]
    pub stored_borrow_balance: String,

    pub market: MarketRef,

    pub account: Account,
}

impl Position {
    /// Borrower address.
    pub fn borrower(&self) -> Address {
        self.account.id
    }

    /// Debt market address.
    pub fn market_id(&self) -> Address {
        self.market.id
    }
}

// Custom deserializers. The subgraph returns BigInt/BigDecimal as strings and
// Int as numbers, so both encodings are accepted.

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Float(f64),
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn deserialize_optional_address<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.is_empty() => {
            let address: Address = s.parse().map_err(serde::de::Error::custom)?;
            Ok((!address.is_zero()).then_some(address))
        }
        _ => Ok(None),
    }
}

fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Unsigned(n) => Ok(n),
        StringOrNumber::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        StringOrNumber::Float(f) => Err(serde::de::Error::custom(format!(
            "expected unsigned integer, got {f}"
        ))),
    }
}

// BigDecimal text is kept verbatim; exact amounts are read from the chain.
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => {
            let digits = s.strip_prefix('-').unwrap_or(&s);
            let valid = !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
                && digits.matches('.').count() <= 1;
            if valid {
                Ok(s)
            } else {
                Err(serde::de::Error::custom(format!("invalid decimal '{s}'")))
            }
        }
        StringOrNumber::Unsigned(n) => Ok(n.to_string()),
        StringOrNumber::Float(f) => Ok(f.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_market() {
        let json = r#"{
            "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9",
            "name": "Pledge USDT",
            "symbol": "pUSDT",
            "underlyingAddress": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "underlyingName": "Tether USD",
            "underlyingSymbol": "USDT",
            "accrualBlockNumber": 17000123,
            "blockTimestamp": 1700000000
        }"#;

        let market: Market = serde_json::from_str(json).unwrap();
        assert_eq!(market.symbol, "pUSDT");
        assert_eq!(market.accrual_block_number, 17_000_123);
        assert!(market.underlying_address.is_some());
        assert_eq!(market.block_time().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_native_market_has_no_underlying() {
        let json = r#"{
            "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9",
            "symbol": "pETH",
            "underlyingAddress": "0x0000000000000000000000000000000000000000",
            "accrualBlockNumber": "5"
        }"#;

        let market: Market = serde_json::from_str(json).unwrap();
        assert_eq!(market.underlying_address, None);
        assert_eq!(market.block_time(), None);
        assert_eq!(market.accrual_block_number, 5);
    }

    #[test]
    fn test_deserialize_position() {
        let json = r#"{
            "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9-0x0af3318c4060eac02d50e140de2fb0e492b59ecb",
            "symbol": "pUSDT",
            "pTokenBalance": "0",
            "accrualBlockNumber": "17000456",
            "storedBorrowBalance": "948.8563641597621272",
            "market": {
                "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9",
                "underlyingAddress": "0xdac17f958d2ee523a2206206994597c13d831ec7",
                "underlyingSymbol": "USDT"
            },
            "account": { "id": "0x0af3318c4060eac02d50e140de2fb0e492b59ecb" }
        }"#;

        let position: Position = serde_json::from_str(json).unwrap();
        assert_eq!(position.accrual_block_number, 17_000_456);
        assert_eq!(position.stored_borrow_balance, "948.8563641597621272");
        assert_eq!(position.ptoken_balance, "0");
        assert_eq!(
            format!("{:?}", position.borrower()).to_lowercase(),
            "0x0af3318c4060eac02d50e140de2fb0e492b59ecb"
        );
        assert_eq!(position.market_id(), position.market.id);
    }

    #[test]
    fn test_decimal_keeps_full_precision() {
        let json = r#"{
            "id": "m-a",
            "symbol": "pDAI",
            "pTokenBalance": 42,
            "accrualBlockNumber": 7,
            "storedBorrowBalance": "123456789012345678901234.000000000000000001",
            "market": { "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9" },
            "account": { "id": "0x0af3318c4060eac02d50e140de2fb0e492b59ecb" }
        }"#;

        let position: Position = serde_json::from_str(json).unwrap();
        assert_eq!(
            position.stored_borrow_balance,
            "123456789012345678901234.000000000000000001"
        );
        assert_eq!(position.ptoken_balance, "42");
    }

    #[test]
    fn test_rejects_malformed_decimal() {
        let json = r#"{
            "id": "m-a",
            "symbol": "pDAI",
            "pTokenBalance": "0",
            "accrualBlockNumber": 7,
            "storedBorrowBalance": "1.2.3",
            "market": { "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9" },
            "account": { "id": "0x0af3318c4060eac02d50e140de2fb0e492b59ecb" }
        }"#;
        assert!(serde_json::from_str::<Position>(json).is_err());
    }

    #[test]
    fn test_rejects_malformed_block_number() {
        let json = r#"{
            "id": "0x2a9c0ea9e3b2ba5d3dc4a2bb1f1e7a0e2f0e4bb9",
            "symbol": "pUSDT",
            "accrualBlockNumber": "latest"
        }"#;
        assert!(serde_json::from_str::<Market>(json).is_err());
    }
}
