use serde::{Deserialize, Serialize};

use crate::error::BtcError;

/// The two named network configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Version bytes and key prefix for this network.
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams::MAINNET,
            Network::Testnet => NetworkParams::TESTNET,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Version bytes fixed by a network: pubkey-hash address, script-hash
/// address and exported private key prefix.
///
/// Passed explicitly into every Address and key constructor. Values built
/// through [`NetworkParams::new`] or deserialized are always validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawNetworkParams")]
pub struct NetworkParams {
    pubkey_hash_version: u8,
    script_hash_version: u8,
    private_key_prefix: u8,
}

#[derive(Deserialize)]
struct RawNetworkParams {
    pubkey_hash_version: u8,
    script_hash_version: u8,
    private_key_prefix: u8,
}

impl TryFrom<RawNetworkParams> for NetworkParams {
    type Error = BtcError;

    fn try_from(raw: RawNetworkParams) -> Result<Self, Self::Error> {
        NetworkParams::new(
            raw.pubkey_hash_version,
            raw.script_hash_version,
            raw.private_key_prefix,
        )
    }
}

impl NetworkParams {
    pub const MAINNET: NetworkParams = NetworkParams {
        pubkey_hash_version: 0x00,
        script_hash_version: 0x05,
        private_key_prefix: 0x80,
    };

    pub const TESTNET: NetworkParams = NetworkParams {
        pubkey_hash_version: 0x6F,
        script_hash_version: 0xC4,
        private_key_prefix: 0xEF,
    };

    /// Build a custom parameter set. The two address versions must differ,
    /// otherwise an address string could not say which kind it is.
    pub fn new(
        pubkey_hash_version: u8,
        script_hash_version: u8,
        private_key_prefix: u8,
    ) -> Result<Self, BtcError> {
        if pubkey_hash_version == script_hash_version {
            return Err(BtcError::InvalidArgument(format!(
                "pubkey-hash and script-hash versions are both 0x{pubkey_hash_version:02x}"
            )));
        }
        Ok(Self {
            pubkey_hash_version,
            script_hash_version,
            private_key_prefix,
        })
    }

    pub fn pubkey_hash_version(&self) -> u8 {
        self.pubkey_hash_version
    }

    pub fn script_hash_version(&self) -> u8 {
        self.script_hash_version
    }

    pub fn private_key_prefix(&self) -> u8 {
        self.private_key_prefix
    }

    /// Whether `version` is one of the two address versions of this network.
    pub fn is_address_version(&self, version: u8) -> bool {
        version == self.pubkey_hash_version || version == self.script_hash_version
    }
}

impl From<Network> for NetworkParams {
    fn from(network: Network) -> Self {
        network.params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_versions() {
        let p = Network::Mainnet.params();
        assert_eq!(p.pubkey_hash_version(), 0x00);
        assert_eq!(p.script_hash_version(), 0x05);
        assert_eq!(p.private_key_prefix(), 0x80);
    }

    #[test]
    fn testnet_versions() {
        let p = NetworkParams::from(Network::Testnet);
        assert_eq!(p.pubkey_hash_version(), 0x6F);
        assert_eq!(p.script_hash_version(), 0xC4);
        assert_eq!(p.private_key_prefix(), 0xEF);
    }

    #[test]
    fn address_version_membership() {
        let p = NetworkParams::MAINNET;
        assert!(p.is_address_version(0x00));
        assert!(p.is_address_version(0x05));
        assert!(!p.is_address_version(0x6F));
    }

    #[test]
    fn custom_params_reject_equal_versions() {
        assert!(matches!(
            NetworkParams::new(0x30, 0x30, 0xB0),
            Err(BtcError::InvalidArgument(_))
        ));
        assert!(NetworkParams::new(0x30, 0x32, 0xB0).is_ok());
    }

    #[test]
    fn network_deserializes_from_lowercase_name() {
        let n: Network = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(n, Network::Testnet);
        assert_eq!(serde_json::to_string(&Network::Mainnet).unwrap(), "\"mainnet\"");
    }

    #[test]
    fn params_load_from_json() {
        let json = r#"{"pubkey_hash_version":48,"script_hash_version":50,"private_key_prefix":176}"#;
        let p: NetworkParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.pubkey_hash_version(), 48);
        assert_eq!(p.script_hash_version(), 50);
        assert_eq!(p.private_key_prefix(), 176);
    }

    #[test]
    fn params_json_with_clashing_versions_is_rejected() {
        let json = r#"{"pubkey_hash_version":5,"script_hash_version":5,"private_key_prefix":128}"#;
        assert!(serde_json::from_str::<NetworkParams>(json).is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }
}
