use std::fmt;

use crypto_utils::hash::hash160;

use crate::base58;
use crate::error::BtcError;
use crate::network::NetworkParams;
use crate::script::{Script, MAX_MULTISIG_KEYS};

/// Length of the hash committed to by every address.
pub const ADDRESS_HASH_LEN: usize = 20;

/// A version byte plus a 20-byte hash of either a public key or a redeem
/// script.
///
/// Multisig addresses built with [`Address::create_multisig`] also carry
/// the redeem script they commit to; parsed addresses never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    version: u8,
    hash: [u8; ADDRESS_HASH_LEN],
    redeem_script: Option<Script>,
    script_hash_version: u8,
}

impl Address {
    /// Build an address from a raw hash and version byte.
    pub fn new(
        hash: &[u8],
        version: u8,
        network: impl Into<NetworkParams>,
    ) -> Result<Self, BtcError> {
        let params = network.into();
        let hash: [u8; ADDRESS_HASH_LEN] = hash.try_into().map_err(|_| {
            BtcError::InvalidArgument(format!(
                "address hash must be {ADDRESS_HASH_LEN} bytes, got {}",
                hash.len()
            ))
        })?;
        if !params.is_address_version(version) {
            return Err(BtcError::UnsupportedVersion(version));
        }

        Ok(Self {
            version,
            hash,
            redeem_script: None,
            script_hash_version: params.script_hash_version(),
        })
    }

    /// Parse a Base58Check address string.
    pub fn from_string(s: &str, network: impl Into<NetworkParams>) -> Result<Self, BtcError> {
        let payload = base58::decode_checked(s)?;
        if payload.len() != 1 + ADDRESS_HASH_LEN {
            return Err(BtcError::Format(format!(
                "address payload must be {} bytes, got {}",
                1 + ADDRESS_HASH_LEN,
                payload.len()
            )));
        }
        Self::new(&payload[1..], payload[0], network)
    }

    /// Pubkey-hash address of an encoded public key.
    pub fn from_public_key(pubkey: &[u8], network: impl Into<NetworkParams>) -> Self {
        let params = network.into();
        Self {
            version: params.pubkey_hash_version(),
            hash: hash160(pubkey),
            redeem_script: None,
            script_hash_version: params.script_hash_version(),
        }
    }

    /// Script-hash address of an `required`-of-`pubkeys.len()` redeem script.
    ///
    /// Every key must have a SEC1 shape: 33 bytes with a 0x02/0x03 prefix or
    /// 65 bytes with 0x04.
    pub fn create_multisig(
        required: usize,
        pubkeys: &[Vec<u8>],
        network: impl Into<NetworkParams>,
    ) -> Result<Self, BtcError> {
        let params = network.into();
        let limit = pubkeys.len().min(MAX_MULTISIG_KEYS);
        if required > limit {
            return Err(BtcError::InvalidArgument(format!(
                "required signatures must be between 0 and {limit}, got {required}"
            )));
        }
        if let Some(pos) = pubkeys.iter().position(|k| !is_sec1_shaped(k)) {
            return Err(BtcError::InvalidArgument(format!(
                "public key {pos} is not a well-formed SEC1 encoding"
            )));
        }

        let redeem = Script::multisig(required, pubkeys)?;
        Ok(Self {
            version: params.script_hash_version(),
            hash: hash160(redeem.as_bytes()),
            redeem_script: Some(redeem),
            script_hash_version: params.script_hash_version(),
        })
    }

    /// Whether `s` parses as an address of `network`.
    pub fn validate(s: &str, network: impl Into<NetworkParams>) -> bool {
        Self::from_string(s, network).is_ok()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash(&self) -> &[u8; ADDRESS_HASH_LEN] {
        &self.hash
    }

    pub fn redeem_script(&self) -> Option<&Script> {
        self.redeem_script.as_ref()
    }

    pub fn is_script_hash(&self) -> bool {
        self.version == self.script_hash_version
    }

    pub fn is_pubkey_hash(&self) -> bool {
        !self.is_script_hash()
    }

    /// The locking script that pays to this address.
    pub fn script_pubkey(&self) -> Script {
        if self.is_script_hash() {
            Script::p2sh(&self.hash)
        } else {
            Script::p2pkh(&self.hash)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(1 + ADDRESS_HASH_LEN);
        payload.push(self.version);
        payload.extend_from_slice(&self.hash);
        f.write_str(&base58::encode_checked(&payload))
    }
}

fn is_sec1_shaped(key: &[u8]) -> bool {
    match key.first() {
        Some(0x02 | 0x03) => key.len() == 33,
        Some(0x04) => key.len() == 65,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    const G_HASH: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";
    const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn g_hash() -> Vec<u8> {
        hex::decode(G_HASH).unwrap()
    }

    fn test_keys() -> Vec<Vec<u8>> {
        [
            G_COMPRESSED,
            "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
            "02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
        ]
        .iter()
        .map(|k| hex::decode(k).unwrap())
        .collect()
    }

    #[test]
    fn mainnet_pubkey_hash_address() {
        let addr = Address::new(&g_hash(), 0x00, Network::Mainnet).unwrap();
        assert_eq!(addr.to_string(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert!(addr.is_pubkey_hash());
        assert!(addr.redeem_script().is_none());
    }

    #[test]
    fn testnet_addresses() {
        let p2pkh = Address::new(&g_hash(), 0x6F, Network::Testnet).unwrap();
        assert_eq!(p2pkh.to_string(), "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r");

        let p2sh = Address::new(&g_hash(), 0xC4, Network::Testnet).unwrap();
        assert_eq!(p2sh.to_string(), "2N3vVYSK5XRgVSGWy21PnsRmBUywSQNdCsf");
        assert!(p2sh.is_script_hash());
    }

    #[test]
    fn from_public_key_hashes_the_key() {
        let pubkey = hex::decode(G_COMPRESSED).unwrap();
        let addr = Address::from_public_key(&pubkey, Network::Mainnet);
        assert_eq!(addr.hash().as_slice(), g_hash().as_slice());
        assert_eq!(addr.version(), 0x00);
    }

    #[test]
    fn parse_roundtrip_both_versions() {
        for version in [0x00, 0x05] {
            let addr = Address::new(&g_hash(), version, Network::Mainnet).unwrap();
            let parsed = Address::from_string(&addr.to_string(), Network::Mainnet).unwrap();
            assert_eq!(parsed.version(), version);
            assert_eq!(parsed.hash(), addr.hash());
        }
    }

    #[test]
    fn wrong_network_is_unsupported_version() {
        let err = Address::from_string("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Testnet)
            .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedVersion(0x00)));
        assert!(!Address::validate("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Testnet));
        assert!(Address::validate("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Mainnet));
    }

    #[test]
    fn corrupted_address_fails_checksum() {
        let err = Address::from_string("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ", Network::Mainnet)
            .unwrap_err();
        assert!(matches!(err, BtcError::Checksum));
    }

    #[test]
    fn wrong_hash_length_rejected() {
        let err = Address::new(&[0u8; 19], 0x00, Network::Mainnet).unwrap_err();
        assert!(matches!(err, BtcError::InvalidArgument(_)));

        let short = base58::encode_checked(&[0x00; 10]);
        assert!(matches!(
            Address::from_string(&short, Network::Mainnet),
            Err(BtcError::Format(_))
        ));
    }

    #[test]
    fn multisig_address_commits_to_redeem_script() {
        let addr = Address::create_multisig(2, &test_keys(), Network::Mainnet).unwrap();
        assert_eq!(addr.to_string(), "33hG2q39jRi2NqicRJB4ggY1J8EJm97Szz");
        assert!(addr.is_script_hash());

        let redeem = addr.redeem_script().unwrap();
        assert_eq!(hash160(redeem.as_bytes()), *addr.hash());
        assert_eq!(redeem.multisig_required().unwrap(), 2);
    }

    #[test]
    fn multisig_parameter_validation() {
        let keys = test_keys();
        assert!(matches!(
            Address::create_multisig(4, &keys, Network::Mainnet),
            Err(BtcError::InvalidArgument(_))
        ));

        let mut bad = keys.clone();
        bad[1] = vec![0x05; 33];
        assert!(matches!(
            Address::create_multisig(1, &bad, Network::Mainnet),
            Err(BtcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn script_pubkey_matches_kind() {
        let p2pkh = Address::new(&g_hash(), 0x00, Network::Mainnet).unwrap();
        assert_eq!(p2pkh.script_pubkey().to_hex(), format!("76a914{G_HASH}88ac"));

        let p2sh = Address::new(&g_hash(), 0x05, Network::Mainnet).unwrap();
        assert_eq!(p2sh.script_pubkey().to_hex(), format!("a914{G_HASH}87"));
    }

    #[test]
    fn custom_params_are_accepted() {
        let params = NetworkParams::new(0x30, 0x32, 0xB0).unwrap();
        let addr = Address::new(&g_hash(), 0x30, params).unwrap();
        let parsed = Address::from_string(&addr.to_string(), params).unwrap();
        assert_eq!(parsed, addr);
    }
}
