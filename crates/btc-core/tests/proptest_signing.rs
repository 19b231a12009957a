use proptest::prelude::*;

use btc_core::{Address, EcKey, MultisigState, Network, Script, Transaction};

fn keys() -> Vec<EcKey> {
    (1u8..=3)
        .map(|tag| EcKey::from_secret_bytes(&[tag; 32], true).unwrap())
        .collect()
}

/// Split a key order into rounds. A `true` in `cuts` ends the round after
/// that key; each round may also re-present keys listed in `repeats`.
fn rounds(order: &[usize], cuts: &[bool], repeats: &[usize]) -> Vec<Vec<usize>> {
    let mut rounds = Vec::new();
    let mut current = Vec::new();
    for (i, &k) in order.iter().enumerate() {
        if let Some(&r) = repeats.get(i) {
            current.push(r);
        }
        current.push(k);
        if cuts[i] {
            rounds.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        rounds.push(current);
    }
    rounds
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn multisig_rounds_converge(
        required in 1usize..=3,
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        cuts in prop::collection::vec(any::<bool>(), 3),
        repeats in prop::collection::vec(0usize..3, 0..3),
    ) {
        let keys = keys();
        let pubkeys: Vec<Vec<u8>> = keys.iter().map(|k| k.public_key().to_vec()).collect();
        let vault = Address::create_multisig(required, &pubkeys, Network::Mainnet).unwrap();
        let redeem = vault.redeem_script().unwrap().clone();

        let mut tx = Transaction::new();
        tx.add_input_spending([0x5a; 32], 0, vault.script_pubkey())
            .add_output_to(&vault, 10_000);

        let mut total = 0;
        for round in rounds(&order, &cuts, &repeats) {
            // every round runs on a fresh copy rebuilt from the wire
            let mut copy = Transaction::from_hex(&tx.to_hex().unwrap()).unwrap();
            let presented: Vec<EcKey> = round.iter().map(|&i| keys[i].clone()).collect();
            total += copy.sign_with_multisig(&presented, &redeem).unwrap();
            tx = copy;
        }

        prop_assert_eq!(total, required);
        prop_assert_eq!(tx.multisig_state(0, &redeem).unwrap(), MultisigState::FullySigned);

        let chunks = tx.inputs[0].script.chunks().unwrap();
        let sigs: Vec<&[u8]> = chunks[1..=required].iter().map(|c| c.data().unwrap()).collect();
        let mut signers = Vec::new();
        for sig in &sigs {
            let signer = keys
                .iter()
                .position(|k| tx.verify_input_signature(0, &redeem, k.public_key(), sig).unwrap());
            prop_assert!(signer.is_some());
            signers.push(signer);
        }
        signers.sort();
        signers.dedup();
        prop_assert_eq!(signers.len(), required);
    }

    #[test]
    fn resigning_never_duplicates(required in 1usize..=3, key_index in 0usize..3, times in 1usize..4) {
        let keys = keys();
        let pubkeys: Vec<Vec<u8>> = keys.iter().map(|k| k.public_key().to_vec()).collect();
        let vault = Address::create_multisig(required, &pubkeys, Network::Mainnet).unwrap();
        let redeem = vault.redeem_script().unwrap().clone();

        let mut tx = Transaction::new();
        tx.add_input_spending([0x11; 32], 3, vault.script_pubkey());

        let presented = vec![keys[key_index].clone(); times];
        prop_assert_eq!(tx.sign_with_multisig(&presented, &redeem).unwrap(), 1);
        prop_assert_eq!(tx.sign_with_multisig(&presented, &redeem).unwrap(), 0);

        let expected = if required == 1 { MultisigState::FullySigned } else { MultisigState::PartiallySigned(1) };
        prop_assert_eq!(tx.multisig_state(0, &redeem).unwrap(), expected);
    }

    #[test]
    fn single_key_signature_verifies(tag in 1u8..=200, value in 1u64..=21_000_000) {
        let key = EcKey::from_secret_bytes(&[tag; 32], tag % 2 == 0).unwrap();
        let locking = Script::p2pkh(key.pubkey_hash());
        let mut tx = Transaction::new();
        tx.add_input_spending([tag; 32], u32::from(tag), locking.clone())
            .add_output_to(&key.address(Network::Testnet), value);
        let unsigned = tx.clone();

        prop_assert_eq!(tx.sign_with_key(&key).unwrap(), 1);
        let chunks = tx.inputs[0].script.chunks().unwrap();
        let sig = chunks[0].data().unwrap();
        prop_assert!(unsigned.verify_input_signature(0, &locking, key.public_key(), sig).unwrap());
    }
}
