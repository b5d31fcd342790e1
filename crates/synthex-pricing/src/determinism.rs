//! Settlement audit root.
//!
//! Each settlement reports a SHA-256 root over the entries it processed,
//! in processing order. Replaying the same pending queue against the same
//! rates must reproduce the same root.

use sha2::{Digest, Sha256};
use synthex_types::ExchangeEntry;

/// Hash the processed entries in order.
#[must_use]
pub fn compute_settlement_root(entries: &[ExchangeEntry]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"synthex:settlement_root:v1:");
    hasher.update((entries.len() as u64).to_le_bytes());

    for entry in entries {
        hasher.update(entry.id.0.as_bytes());
        hasher.update(entry.sequence.to_le_bytes());
        hasher.update(entry.account.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.source.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.destination.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.amount.to_string().as_bytes());
        hasher.update(entry.amount_received.to_string().as_bytes());
        hasher.update(entry.destination_rate.rate.to_string().as_bytes());
        hasher.update(entry.destination_rate.round_id.0.to_le_bytes());
    }

    let digest = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&digest);
    root
}

/// Hex form for logs and events.
#[must_use]
pub fn settlement_root_hex(root: &[u8; 32]) -> String {
    hex::encode(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn entry(seq: u64) -> ExchangeEntry {
        let mut e = ExchangeEntry::dummy("alice", Utc::now());
        e.sequence = seq;
        e
    }

    #[test]
    fn empty_root_deterministic() {
        assert_eq!(compute_settlement_root(&[]), compute_settlement_root(&[]));
    }

    #[test]
    fn order_matters() {
        let a = entry(1);
        let b = entry(2);
        let ab = compute_settlement_root(&[a.clone(), b.clone()]);
        let ba = compute_settlement_root(&[b, a]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn credited_amount_is_bound() {
        let a = entry(1);
        let mut tampered = a.clone();
        tampered.amount_received = dec!(49.86);
        assert_ne!(
            compute_settlement_root(&[a]),
            compute_settlement_root(&[tampered])
        );
    }

    #[test]
    fn hex_form() {
        let root = compute_settlement_root(&[entry(1)]);
        assert_eq!(settlement_root_hex(&root).len(), 64);
        assert_eq!(hex::decode(settlement_root_hex(&root)).unwrap(), root);
    }
}
