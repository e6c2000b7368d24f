use crate::model::Ticket;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub hex: String,
    pub components: Vec<String>,
}

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// First eight bytes of the SHA-256 of `s`, used as a deterministic seed.
pub fn sha256_seed(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Content identity of a ticket: id, SQL and criteria.
///
/// The raw text is left out so that whitespace-only edits around the
/// extracted fields do not change the fingerprint.
pub fn ticket_fingerprint(ticket: &Ticket) -> Fingerprint {
    let parts = vec![
        format!("id={}", ticket.id),
        format!("sql={}", ticket.sql),
        format!("criteria={}", ticket.criteria),
        format!("ticketflow_version={}", env!("CARGO_PKG_VERSION")),
    ];

    let raw = parts.join("\n");
    Fingerprint {
        hex: sha256_hex(&raw),
        components: parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut t = Ticket {
            id: "HELIX-1".into(),
            sql: "SELECT 1".into(),
            criteria: "ROWCOUNT > 0".into(),
            ..Default::default()
        };
        let a = ticket_fingerprint(&t);
        t.raw_text = "noise".into();
        assert_eq!(a.hex, ticket_fingerprint(&t).hex);
        t.sql = "SELECT 2".into();
        assert_ne!(a.hex, ticket_fingerprint(&t).hex);
        assert_eq!(a.components.len(), 4);
    }

    #[test]
    fn test_seed_is_stable() {
        assert_eq!(sha256_seed("SELECT 1"), sha256_seed("SELECT 1"));
        assert_ne!(sha256_seed("SELECT 1"), sha256_seed("SELECT 2"));
    }
}
