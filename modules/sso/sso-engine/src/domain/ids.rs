//! Ticket id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

const RANDOM_BYTES: usize = 32;

/// Generates `<PREFIX>-<seq>-<random>[-<suffix>]` ids.
///
/// The random part carries 256 bits from the thread-local CSPRNG, so ids
/// are unguessable; the sequence only makes them easy to tell apart in logs.
#[derive(Debug)]
pub struct TicketIdGenerator {
    seq: AtomicU64,
    suffix: Option<String>,
}

impl TicketIdGenerator {
    #[must_use]
    pub fn new(suffix: Option<String>) -> Self {
        Self {
            seq: AtomicU64::new(1),
            suffix: suffix.filter(|s| !s.is_empty()),
        }
    }

    pub fn next_id(&self, prefix: &str) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; RANDOM_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let random = URL_SAFE_NO_PAD.encode(bytes);
        match &self.suffix {
            Some(suffix) => format!("{prefix}-{seq}-{random}-{suffix}"),
            None => format!("{prefix}-{seq}-{random}"),
        }
    }
}

impl Default for TicketIdGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let ids = TicketIdGenerator::default();
        let generated: HashSet<_> = (0..1000).map(|_| ids.next_id("ST")).collect();
        assert_eq!(generated.len(), 1000);
        assert!(generated.iter().all(|id| id.starts_with("ST-")));
    }

    #[test]
    fn suffix_is_appended() {
        let ids = TicketIdGenerator::new(Some("node1".to_owned()));
        let id = ids.next_id("TGT");
        assert!(id.starts_with("TGT-1-"));
        assert!(id.ends_with("-node1"));
        // 32 bytes encode to 43 unpadded base64url characters
        let random = id
            .trim_start_matches("TGT-1-")
            .trim_end_matches("-node1");
        assert_eq!(random.len(), 43);
    }
}
