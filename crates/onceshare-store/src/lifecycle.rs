//! Secret lifecycle state machine
//!
//! ```text
//!            fetch (last view)
//! Created ─────────────────────► Retrieved   (terminal, purged)
//!    │ ▲  fetch (views remain)
//!    │ └──┘
//!    │ expires_at reached
//!    └──────────────────────────► Expired     (terminal, purged)
//! ```
//!
//! There is no update path: a `SecretId` is written once and then only consumed.
//! Terminal states are never visible outside the store; callers see `SecretNotFound`.

use onceshare_core::{EncryptedPayload, SecretId, SecretRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretState {
    Created,
    Retrieved,
    Expired,
}

impl SecretState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SecretState::Created)
    }
}

/// Result of applying one fetch to a record.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The payload is handed out; `state` is the record's state afterwards.
    Deliver {
        payload: EncryptedPayload,
        state: SecretState,
    },
    /// Nothing to hand out; the record is already terminal.
    Gone(SecretState),
}

/// Build the record for a freshly created secret.
pub fn new_record(
    id: SecretId,
    payload: EncryptedPayload,
    expires_at: u64,
    max_views: u32,
) -> SecretRecord {
    SecretRecord {
        id,
        payload,
        expires_at,
        remaining_views: max_views.max(1),
    }
}

/// State of `record` at Unix time `now`. Expiry wins over remaining views.
pub fn state_at(record: &SecretRecord, now: u64) -> SecretState {
    if now >= record.expires_at {
        SecretState::Expired
    } else if record.remaining_views == 0 {
        SecretState::Retrieved
    } else {
        SecretState::Created
    }
}

/// Apply one fetch. The caller must hold exclusive access to `record` and purge
/// it whenever the resulting state is terminal.
pub fn fetch(record: &mut SecretRecord, now: u64) -> FetchOutcome {
    match state_at(record, now) {
        SecretState::Created => {
            record.remaining_views -= 1;
            FetchOutcome::Deliver {
                payload: record.payload.clone(),
                state: state_at(record, now),
            }
        }
        terminal => FetchOutcome::Gone(terminal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onceshare_core::Format;
    use proptest::prelude::*;

    fn payload() -> EncryptedPayload {
        EncryptedPayload {
            ciphertext: vec![1; 32],
            nonce: vec![2; 24],
            format: Format::Text,
            password: None,
            created_at: 0,
        }
    }

    #[test]
    fn one_time_secret_is_retrieved_once() {
        let mut record = new_record(SecretId::generate(), payload(), 100, 1);
        assert_eq!(state_at(&record, 10), SecretState::Created);

        match fetch(&mut record, 10) {
            FetchOutcome::Deliver { state, .. } => assert_eq!(state, SecretState::Retrieved),
            other => panic!("expected delivery, got {other:?}"),
        }
        assert!(matches!(
            fetch(&mut record, 11),
            FetchOutcome::Gone(SecretState::Retrieved)
        ));
    }

    #[test]
    fn zero_views_means_one() {
        let record = new_record(SecretId::generate(), payload(), 100, 0);
        assert_eq!(record.remaining_views, 1);
    }

    #[test]
    fn expired_never_delivers() {
        let mut record = new_record(SecretId::generate(), payload(), 100, 5);
        assert!(matches!(
            fetch(&mut record, 100),
            FetchOutcome::Gone(SecretState::Expired)
        ));
        assert_eq!(record.remaining_views, 5, "an expired fetch consumes nothing");
    }

    #[test]
    fn terminal_states() {
        assert!(!SecretState::Created.is_terminal());
        assert!(SecretState::Retrieved.is_terminal());
        assert!(SecretState::Expired.is_terminal());
    }

    proptest! {
        #[test]
        fn deliveries_never_exceed_views(views in 1u32..20, attempts in 0usize..40) {
            let mut record = new_record(SecretId::generate(), payload(), u64::MAX, views);
            let delivered = (0..attempts)
                .filter(|_| matches!(fetch(&mut record, 1), FetchOutcome::Deliver { .. }))
                .count();
            prop_assert_eq!(delivered, attempts.min(views as usize));
        }
    }
}
