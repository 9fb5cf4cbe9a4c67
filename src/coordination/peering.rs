//! Mutual peer registration between two OFT deployments

use super::wait_failure;
use crate::chain::{ConfirmationWaiter, TokenBridge, TxConfirmation};
use crate::error::{ChainError, PeeringStep, TransferError, TransferResult};
use crate::events::{TransferEvent, TransferObserver};
use crate::tx::pad_address;

use futures::future::try_join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result of checking one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeeringOutcome {
    /// `isPeer` was already true; nothing submitted
    AlreadyLinked,
    /// `setPeer` submitted and confirmed
    Registered(TxConfirmation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionOutcome {
    /// `"<from> -> <to>"`
    pub direction: String,
    pub outcome: PeeringOutcome,
}

/// One side of the link: `from` must trust `to`'s contract for `to`'s endpoint id
struct Direction<'a> {
    from: &'a dyn TokenBridge,
    to: &'a dyn TokenBridge,
}

impl Direction<'_> {
    fn error(&self, step: PeeringStep, source: ChainError) -> TransferError {
        TransferError::Peering {
            direction: self.to_string(),
            step,
            source,
        }
    }
}

impl fmt::Display for Direction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.info().network, self.to.info().network)
    }
}

/// Registers two OFT contracts as each other's peers
pub struct PeerCoordinator {
    waiter: ConfirmationWaiter,
    observer: Arc<dyn TransferObserver>,
}

impl PeerCoordinator {
    pub fn new(waiter: ConfirmationWaiter, observer: Arc<dyn TransferObserver>) -> Self {
        Self { waiter, observer }
    }

    /// Ensure `a` trusts `b` and `b` trusts `a`
    ///
    /// Directions that are already linked are left alone. Both directions run
    /// concurrently since they touch different chains; the first failure aborts
    /// the call. Outcomes are returned as `[a -> b, b -> a]`.
    pub async fn ensure_mutual_peering(
        &self,
        a: &dyn TokenBridge,
        b: &dyn TokenBridge,
    ) -> TransferResult<Vec<DirectionOutcome>> {
        if a.info().endpoint_id == b.info().endpoint_id {
            return Err(TransferError::Configuration(format!(
                "cannot peer {} with {}: both use endpoint id {}",
                a.info().network,
                b.info().network,
                a.info().endpoint_id
            )));
        }

        let directions = [Direction { from: a, to: b }, Direction { from: b, to: a }];
        try_join_all(directions.iter().map(|d| self.ensure_direction(d))).await
    }

    async fn ensure_direction(
        &self,
        direction: &Direction<'_>,
    ) -> TransferResult<DirectionOutcome> {
        let from = direction.from.info();
        let to = direction.to.info();
        let peer = pad_address(to.contract_address);

        let linked = direction
            .from
            .is_peer(to.endpoint_id, peer)
            .await
            .map_err(|e| direction.error(PeeringStep::Query, e))?;

        if linked {
            self.observer.on_event(&TransferEvent::PeerAlreadyLinked {
                from: from.network.clone(),
                to: to.network.clone(),
            });
            return Ok(DirectionOutcome {
                direction: direction.to_string(),
                outcome: PeeringOutcome::AlreadyLinked,
            });
        }

        debug!(
            "Registering {:?} (eid {}) as peer on {}",
            to.contract_address, to.endpoint_id, from.network
        );

        let tx_hash = direction
            .from
            .set_peer(to.endpoint_id, peer)
            .await
            .map_err(|e| direction.error(PeeringStep::Register, e))?;

        self.observer.on_event(&TransferEvent::PeerRegistrationSubmitted {
            from: from.network.clone(),
            to: to.network.clone(),
            tx_hash,
        });

        let stage = format!("peer registration ({})", direction);
        let confirmation = self
            .waiter
            .wait(direction.from, tx_hash)
            .await
            .map_err(|e| {
                wait_failure(e, from, &stage, tx_hash, |source| {
                    direction.error(PeeringStep::Confirm, source)
                })
            })?;

        self.observer.on_event(&TransferEvent::PeerRegistered {
            from: from.network.clone(),
            to: to.network.clone(),
            tx_hash,
            block_number: confirmation.block_number,
        });

        Ok(DirectionOutcome {
            direction: direction.to_string(),
            outcome: PeeringOutcome::Registered(confirmation),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::{Call, FakeBridge};
    use crate::chain::{ChainInfo, MockTokenBridge};
    use crate::events::RecordingObserver;
    use ethers::types::Address;
    use std::time::Duration;

    const SEPOLIA: u32 = 40161;
    const BASE_SEPOLIA: u32 = 40245;

    fn sepolia() -> FakeBridge {
        FakeBridge::new("sepolia", SEPOLIA, 0xaa, 0x01)
    }

    fn base_sepolia() -> FakeBridge {
        FakeBridge::new("baseSepolia", BASE_SEPOLIA, 0xbb, 0x02)
    }

    fn coordinator(observer: Arc<RecordingObserver>) -> PeerCoordinator {
        PeerCoordinator::new(
            ConfirmationWaiter::new(1, Duration::from_millis(200), Duration::from_millis(5)),
            observer,
        )
    }

    fn is_set_peer(call: &Call) -> bool {
        matches!(call, Call::SetPeer { .. })
    }

    #[tokio::test]
    async fn test_fresh_pair_registers_both_directions() {
        let a = sepolia();
        let b = base_sepolia();
        let observer = Arc::new(RecordingObserver::default());

        let outcomes = coordinator(observer.clone())
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].direction, "sepolia -> baseSepolia");
        assert_eq!(outcomes[1].direction, "baseSepolia -> sepolia");
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.outcome, PeeringOutcome::Registered(_))));

        // each side stores the other's contract, left-padded to 32 bytes
        let mut expected_on_a = [0u8; 32];
        expected_on_a[12..].copy_from_slice(&[0xbb; 20]);
        assert!(a.calls().contains(&Call::SetPeer {
            eid: BASE_SEPOLIA,
            peer: expected_on_a,
        }));
        assert!(b.calls().contains(&Call::SetPeer {
            eid: SEPOLIA,
            peer: pad_address(Address::repeat_byte(0xaa)),
        }));

        let names = observer.names();
        assert_eq!(names.iter().filter(|n| **n == "peer_registered").count(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let a = sepolia();
        let b = base_sepolia();
        let coordinator = coordinator(Arc::new(RecordingObserver::default()));

        coordinator.ensure_mutual_peering(&a, &b).await.unwrap();
        a.clear_calls();
        b.clear_calls();

        let outcomes = coordinator.ensure_mutual_peering(&a, &b).await.unwrap();

        assert!(outcomes
            .iter()
            .all(|o| o.outcome == PeeringOutcome::AlreadyLinked));
        assert_eq!(a.count(is_set_peer), 0);
        assert_eq!(b.count(is_set_peer), 0);
    }

    #[tokio::test]
    async fn test_only_missing_direction_is_registered() {
        let a = sepolia().with_peer(BASE_SEPOLIA, pad_address(Address::repeat_byte(0xbb)));
        let b = base_sepolia();

        let outcomes = coordinator(Arc::new(RecordingObserver::default()))
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap();

        assert_eq!(outcomes[0].outcome, PeeringOutcome::AlreadyLinked);
        assert!(matches!(outcomes[1].outcome, PeeringOutcome::Registered(_)));
        assert_eq!(a.count(is_set_peer), 0);
        assert_eq!(b.count(is_set_peer), 1);
    }

    #[tokio::test]
    async fn test_query_failure_reports_direction_and_step() {
        let mut a = MockTokenBridge::new();
        a.expect_info().return_const(ChainInfo {
            network: "sepolia".into(),
            endpoint_id: SEPOLIA,
            contract_address: Address::repeat_byte(0xaa),
            signer: Address::repeat_byte(0x01),
        });
        a.expect_is_peer()
            .returning(|_, _| Err(ChainError::Rpc("connection refused".into())));
        a.expect_set_peer().never();
        let b = base_sepolia().with_peer(SEPOLIA, pad_address(Address::repeat_byte(0xaa)));

        let err = coordinator(Arc::new(RecordingObserver::default()))
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap_err();

        match err {
            TransferError::Peering {
                direction, step, ..
            } => {
                assert_eq!(direction, "sepolia -> baseSepolia");
                assert_eq!(step, PeeringStep::Query);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reverted_registration_fails_at_confirm_step() {
        let a = sepolia().with_peer(BASE_SEPOLIA, pad_address(Address::repeat_byte(0xbb)));
        let b = base_sepolia().reverting_set_peer();

        let err = coordinator(Arc::new(RecordingObserver::default()))
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::Peering {
                step: PeeringStep::Confirm,
                source: ChainError::Reverted { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stalled_registration_times_out() {
        let a = sepolia();
        let b = base_sepolia().with_peer(SEPOLIA, pad_address(Address::repeat_byte(0xaa)));
        a.stall_confirmations();
        let observer = Arc::new(RecordingObserver::default());

        let err = coordinator(observer.clone())
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap_err();

        // timeouts keep the general kind; the stage names the direction
        assert_eq!(err.kind(), "confirmation_timeout");
        assert!(err.to_string().contains("sepolia -> baseSepolia"));
        match err {
            TransferError::ConfirmationTimeout { network, stage, .. } => {
                assert_eq!(network, "sepolia");
                assert_eq!(stage, "peer registration (sepolia -> baseSepolia)");
            }
            other => panic!("unexpected error: {other}"),
        }

        let names = observer.names();
        assert!(names.contains(&"peer_registration_submitted"));
        assert!(!names.contains(&"peer_registered"));
    }

    #[tokio::test]
    async fn test_same_endpoint_id_is_rejected() {
        let a = sepolia();
        let b = FakeBridge::new("sepolia-copy", SEPOLIA, 0xcc, 0x03);

        let err = coordinator(Arc::new(RecordingObserver::default()))
            .ensure_mutual_peering(&a, &b)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Configuration(_)));
        assert!(a.calls().is_empty());
    }
}
