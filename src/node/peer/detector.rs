//! Threshold failure detector.
//!
//! A probe "fails" when the liveness request cannot be delivered, not when
//! no reply comes back. Each failure is counted against the peer; at the
//! threshold the peer is declared dead and every configured seed is told.
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::commands::{Effects, Outbound};
use super::membership::{FailureVerdict, Membership};
use crate::node::messages::{DeadNodeReport, LivenessProbe, Timestamp, WireMessage};
use crate::node::NodeAddress;
use crate::settings::FailurePolicy;

#[derive(Clone, Copy, Debug)]
pub struct FailureDetector {
    pub threshold: u32,
    pub policy: FailurePolicy,
}

impl FailureDetector {
    pub fn new(threshold: u32, policy: FailurePolicy) -> Self {
        Self { threshold, policy }
    }

    /// Probe rounds: the first `delay` after start, then one every `period`
    pub fn schedule(delay: Duration, period: Duration) -> Interval {
        let mut ticker = interval_at(Instant::now() + delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Send a liveness request to every peer not marked dead
    pub fn probe_round(&self, membership: &Membership, now: Timestamp) -> Effects {
        let message = WireMessage::LivenessRequest(LivenessProbe {
            timestamp: now,
            sender_port: membership.local().port,
        });
        let outbound: Vec<Outbound> = membership
            .active_peers()
            .into_iter()
            .map(|peer| Outbound::Probe {
                peer,
                message: message.clone(),
            })
            .collect();
        debug!(
            "[{}] Probe round: {} peers",
            membership.local(),
            outbound.len()
        );
        Effects {
            outbound,
            events: Vec::new(),
        }
    }

    pub fn on_probe_result(
        &self,
        membership: &mut Membership,
        peer: &NodeAddress,
        ok: bool,
        now: Timestamp,
    ) -> Effects {
        if ok {
            membership.record_probe_success(peer, self.policy);
            return Effects::none();
        }

        match membership.record_failure(peer, self.threshold) {
            FailureVerdict::Suspect(failures) => {
                warn!(
                    "[{}] Failed to send liveness request to {} ({}/{})",
                    membership.local(),
                    peer,
                    failures,
                    self.threshold
                );
                Effects::none()
            }
            FailureVerdict::ThresholdReached(_) => self.declare_dead(membership, peer, now),
            FailureVerdict::AlreadyDead | FailureVerdict::Unknown => Effects::none(),
        }
    }

    /// Mark the peer dead and report it to every seed. A peer is reported at most once.
    pub fn declare_dead(
        &self,
        membership: &mut Membership,
        peer: &NodeAddress,
        now: Timestamp,
    ) -> Effects {
        if !membership.mark_dead(peer) {
            return Effects::none();
        }
        let message = WireMessage::DeadNode(DeadNodeReport {
            dead: peer.clone(),
            timestamp: now,
            reporter_host: membership.local().host.clone(),
        });
        info!(
            "[{}] Declared {} dead, reporting to {} seeds",
            membership.local(),
            peer,
            membership.seeds().len()
        );
        Effects {
            outbound: membership
                .seeds()
                .iter()
                .map(|seed| Outbound::DeadReport {
                    seed: seed.clone(),
                    message: message.clone(),
                })
                .collect(),
            events: vec![message.encode()],
        }
    }

    /// Always answer a liveness request, whatever our view of the sender
    pub fn on_liveness_request(
        &self,
        membership: &Membership,
        requester: NodeAddress,
        now: Timestamp,
    ) -> Effects {
        let reply = WireMessage::LivenessReply(LivenessProbe {
            timestamp: now,
            sender_port: membership.local().port,
        });
        Effects {
            outbound: vec![Outbound::Reply {
                target: requester,
                message: reply,
            }],
            events: Vec::new(),
        }
    }

    pub fn on_liveness_reply(&self, membership: &mut Membership, from: &NodeAddress, now: Timestamp) {
        if membership.record_reply(from, self.policy, now) {
            debug!("[{}] Liveness reply from {}", membership.local(), from);
        }
    }
}
