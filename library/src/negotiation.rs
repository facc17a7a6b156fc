/*!
Offer/answer state machine, one instance per remote peer.

A [`Negotiator`] owns the connection object and drives it through
`Idle → HaveLocalOffer → Stable` when the local side offers and
`Idle → HaveRemoteOffer → Stable` when it answers. Every transition that produces a
description hands back exactly one [`SignalMessage`] for the signaling server.

Remote candidates that arrive before a remote description is set are queued and applied
in arrival order once it is. Whenever a negotiation is in flight a deadline is armed;
a step that does not finish before it, or [`Negotiator::expire`], abandons the negotiation.

When both peers offer at the same time, the peer with the larger [`ConnectionId`] backs off:
it rolls its offer back and answers. The other one ignores the colliding offer and waits
for the answer to its own.
*/

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use rendezvous_protocol::{ConnectionId, IceCandidate, SdpType, SessionDescription, SignalMessage};
use tokio::time::{self, Instant};

use crate::connection::PeerConnection;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
}

#[derive(Debug)]
pub struct Negotiator<C> {
    local: ConnectionId,
    remote: ConnectionId,
    connection: C,
    state: NegotiationState,
    has_remote_description: bool,
    pending_candidates: VecDeque<IceCandidate>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl<C: PeerConnection> Negotiator<C> {
    pub fn new(local: ConnectionId, remote: ConnectionId, connection: C, timeout: Duration) -> Self {
        Self {
            local,
            remote,
            connection,
            state: NegotiationState::Idle,
            has_remote_description: false,
            pending_candidates: VecDeque::new(),
            timeout,
            deadline: None,
        }
    }

    pub const fn state(&self) -> NegotiationState {
        self.state
    }

    pub const fn remote(&self) -> &ConnectionId {
        &self.remote
    }

    /// Instant at which the negotiation in flight is abandoned, `None` when nothing is in flight.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub const fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Local changes require a new offer. Ignored while a negotiation is in flight.
    ///
    /// # Errors
    /// [`Error::NegotiationFailed`] or [`Error::NegotiationTimedOut`] when the offer could not
    /// be created or applied. The state machine is back in `Idle` afterwards.
    pub async fn on_negotiation_needed(&mut self) -> Result<Option<SignalMessage>> {
        match self.state {
            NegotiationState::HaveLocalOffer | NegotiationState::HaveRemoteOffer => {
                debug!("negotiation with {} already in progress", self.remote);
                return Ok(None);
            }
            NegotiationState::Idle | NegotiationState::Stable => {}
        }

        let deadline = self.arm();
        match self.make_offer(deadline).await {
            Ok(offer) => {
                self.state = NegotiationState::HaveLocalOffer;
                info!("sending offer to {}", self.remote);
                Ok(Some(SignalMessage::Offer {
                    target: self.remote.clone(),
                    caller: self.local.clone(),
                    sdp: offer,
                }))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Remote peer sent an offer. Returns the answer, or `None` when the offer collided with
    /// our own and this side keeps its offer.
    ///
    /// # Errors
    /// - [`Error::ProtocolViolation`] for an offer from another peer or with an answer inside,
    /// - [`Error::NegotiationFailed`] or [`Error::NegotiationTimedOut`] when answering failed.
    pub async fn on_offer(
        &mut self,
        caller: &ConnectionId,
        offer: SessionDescription,
    ) -> Result<Option<SignalMessage>> {
        self.check_caller(caller)?;
        if offer.kind != SdpType::Offer {
            return Err(Error::violation(format!(
                "offer from {caller} carries {:?} description",
                offer.kind
            )));
        }

        let rollback = match self.state {
            NegotiationState::HaveLocalOffer if self.is_polite() => {
                info!("offer collision with {}, rolling back local offer", self.remote);
                true
            }
            NegotiationState::HaveLocalOffer => {
                info!("offer collision with {}, ignoring remote offer", self.remote);
                return Ok(None);
            }
            NegotiationState::Idle | NegotiationState::HaveRemoteOffer | NegotiationState::Stable => {
                false
            }
        };

        let deadline = self.arm();
        match self.make_answer(deadline, offer, rollback).await {
            Ok(answer) => {
                self.settle().await;
                info!("sending answer to {}", self.remote);
                Ok(Some(SignalMessage::Answer {
                    target: self.remote.clone(),
                    caller: self.local.clone(),
                    sdp: answer,
                }))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Remote peer answered our offer.
    ///
    /// # Errors
    /// - [`Error::ProtocolViolation`] when no offer of ours is pending, the state is left as is,
    /// - [`Error::NegotiationFailed`] or [`Error::NegotiationTimedOut`] when the answer could not be applied.
    pub async fn on_answer(&mut self, caller: &ConnectionId, answer: SessionDescription) -> Result<()> {
        self.check_caller(caller)?;
        if self.state != NegotiationState::HaveLocalOffer {
            return Err(Error::violation(format!(
                "unexpected answer from {caller} in state {:?}",
                self.state
            )));
        }
        if answer.kind != SdpType::Answer {
            return Err(Error::violation(format!(
                "answer from {caller} carries {:?} description",
                answer.kind
            )));
        }

        let deadline = match self.deadline {
            Some(deadline) => deadline,
            None => self.arm(),
        };
        let step = self.connection.set_remote_description(answer);
        match within(deadline, NegotiationState::HaveLocalOffer, step).await {
            Ok(()) => {
                self.has_remote_description = true;
                self.settle().await;
                info!("negotiation with {} is stable", self.remote);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Apply a remote candidate, or queue it while there is no remote description yet.
    /// A candidate the connection object refuses is logged and forgotten.
    pub async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.has_remote_description {
            self.apply(candidate).await;
        } else {
            debug!("queueing candidate from {} until remote description is set", self.remote);
            self.pending_candidates.push_back(candidate);
        }
    }

    /// Wrap a locally gathered candidate for the remote peer.
    pub fn local_candidate(&self, candidate: IceCandidate) -> SignalMessage {
        SignalMessage::Candidate {
            target: self.remote.clone(),
            candidate,
        }
    }

    /// Cancel whatever is in flight and forget queued candidates.
    pub fn abandon(&mut self) {
        if self.state != NegotiationState::Idle {
            info!("abandoning negotiation with {} in state {:?}", self.remote, self.state);
        }
        self.reset();
    }

    /// The deadline passed: abandon the negotiation and describe what timed out.
    pub fn expire(&mut self) -> Error {
        let state = self.state;
        warn!("negotiation with {} timed out in state {:?}", self.remote, state);
        self.reset();
        Error::NegotiationTimedOut(state)
    }

    /// Abandon the negotiation and close the connection object.
    pub async fn close(mut self) {
        self.abandon();
        self.connection.close().await;
    }

    fn is_polite(&self) -> bool {
        self.local > self.remote
    }

    fn check_caller(&self, caller: &ConnectionId) -> Result<()> {
        if *caller == self.remote {
            Ok(())
        } else {
            Err(Error::violation(format!(
                "message from {caller} on connection with {}",
                self.remote
            )))
        }
    }

    fn arm(&mut self) -> Instant {
        let deadline = Instant::now() + self.timeout;
        self.deadline = Some(deadline);
        deadline
    }

    fn reset(&mut self) {
        self.state = NegotiationState::Idle;
        self.has_remote_description = false;
        self.pending_candidates.clear();
        self.deadline = None;
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!("negotiation with {} failed: {}", self.remote, err);
        self.reset();
        err
    }

    async fn make_offer(&mut self, deadline: Instant) -> Result<SessionDescription> {
        let entering = NegotiationState::HaveLocalOffer;
        let offer = within(deadline, entering, self.connection.create_offer()).await?;
        within(
            deadline,
            entering,
            self.connection.set_local_description(offer.clone()),
        )
        .await?;
        Ok(offer)
    }

    async fn make_answer(
        &mut self,
        deadline: Instant,
        offer: SessionDescription,
        rollback: bool,
    ) -> Result<SessionDescription> {
        if rollback {
            within(deadline, NegotiationState::HaveLocalOffer, self.connection.rollback()).await?;
        }
        let entering = NegotiationState::HaveRemoteOffer;
        within(deadline, entering, self.connection.set_remote_description(offer)).await?;
        self.state = entering;
        self.has_remote_description = true;

        let answer = within(deadline, entering, self.connection.create_answer()).await?;
        within(
            deadline,
            entering,
            self.connection.set_local_description(answer.clone()),
        )
        .await?;
        Ok(answer)
    }

    async fn settle(&mut self) {
        self.state = NegotiationState::Stable;
        self.deadline = None;
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.apply(candidate).await;
        }
    }

    async fn apply(&mut self, candidate: IceCandidate) {
        debug!("adding candidate from {}: {:?}", self.remote, candidate);
        if let Err(err) = self.connection.add_ice_candidate(candidate).await {
            warn!("failed to add ICE candidate from {}: {:#}", self.remote, err);
        }
    }
}

async fn within<T>(
    deadline: Instant,
    state: NegotiationState,
    step: impl Future<Output = anyhow::Result<T>>,
) -> Result<T> {
    match time::timeout_at(deadline, step).await {
        Ok(result) => result.map_err(Error::NegotiationFailed),
        Err(_elapsed) => Err(Error::NegotiationTimedOut(state)),
    }
}
