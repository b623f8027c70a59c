//! Side channel for logging, telemetry and presentation.
//!
//! The orchestrator reports what it decided through an [`AuthObserver`] instead of logging
//! inline. [`LogObserver`] writes events to the `log` facade; [`ChannelObserver`] forwards
//! them to a presentation layer.

use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::authenticator::AuthenticatorSet;
use crate::capability::CapabilityOutcome;
use crate::enrollment::{EnrollmentIntent, EnrollmentOutcome};
use crate::result::AuthenticationResult;
use crate::session::SessionId;

/// Something the orchestrator did or observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A capability query finished.
    CapabilityClassified {
        /// The classes that were asked about.
        requested: AuthenticatorSet,
        /// The classification.
        outcome: CapabilityOutcome,
    },
    /// The oracle returned a value the classifier does not know; it was treated as unknown.
    ClassificationAmbiguous {
        /// The raw platform code.
        code: i32,
    },
    /// Nothing is enrolled; the user should be routed to enrollment.
    PromptEnrollment {
        /// Where to send the user.
        intent: EnrollmentIntent,
    },
    /// The enrollment round-trip came back and capability was queried again.
    EnrollmentFinished {
        /// What the enrollment screen reported.
        outcome: EnrollmentOutcome,
        /// The fresh classification.
        capability: CapabilityOutcome,
    },
    /// An attempt was handed to the oracle.
    SessionSubmitted {
        /// The session.
        session: SessionId,
    },
    /// A session delivered an event to its caller.
    SessionEvent {
        /// The session.
        session: SessionId,
        /// The delivered event.
        result: AuthenticationResult,
    },
    /// The oracle sent an event after the session had already finished.
    LateEventDiscarded {
        /// The session.
        session: SessionId,
    },
}

/// Receives [`AuthEvent`]s.
pub trait AuthObserver: Send + Sync + fmt::Debug {
    /// Called for every event, on the thread that produced it.
    fn on_event(&self, event: &AuthEvent);
}

/// Writes events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl AuthObserver for LogObserver {
    fn on_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::CapabilityClassified { requested, outcome } => {
                debug!("capability for {requested:?}: {outcome:?}");
            }
            AuthEvent::ClassificationAmbiguous { code } => {
                warn!("unrecognized capability code {code}, treating as unknown");
            }
            AuthEvent::PromptEnrollment { intent } => {
                info!("nothing enrolled, prompting enrollment via {}", intent.settings_action());
            }
            AuthEvent::EnrollmentFinished {
                outcome,
                capability,
            } => info!("enrollment {outcome:?}, capability now {capability:?}"),
            AuthEvent::SessionSubmitted { session } => debug!("{session} submitted"),
            AuthEvent::SessionEvent { session, result } => match result {
                AuthenticationResult::Error { .. } => warn!("{session}: {result}"),
                _ => debug!("{session}: {result}"),
            },
            AuthEvent::LateEventDiscarded { session } => {
                debug!("{session}: discarded event after terminal result");
            }
        }
    }
}

/// Forwards events over a channel, and optionally to another observer.
pub struct ChannelObserver {
    sender: Sender<AuthEvent>,
    forward: Option<Arc<dyn AuthObserver>>,
}

impl ChannelObserver {
    /// Creates an observer and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, Receiver<AuthEvent>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender,
                forward: None,
            },
            receiver,
        )
    }

    /// Also hands every event to `observer`.
    #[must_use]
    pub fn forwarding_to(mut self, observer: Arc<dyn AuthObserver>) -> Self {
        self.forward = Some(observer);
        self
    }
}

impl fmt::Debug for ChannelObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelObserver").finish_non_exhaustive()
    }
}

impl AuthObserver for ChannelObserver {
    fn on_event(&self, event: &AuthEvent) {
        if let Err(err) = self.sender.try_send(event.clone()) {
            warn!("dropping auth event: {err}");
        }
        if let Some(forward) = &self.forward {
            forward.on_event(event);
        }
    }
}
