//! Session lifecycle with statum typestates
//!
//! ```text
//! Configured ──connect──► Active ──run──► Closed
//!      ▲                                    │
//!      └────────────── reopen ──────────────┘
//! ```
//!
//! `run` drives two loops on the shared link until one fails or the owner
//! cancels: DATA frames at the transmission interval and PING at the keepalive
//! interval. Whatever ends the session, DISCONNECT is then sent from a detached
//! task so it completes even while the owner is being torn down.

use super::events::{SessionEnd, SessionEvent, SessionStatus};
use crate::config::Config;
use crate::controller::Sampler;
use crate::link::{ConnectionState, ControlLink, Exchange, LinkError};
use crate::mapping::{encode_sample, ButtonMapping, Sample};
use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Values copied out of the configuration when the session is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub mapping: ButtonMapping,
    pub transmission_interval: Duration,
    pub keepalive_interval: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mapping: config.buttons,
            transmission_interval: config.link.transmission_interval(),
            keepalive_interval: config.link.keepalive_interval(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Configured,
    Active,
    Closed(SessionEnd),
}

#[machine]
#[derive(Debug)]
pub struct Session<S: SessionState> {
    link: Arc<ControlLink>,
    settings: SessionSettings,
    sampler: Sampler,
    events: mpsc::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl<S: SessionState> Session<S> {
    pub fn link(&self) -> &Arc<ControlLink> {
        &self.link
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    async fn notify(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            debug!("No listener for session events");
        }
    }
}

impl Session<Configured> {
    pub fn create(
        config: &Config,
        link: Arc<ControlLink>,
        input: watch::Receiver<Sample>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let settings = SessionSettings::from_config(config);
        info!(
            "Session for {} configured: {:?}",
            link.endpoint(),
            settings
        );

        let sampler = Sampler::new(input, config.brake, config.throttle);
        let (status, _) = watch::channel(SessionStatus::default());

        Self::new(link, settings, sampler, events, status)
    }

    /// Performs the handshake and transitions to Active
    ///
    /// Failures are reported to the event listener and returned together with
    /// the unchanged session, so the caller can retry without rebuilding it.
    pub async fn connect(self) -> Result<Session<Active>, (Self, LinkError)> {
        info!("Connecting to {}", self.link.endpoint());

        if let Err(e) = self.link.connect().await {
            error!("Connecting to {} failed: {}", self.link.endpoint(), e);
            self.notify(SessionEvent::Failed(e.to_string())).await;
            return Err((self, e));
        }

        self.status.send_modify(|status| {
            status.connection_state = ConnectionState::Connected;
            status.connected_at = Some(Local::now());
        });
        self.notify(SessionEvent::Connected(self.link.endpoint().clone()))
            .await;

        Ok(self.transition())
    }
}

impl Session<Active> {
    /// Runs both periodic loops until a failure or cancellation, then tears down
    pub async fn run(mut self, cancel: CancellationToken) -> Session<Closed> {
        info!("Session with {} running", self.link.endpoint());

        let end = {
            let link = &self.link;
            let settings = &self.settings;
            let status = &self.status;
            let sampler = &mut self.sampler;

            tokio::select! {
                _ = cancel.cancelled() => SessionEnd::Cancelled,
                error = transmission_loop(link, sampler, settings, status) => {
                    SessionEnd::failed(Exchange::Emit, &error)
                }
                error = keepalive_loop(link, settings.keepalive_interval, status) => {
                    SessionEnd::failed(Exchange::Ping, &error)
                }
            }
        };

        match &end {
            SessionEnd::Cancelled => info!("Session with {} cancelled", self.link.endpoint()),
            SessionEnd::Failed { message, fatal, .. } => {
                if *fatal {
                    error!("Session with {} failed: {}", self.link.endpoint(), end);
                } else {
                    warn!(
                        "Session with {} lost: {}, reconnect possible",
                        self.link.endpoint(),
                        end
                    );
                }
                self.notify(SessionEvent::Failed(message.clone())).await;
            }
        }

        if let Err(e) = spawn_teardown(self.link.clone()).await {
            error!("Teardown task panicked: {}", e);
        }

        self.status.send_modify(|status| {
            status.connection_state = ConnectionState::Idle;
        });
        self.notify(SessionEvent::Disconnected(self.link.endpoint().clone()))
            .await;

        self.transition_with(end)
    }
}

impl Session<Closed> {
    pub fn end(&self) -> Option<&SessionEnd> {
        self.get_state_data()
    }

    /// Returns to Configured so the owner may try again
    pub fn reopen(self) -> Session<Configured> {
        debug!("Reopening session for {}", self.link.endpoint());
        self.transition()
    }
}

async fn transmission_loop(
    link: &ControlLink,
    sampler: &mut Sampler,
    settings: &SessionSettings,
    status: &watch::Sender<SessionStatus>,
) -> LinkError {
    let mut ticker = tokio::time::interval(settings.transmission_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let sample = sampler.sample(Instant::now().into_std());
        let payload = encode_sample(&sample, &settings.mapping);

        if let Err(e) = link.emit(&payload).await {
            warn!("Transmission stopped: {}", e);
            return e;
        }
        status.send_modify(|status| status.frames_sent += 1);
    }
}

async fn keepalive_loop(
    link: &ControlLink,
    interval: Duration,
    status: &watch::Sender<SessionStatus>,
) -> LinkError {
    loop {
        if let Err(e) = link.ping().await {
            warn!("Keepalive stopped: {}", e);
            return e;
        }
        status.send_modify(|status| {
            status.pings_answered += 1;
            status.last_keepalive = Some(Local::now());
        });

        tokio::time::sleep(interval).await;
    }
}

/// Sends DISCONNECT from a task that outlives the caller
///
/// The task does not observe any cancellation token and dropping the returned
/// handle detaches it. Errors are logged and swallowed; the link ends up idle
/// either way.
pub fn spawn_teardown(link: Arc<ControlLink>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match link.disconnect().await {
            Ok(()) => info!("Teardown of {} complete", link.endpoint()),
            Err(LinkError::NotConnected(_)) => {
                debug!("Teardown of {}: no session open", link.endpoint())
            }
            Err(e) => warn!(
                "Disconnect from {} during teardown failed: {}",
                link.endpoint(),
                e
            ),
        }
        link.release().await;
    })
}
