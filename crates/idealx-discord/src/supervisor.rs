//! Gateway supervision: keep one gateway session alive for the process lifetime.
//!
//! A session ends when the connection stops on its own or when it reaches
//! its lifetime ceiling, in which case it is cancelled. A clean end restarts
//! immediately; a failure (connect or session) restarts after a fixed delay.
//! There is no retry limit.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::DiscordError;

/// Forced session rotation interval.
pub const SESSION_CEILING: Duration = Duration::from_secs(24 * 60 * 60);
/// Fixed delay after a failed session.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// A running gateway session.
pub struct GatewaySession {
    cancel: CancellationToken,
    done: oneshot::Receiver<Result<(), DiscordError>>,
}

impl GatewaySession {
    /// `done` must resolve once the session has stopped, for any reason;
    /// cancelling `cancel` must make it stop.
    pub fn new(cancel: CancellationToken, done: oneshot::Receiver<Result<(), DiscordError>>) -> Self {
        Self { cancel, done }
    }
}

/// Opens gateway sessions.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self) -> Result<GatewaySession, DiscordError>;
}

pub struct GatewaySupervisor<C> {
    connector: C,
    session_ceiling: Duration,
    retry_delay: Duration,
}

impl<C: GatewayConnector> GatewaySupervisor<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            session_ceiling: SESSION_CEILING,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Supervise sessions forever.
    pub async fn run(self) {
        let mut sessions: u64 = 0;
        loop {
            sessions += 1;
            info!(session = sessions, "Discord: starting gateway session");
            match self.run_session().await {
                Ok(()) => info!(session = sessions, "Discord: gateway session finished, restarting"),
                Err(e) => {
                    error!(session = sessions, error = %e, "Discord: gateway session failed, retrying in {:?}", self.retry_delay);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn run_session(&self) -> Result<(), DiscordError> {
        let GatewaySession { cancel, mut done } = self.connector.connect().await?;

        tokio::select! {
            result = &mut done => {
                result.unwrap_or_else(|_| Err(DiscordError::Session("session task dropped".to_string())))
            }
            _ = tokio::time::sleep(self.session_ceiling) => {
                info!("Discord: session lifetime reached, rotating");
                cancel.cancel();
                // wait for the session to wind down; its outcome no longer matters
                let _ = done.await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Fails the first `failures` connects, then hands out sessions that run
    /// until cancelled.
    #[derive(Clone)]
    struct FakeConnector {
        failures: usize,
        attempts: Arc<Mutex<Vec<Instant>>>,
        cancelled: Arc<AtomicUsize>,
    }

    impl FakeConnector {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                attempts: Arc::new(Mutex::new(Vec::new())),
                cancelled: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl GatewayConnector for FakeConnector {
        async fn connect(&self) -> Result<GatewaySession, DiscordError> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(Instant::now());
                attempts.len()
            };
            if attempt <= self.failures {
                return Err(DiscordError::Session(format!("connect {attempt} refused")));
            }

            let cancel = CancellationToken::new();
            let (tx, rx) = oneshot::channel();
            let token = cancel.clone();
            let cancelled = Arc::clone(&self.cancelled);
            tokio::spawn(async move {
                token.cancelled().await;
                cancelled.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(Ok(()));
            });
            Ok(GatewaySession::new(cancel, rx))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_retry_after_fixed_delay() {
        let connector = FakeConnector::new(2);
        let attempts = Arc::clone(&connector.attempts);
        let supervisor = tokio::spawn(GatewaySupervisor::new(connector).run());

        tokio::time::sleep(Duration::from_secs(11)).await;

        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= RETRY_DELAY);
        }
        assert!(!supervisor.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_rotated_at_ceiling() {
        let connector = FakeConnector::new(0);
        let attempts = Arc::clone(&connector.attempts);
        let cancelled = Arc::clone(&connector.cancelled);
        let supervisor = tokio::spawn(GatewaySupervisor::new(connector).run());

        tokio::time::sleep(SESSION_CEILING + Duration::from_secs(1)).await;

        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        // rotation after a clean end is immediate
        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] - attempts[0] < SESSION_CEILING + RETRY_DELAY);
        assert!(!supervisor.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn session_that_stops_itself_restarts_without_delay() {
        struct OneShot(Arc<Mutex<Vec<Instant>>>);

        #[async_trait]
        impl GatewayConnector for OneShot {
            async fn connect(&self) -> Result<GatewaySession, DiscordError> {
                self.0.lock().unwrap().push(Instant::now());
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Ok(()));
                // park after the first few so the loop does not spin forever
                let parked = self.0.lock().unwrap().len() >= 3;
                if parked {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(GatewaySession::new(CancellationToken::new(), rx))
            }
        }

        let attempts = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(GatewaySupervisor::new(OneShot(Arc::clone(&attempts))).run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0], attempts[2]);
    }
}
