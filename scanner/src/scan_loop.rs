//! The continuous decode loop.
//!
//! One scanner instance processes one scan at a time: payloads decoded while
//! a decision is in flight are dropped, not queued. A scan outcome never
//! stops the loop; only an explicit stop or teardown does, and the camera is
//! released on every exit path.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use util::day;

use crate::camera::{self, CameraError, CameraStream, MediaDevices};
use crate::client::{ApiError, AttendanceApi, RosterRow, SessionRow};
use crate::payload::parse_student_id;

/// Client-side mirror of the ledger's minimum dwell, used only for the
/// early, friendlier rejection. The server remains the authoritative gate.
pub const MIN_DWELL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Stopped,
    Starting,
    Running,
}

/// Outcomes surfaced to the operator. Every variant carries what the UI
/// needs to phrase its toast; none of them stop the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    TimedIn {
        student_name: String,
    },
    TimedOut {
        student_name: String,
    },
    AlreadyCompleted {
        student_name: String,
    },
    AlreadyTimedIn {
        student_name: String,
        remaining_minutes: i64,
    },
    NotInRoster {
        student_id: String,
    },
    /// Server-side rejection passed through verbatim.
    Rejected {
        message: String,
    },
    /// Infrastructure failure while checking or recording; retry by
    /// scanning again.
    CheckFailed {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("This session is currently inactive!")]
    SessionInactive,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("failed to load tribe roster: {0}")]
    Roster(#[source] ApiError),
}

/// Handle to a running scanner. Dropping it tears the loop down; the camera
/// is released either way.
#[derive(Debug)]
pub struct Scanner {
    state_rx: watch::Receiver<ScannerState>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scanner {
    /// Acquires a camera and starts the decode loop against `session`.
    ///
    /// Fails fast on an inactive session, a roster that cannot be loaded, or
    /// a camera that cannot be opened; the state machine goes
    /// `Starting -> Running` on success and back to `Stopped` on failure.
    pub async fn start<A, D>(
        api: Arc<A>,
        devices: &D,
        session: &SessionRow,
        events: mpsc::Sender<ScanEvent>,
    ) -> Result<Scanner, StartError>
    where
        A: AttendanceApi + 'static,
        D: MediaDevices + ?Sized,
    {
        if !session.is_active() {
            return Err(StartError::SessionInactive);
        }

        let (state_tx, state_rx) = watch::channel(ScannerState::Starting);
        let (stop_tx, stop_rx) = watch::channel(false);

        let roster = api.fetch_roster().await.map_err(|err| {
            state_tx.send_replace(ScannerState::Stopped);
            StartError::Roster(err)
        })?;

        let stream = match camera::acquire(devices).await {
            Ok(stream) => stream,
            Err(err) => {
                state_tx.send_replace(ScannerState::Stopped);
                return Err(err.into());
            }
        };

        tracing::info!(session_id = session.id, "scanner started");
        state_tx.send_replace(ScannerState::Running);
        let task = tokio::spawn(run_loop(
            stream,
            api,
            session.id,
            roster,
            events,
            stop_rx,
            state_tx,
        ));

        Ok(Scanner {
            state_rx,
            stop_tx,
            task,
        })
    }

    pub fn state(&self) -> ScannerState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ScannerState> {
        self.state_rx.clone()
    }

    /// Stops the decode loop and waits until the camera has been released.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

async fn run_loop<A>(
    mut stream: CameraStream,
    api: Arc<A>,
    session_id: i64,
    roster: Vec<RosterRow>,
    events: mpsc::Sender<ScanEvent>,
    mut stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<ScannerState>,
) where
    A: AttendanceApi,
{
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                // A closed channel means the handle was dropped; tear down
                // the same way an explicit stop does.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            decoded = stream.next_payload() => {
                let Some(raw) = decoded else { break };
                handle_payload(api.as_ref(), session_id, &roster, &raw, &events).await;

                // Single-concurrency: anything decoded while the decision
                // was in flight is dropped, not queued.
                while stream.try_next_payload().is_some() {}

                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    state_tx.send_replace(ScannerState::Stopped);
    tracing::info!(session_id, "scanner stopped");
    // `stream` drops here, releasing the camera even if the loop exited
    // mid-callback.
}

async fn handle_payload<A>(
    api: &A,
    session_id: i64,
    roster: &[RosterRow],
    raw: &str,
    events: &mpsc::Sender<ScanEvent>,
) where
    A: AttendanceApi,
{
    let student_id = parse_student_id(raw);

    let Some(student) = roster.iter().find(|s| s.user_id.to_string() == student_id) else {
        surface(events, ScanEvent::NotInRoster { student_id }).await;
        return;
    };
    let student_name = student.full_name();

    // Refresh before deciding anything; the snapshot can itself go stale, so
    // this check only exists to answer quickly. The server re-checks.
    let today = match api.fetch_today().await {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(%err, "failed to refresh today's attendance");
            surface(
                events,
                ScanEvent::CheckFailed {
                    message: "Error checking attendance status. Please try again.".into(),
                },
            )
            .await;
            return;
        }
    };

    let current = today
        .iter()
        .find(|r| r.student_id == student.user_id && r.session_id == session_id);
    if let Some(record) = current {
        if record.time_out.is_some() {
            surface(events, ScanEvent::AlreadyCompleted { student_name }).await;
            return;
        }
        if let Some(time_in) = day::parse_local_timestamp(&record.time_in) {
            let elapsed_secs = (Utc::now() - time_in).num_seconds();
            if elapsed_secs < MIN_DWELL_SECS {
                let remaining_minutes = (MIN_DWELL_SECS - elapsed_secs + 59) / 60;
                surface(
                    events,
                    ScanEvent::AlreadyTimedIn {
                        student_name,
                        remaining_minutes,
                    },
                )
                .await;
                return;
            }
        }
    }

    match api.process_scan(student.user_id, session_id).await {
        Ok(outcome) if outcome.success => match outcome.action.as_deref() {
            Some("time_out") => surface(events, ScanEvent::TimedOut { student_name }).await,
            _ => surface(events, ScanEvent::TimedIn { student_name }).await,
        },
        Ok(outcome) => {
            surface(
                events,
                ScanEvent::Rejected {
                    message: outcome
                        .message
                        .unwrap_or_else(|| "Attendance was not recorded".into()),
                },
            )
            .await;
        }
        Err(err) => {
            tracing::warn!(%err, "attendance processing failed");
            surface(
                events,
                ScanEvent::CheckFailed {
                    message: "Error processing attendance. Please try again.".into(),
                },
            )
            .await;
        }
    }
}

async fn surface(events: &mpsc::Sender<ScanEvent>, event: ScanEvent) {
    // The operator surface may already be gone; outcomes become
    // fire-and-forget at that point.
    let _ = events.send(event).await;
}
