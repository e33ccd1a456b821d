// ── Event loop ──
//
// Drives a `Session` on a tokio task. Transport events arrive on an
// unbounded channel; other tasks reach the session by sending jobs
// through a `LoopHandle`. After every batch of work the loop flushes the
// deferred notifications, so callbacks always run on the loop task and
// never while a reply or signal is still being processed.

use connui_bus::{Bus, BusEvent};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::session::Session;

const JOB_CHANNEL_SIZE: usize = 64;

/// Work executed on the loop task with exclusive access to the session.
pub type Job<B> = Box<dyn FnOnce(&mut Session<B>) + Send>;

enum Step<B: Bus> {
    Event(BusEvent),
    Job(Job<B>),
    Stop,
}

/// Owns a [`Session`] and feeds it until stopped.
pub struct EventLoop<B: Bus> {
    session: Session<B>,
    events: mpsc::UnboundedReceiver<BusEvent>,
    jobs: mpsc::Receiver<Job<B>>,
    cancel: CancellationToken,
}

impl<B: Bus> EventLoop<B> {
    /// Wrap `session` in an event loop reading transport events from
    /// `events`. The returned handle submits work to the loop.
    pub fn new(
        session: Session<B>,
        events: mpsc::UnboundedReceiver<BusEvent>,
    ) -> (Self, LoopHandle<B>) {
        let (job_tx, jobs) = mpsc::channel(JOB_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let handle = LoopHandle {
            jobs: job_tx,
            cancel: cancel.clone(),
        };
        let event_loop = Self {
            session,
            events,
            jobs,
            cancel,
        };
        (event_loop, handle)
    }
}

impl<B: Bus + Send> EventLoop<B> {
    /// Run until [`LoopHandle::shutdown`] is called or the transport
    /// closes its event channel. Returns the session so the caller can
    /// [`shutdown`](Session::shutdown) it cleanly.
    pub async fn run(mut self) -> Session<B> {
        let mut jobs_open = true;

        loop {
            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Step::Stop,
                event = self.events.recv() => event.map_or(Step::Stop, Step::Event),
                job = self.jobs.recv(), if jobs_open => match job {
                    Some(job) => Step::Job(job),
                    None => {
                        debug!("all loop handles dropped");
                        jobs_open = false;
                        continue;
                    }
                },
            };

            match step {
                Step::Event(event) => self.session.dispatch(event),
                Step::Job(job) => job(&mut self.session),
                Step::Stop => break,
            }

            // Whatever else the transport already queued belongs to the
            // same iteration.
            while let Ok(event) = self.events.try_recv() {
                self.session.dispatch(event);
            }

            let delivered = self.session.run_pending();
            if delivered > 0 {
                trace!(delivered, "notifications delivered");
            }
        }

        debug!("event loop stopped");
        self.session
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// Cloneable access to a running [`EventLoop`].
pub struct LoopHandle<B: Bus> {
    jobs: mpsc::Sender<Job<B>>,
    cancel: CancellationToken,
}

impl<B: Bus> Clone for LoopHandle<B> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<B: Bus + 'static> LoopHandle<B> {
    /// Run `f` on the loop task and wait for its result.
    ///
    /// Notifications caused by `f` are delivered before the loop picks
    /// up its next event.
    pub async fn call<F, R>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Session<B>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<B> = Box::new(move |session| {
            let _ = tx.send(f(session));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| CoreError::LoopClosed)?;
        rx.await.map_err(|_| CoreError::LoopClosed)
    }

    /// Ask the loop to stop after the current iteration.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
