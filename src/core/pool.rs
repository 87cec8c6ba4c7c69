//! Bounded job queue with synchronous fallback.
//!
//! Both tree builders fan out recursively: every job may produce child jobs.
//! Jobs go through a channel whose capacity equals the worker count. Enqueue
//! never blocks. When the channel is full, the producing thread runs the
//! child job itself, on its own stack. The pool therefore cannot deadlock on
//! a full queue, whatever the fan-out.
//!
//! A pending-job counter is incremented before a job is queued and
//! decremented after its handler returns. Children are always queued before
//! their parent finishes, so the counter only reaches zero once the whole
//! tree of jobs has run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::util::Result;

/// Work processed by a [`run`] pool.
pub(crate) trait JobHandler: Sync {
    type Job: Send;

    /// Process one job, queueing follow-up jobs through `scheduler`.
    fn process(&self, job: Self::Job, scheduler: &Scheduler<'_, Self>);
}

/// Queue handle passed to every [`JobHandler::process`] call.
pub(crate) struct Scheduler<'h, H: JobHandler + ?Sized> {
    handler: &'h H,
    jobs: Sender<Option<H::Job>>,
    pending: AtomicUsize,
    done: Sender<()>,
}

impl<'h, H: JobHandler + ?Sized> Scheduler<'h, H> {
    /// Queue `job`, or run it inline if the queue is full.
    pub(crate) fn spawn(&self, job: H::Job) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.jobs.try_send(Some(job)) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                tracing::trace!("job queue full, running inline");
                if let Some(job) = job {
                    self.execute(job);
                }
            }
        }
    }

    fn execute(&self, job: H::Job) {
        self.handler.process(job, self);
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.done.try_send(());
        }
    }
}

/// Wakes the waiting caller if a worker unwinds, so a panicking handler
/// surfaces as a panic instead of a hang.
struct PanicSignal<'a>(&'a Sender<()>);

impl Drop for PanicSignal<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.0.try_send(());
        }
    }
}

fn worker_loop<H: JobHandler + ?Sized>(scheduler: &Scheduler<'_, H>, jobs: Receiver<Option<H::Job>>) {
    let _signal = PanicSignal(&scheduler.done);
    while let Ok(Some(job)) = jobs.recv() {
        scheduler.execute(job);
    }
}

/// Run `initial` and every job it transitively spawns on `workers` threads.
///
/// Blocks until the pending-job counter drains to zero.
pub(crate) fn run<H: JobHandler>(
    handler: &H,
    workers: usize,
    label: &'static str,
    initial: H::Job,
) -> Result<()> {
    let workers = workers.max(1);
    let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(workers);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let scheduler = Scheduler {
        handler,
        jobs: jobs_tx,
        pending: AtomicUsize::new(0),
        done: done_tx,
    };

    thread::scope(|scope| -> Result<()> {
        // Owned here so that dropping it leaves the workers as the only
        // receivers; shutdown sends then fail fast if every worker is gone.
        let jobs_rx = jobs_rx;
        let mut spawned = 0;
        for i in 0..workers {
            let jobs = jobs_rx.clone();
            let scheduler = &scheduler;
            let spawn = thread::Builder::new()
                .name(format!("{label}-{i}"))
                .spawn_scoped(scope, move || worker_loop(scheduler, jobs));
            if let Err(e) = spawn {
                // Release the workers that did start before bailing out
                for _ in 0..spawned {
                    let _ = scheduler.jobs.send(None);
                }
                return Err(e.into());
            }
            spawned += 1;
        }
        drop(jobs_rx);

        scheduler.spawn(initial);
        let _ = done_rx.recv();

        for _ in 0..spawned {
            let _ = scheduler.jobs.send(None);
        }
        Ok(())
    })
}
