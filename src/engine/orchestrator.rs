use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use crate::enrich::Enricher;
use crate::error::{AuditError, Result};
use crate::report::{crash_entry, AuditReport, Entry, PhaseBuffer, Reporter};
use super::outcome::Outcome;
use super::runner::{AuditPhase, Phase, ReportSink};

const CHANNEL_CAPACITY: usize = 256;

/// Fixed, ordered list of phases for one run.
#[derive(Default)]
pub struct Orchestrator {
    phases: Vec<Box<dyn AuditPhase>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: 'static>(&mut self, phase: Phase<R>) -> &mut Self {
        self.phases.push(Box::new(phase));
        self
    }

    pub fn with_phase<R: 'static>(mut self, phase: Phase<R>) -> Self {
        self.register(phase);
        self
    }

    pub fn labels(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Run every phase in order on the calling thread, then finalize.
    pub fn run(self, mut reporter: Reporter) -> Result<AuditReport> {
        info!(phases = self.phases.len(), "starting sequential audit");
        for phase in &self.phases {
            phase.run(&mut reporter)?;
        }
        reporter.finalize()
    }

    /// Run every phase on the blocking pool at once.
    ///
    /// Workers stream entries to the reporter as they are checked. The
    /// earliest unfinished phase is written straight through; later phases
    /// are held until it completes, so each phase stays one contiguous
    /// block and blocks appear in registration order.
    pub async fn run_concurrent(self, mut reporter: Reporter) -> Result<AuditReport> {
        info!(phases = self.phases.len(), "starting concurrent audit");
        let (tx, mut rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
        let mut relay = Relay::new(self.labels());

        let mut workers = Vec::with_capacity(self.phases.len());
        for (index, phase) in self.phases.into_iter().enumerate() {
            let mut sink = ChannelSink { phase: index, tx: tx.clone() };
            let handle = tokio::task::spawn_blocking(move || {
                let run = panic::catch_unwind(AssertUnwindSafe(|| phase.run(&mut sink)));
                match run {
                    Ok(Ok(stats)) => debug!(phase = %phase.label(), checked = stats.checked, "worker done"),
                    Ok(Err(e)) => warn!(phase = %phase.label(), error = %e, "phase output rejected"),
                    Err(payload) => {
                        let reason = format!("phase worker failed: {}", panic_message(payload.as_ref()));
                        warn!(phase = %phase.label(), %reason, "phase worker crashed");
                        // Receiver is gone only if the reporter already failed.
                        let _ = sink.send(crash_entry(phase.label(), &reason));
                    }
                }
                let _ = sink.tx.blocking_send(Event::Finished(index));
            });
            workers.push((index, handle));
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            match event {
                Event::Entry(phase, entry) => relay.accept(&mut reporter, phase, entry)?,
                Event::Finished(phase) => relay.finish(&mut reporter, phase)?,
            }
        }

        for (index, handle) in workers {
            if let Err(e) = handle.await {
                if !relay.is_finished(index) {
                    warn!(phase = index, error = %e, "phase worker lost");
                    relay.crash(&mut reporter, index, &format!("phase worker failed: {e}"))?;
                }
            }
        }

        reporter.finalize()
    }
}

enum Event {
    Entry(usize, Entry),
    Finished(usize),
}

/// Worker side of the channel.
struct ChannelSink {
    phase: usize,
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    fn send(&self, entry: Entry) -> Result<()> {
        self.tx
            .blocking_send(Event::Entry(self.phase, entry))
            .map_err(|_| AuditError::Worker("reporter stopped receiving".into()))
    }
}

impl ReportSink for ChannelSink {
    fn announce(&mut self, label: &str) -> Result<()> {
        self.send(Entry::banner(label))
    }

    fn record(&mut self, outcome: Outcome, enricher: Option<&dyn Enricher>) -> Result<()> {
        self.send(Entry::checked(outcome, enricher))
    }
}

/// Reporter side: passes the live phase through, holds the rest.
struct Relay {
    labels: Vec<String>,
    live: usize,
    held: Vec<PhaseBuffer>,
    announced: Vec<bool>,
    finished: Vec<bool>,
}

impl Relay {
    fn new(labels: Vec<&str>) -> Self {
        let count = labels.len();
        Self {
            held: labels.iter().map(|label| PhaseBuffer::new(*label)).collect(),
            labels: labels.into_iter().map(String::from).collect(),
            live: 0,
            announced: vec![false; count],
            finished: vec![false; count],
        }
    }

    fn accept(&mut self, reporter: &mut Reporter, phase: usize, entry: Entry) -> Result<()> {
        self.announced[phase] = true;
        if phase == self.live {
            reporter.write_entry(entry)
        } else {
            self.held[phase].push(entry);
            Ok(())
        }
    }

    fn finish(&mut self, reporter: &mut Reporter, phase: usize) -> Result<()> {
        self.finished[phase] = true;
        while self.live < self.finished.len() && self.finished[self.live] {
            self.live += 1;
            if let Some(held) = self.held.get_mut(self.live) {
                if !held.is_empty() {
                    debug!(phase = %held.label(), entries = held.len(), "releasing held phase output");
                }
                reporter.absorb(mem::take(held))?;
            }
        }
        Ok(())
    }

    fn is_finished(&self, phase: usize) -> bool {
        self.finished[phase]
    }

    /// Close out a phase whose worker vanished without reporting.
    fn crash(&mut self, reporter: &mut Reporter, phase: usize, reason: &str) -> Result<()> {
        let label = self.labels[phase].clone();
        if !self.announced[phase] {
            self.accept(reporter, phase, Entry::banner(label.clone()))?;
        }
        self.accept(reporter, phase, crash_entry(label, reason))?;
        self.finish(reporter, phase)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
