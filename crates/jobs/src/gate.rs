use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::pool::{Executor, Job, ThreadPool};
use crate::GateError;

/// Named concurrency domain of the gate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Serial: one job at a time, in submission order
    Project,
    DragAndDrop,
    CopyPaste,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Project, Domain::DragAndDrop, Domain::CopyPaste];

    fn slot(self) -> usize {
        match self {
            Domain::Project => 0,
            Domain::DragAndDrop => 1,
            Domain::CopyPaste => 2,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Project => "project",
            Domain::DragAndDrop => "drag-and-drop",
            Domain::CopyPaste => "copy/paste",
        };
        f.write_str(s)
    }
}

struct GateInner {
    in_flight: [AtomicUsize; 3],
    executors: [Executor; 3],
}

/// Admission control for interactive sequences plus the executors their
/// background work runs on. Cloning shares the same counters.
#[derive(Clone)]
pub struct OperationGate {
    inner: Arc<GateInner>,
}

impl OperationGate {
    fn with_executors(executors: [Executor; 3]) -> Self {
        Self {
            inner: Arc::new(GateInner {
                in_flight: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
                executors,
            }),
        }
    }

    /// Every domain runs its jobs synchronously on the submitting thread
    pub fn inline() -> Self {
        Self::with_executors([Executor::Inline, Executor::Inline, Executor::Inline])
    }

    /// One serial worker for the project domain; the two concurrent domains
    /// get `drag_and_drop` / `copy_paste` workers, defaulting to the number
    /// of logical CPUs.
    pub fn threaded(drag_and_drop: Option<usize>, copy_paste: Option<usize>) -> Result<Self> {
        let cpus = num_cpus::get().max(1);
        Ok(Self::with_executors([
            Executor::Pool(ThreadPool::new("project", 1)?),
            Executor::Pool(ThreadPool::new(
                "drag-and-drop",
                drag_and_drop.unwrap_or(cpus),
            )?),
            Executor::Pool(ThreadPool::new("copy-paste", copy_paste.unwrap_or(cpus))?),
        ]))
    }

    pub fn in_flight(&self, domain: Domain) -> usize {
        self.inner.in_flight[domain.slot()].load(Ordering::SeqCst)
    }

    pub fn is_idle(&self, domain: Domain) -> bool {
        self.in_flight(domain) == 0
    }

    pub fn parallelism(&self, domain: Domain) -> usize {
        self.inner.executors[domain.slot()].parallelism()
    }

    /// Start a new interactive sequence. Refused while anything of the same
    /// domain is still in flight; nothing is queued.
    pub fn try_begin(&self, domain: Domain) -> Result<Sequence, GateError> {
        self.inner.in_flight[domain.slot()]
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| GateError::Busy(domain))?;
        tracing::debug!(%domain, "sequence started");
        Ok(Sequence {
            _ticket: InFlight::adopt(self.inner.clone(), domain),
            gate: self.clone(),
            domain,
        })
    }

    /// Run `job` in `domain`; it counts as in flight until it returns
    pub fn spawn(&self, domain: Domain, job: impl FnOnce() + Send + 'static) {
        let ticket = InFlight::acquire(self.inner.clone(), domain);
        let job: Job = Box::new(move || {
            let _ticket = ticket;
            job();
        });
        self.inner.executors[domain.slot()].spawn(job);
    }
}

/// One unit of the in-flight count, released on drop (also on panic)
struct InFlight {
    inner: Arc<GateInner>,
    domain: Domain,
}

impl InFlight {
    fn acquire(inner: Arc<GateInner>, domain: Domain) -> Self {
        inner.in_flight[domain.slot()].fetch_add(1, Ordering::SeqCst);
        Self { inner, domain }
    }

    /// Take over a unit that was already counted
    fn adopt(inner: Arc<GateInner>, domain: Domain) -> Self {
        Self { inner, domain }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.in_flight[self.domain.slot()].fetch_sub(1, Ordering::SeqCst);
    }
}

/// An admitted drag-and-drop, copy/paste or project sequence. The domain
/// stays busy while this guard or any job spawned through it is alive.
pub struct Sequence {
    _ticket: InFlight,
    gate: OperationGate,
    domain: Domain,
}

impl Sequence {
    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn gate(&self) -> &OperationGate {
        &self.gate
    }

    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.gate.spawn(self.domain, job);
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence").field("domain", &self.domain).finish()
    }
}
