// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event-routing fabric: the closed event/task identifier space, the
//! dedup'ing task queue, and the two interconnect variants (PPI, DPPI).
//!
//! Hardware events and tasks are identified by closed enums rather than by
//! function pointers; the `Simulator` owns the single dispatch point that
//! turns a [`TaskId`] back into a peripheral call.

pub mod dppi;
pub mod ppi;

pub use dppi::Dppi;
pub use ppi::Ppi;

use std::collections::VecDeque;

/// RADIO events routable through the fabric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RadioEvent {
    Ready,
    Address,
    Payload,
    End,
    Disabled,
    Devmatch,
    Devmiss,
    RssiEnd,
    Bcmatch,
    CrcOk,
    CrcError,
    Framestart,
    EdEnd,
    EdStopped,
    CcaIdle,
    CcaBusy,
    CcaStopped,
    Rateboost,
    TxReady,
    RxReady,
    Sync,
    PhyEnd,
}

/// RADIO tasks reachable from the fabric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RadioTask {
    TxEn,
    RxEn,
    Start,
    Stop,
    Disable,
    RssiStart,
    RssiStop,
    BcStart,
    BcStop,
    EdStart,
    EdStop,
    CcaStart,
    CcaStop,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RtcTask {
    Start,
    Stop,
    Clear,
    TrigOvrflw,
    Capture(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TimerTask {
    Start,
    Stop,
    Count,
    Clear,
    Shutdown,
    Capture(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ClockTask {
    HfClkStart,
    HfClkStop,
    LfClkStart,
    LfClkStop,
    Cal,
    CtStart,
    CtStop,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CcmTask {
    KsGen,
    Crypt,
    Stop,
    RateOverride,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AarTask {
    Start,
    Stop,
}

/// Every hardware event the fabric can observe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventId {
    ClockHfStarted,
    ClockLfStarted,
    ClockDone,
    ClockCtto,
    ClockCtStarted,
    ClockCtStopped,
    Radio(RadioEvent),
    /// (instance, channel)
    RtcCompare(u8, u8),
    RtcOvrflw(u8),
    RtcTick(u8),
    /// (instance, channel)
    TimerCompare(u8, u8),
    CcmEndKsgen,
    CcmEndCrypt,
    CcmError,
    AarEnd,
    AarResolved,
    AarNotResolved,
    RngValrdy,
    TempDatardy,
    /// (instance, line)
    EguTriggered(u8, u8),
}

/// Every task the fabric can trigger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TaskId {
    Clock(ClockTask),
    Radio(RadioTask),
    Rtc(u8, RtcTask),
    Timer(u8, TimerTask),
    Ccm(CcmTask),
    Aar(AarTask),
    RngStart,
    RngStop,
    TempStart,
    TempStop,
    /// (instance, line)
    EguTrigger(u8, u8),
}

/// What an MMIO address used in a PPI EEP/TEP register resolves to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddrTarget {
    Event(EventId),
    Task(TaskId),
}

/// The interconnect variant the simulated device carries.
pub enum Fabric {
    Ppi(Ppi),
    Dppi(Dppi),
}

impl Fabric {
    /// Append every task the given event triggers (channel-enable masks
    /// already applied). Duplicate suppression is the task queue's job.
    pub fn collect(&self, ev: EventId, out: &mut Vec<TaskId>) {
        match self {
            Fabric::Ppi(p) => p.collect(ev, out),
            Fabric::Dppi(d) => d.collect(ev, out),
        }
    }
}

/// Pending task invocations for the current dispatch round.
///
/// All candidate tasks of an event are queued before any runs, and a task
/// queued once in a round is never queued again: the same task reached from
/// multiple events (or re-reached recursively through an
/// event->task->event cycle) fires exactly once.
#[derive(Default)]
pub struct TaskQueue {
    queue: VecDeque<TaskId>,
    seen: Vec<TaskId>,
    /// True while the simulator is draining; nested events only enqueue.
    pub draining: bool,
}

impl TaskQueue {
    pub fn enqueue(&mut self, task: TaskId) {
        if !self.seen.contains(&task) {
            self.seen.push(task);
            self.queue.push_back(task);
        }
    }

    pub fn pop(&mut self) -> Option<TaskId> {
        self.queue.pop_front()
    }

    /// End the dispatch round: forget the dedup set.
    pub fn finish_round(&mut self) {
        self.seen.clear();
        self.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_elides_duplicates_within_a_round() {
        let mut q = TaskQueue::default();
        q.enqueue(TaskId::Radio(RadioTask::TxEn));
        q.enqueue(TaskId::Aar(AarTask::Start));
        q.enqueue(TaskId::Radio(RadioTask::TxEn));
        assert_eq!(q.pop(), Some(TaskId::Radio(RadioTask::TxEn)));
        assert_eq!(q.pop(), Some(TaskId::Aar(AarTask::Start)));
        assert_eq!(q.pop(), None);
        // Still deduped against already-executed tasks of this round.
        q.enqueue(TaskId::Radio(RadioTask::TxEn));
        assert_eq!(q.pop(), None);
        q.finish_round();
        q.enqueue(TaskId::Radio(RadioTask::TxEn));
        assert_eq!(q.pop(), Some(TaskId::Radio(RadioTask::TxEn)));
    }
}
