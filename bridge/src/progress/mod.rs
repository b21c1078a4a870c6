mod console;

use std::{
    any::Any,
    cell::RefCell,
    panic::{self, AssertUnwindSafe},
    ptr::NonNull,
    slice,
};

use comms::{Metrics, ProgressKind, ProgressRecord};
use log::{debug, warn};

pub use console::ConsoleProgress;

use crate::BridgeErr;

/// Receives the lifecycle events of a call while the engine is running it.
///
/// Hooks run inside the engine's training loop on the calling thread, they
/// must return quickly.
pub trait ProgressSink {
    fn on_training_begin(&mut self, _metrics: &Metrics) {}
    fn on_training_end(&mut self, _metrics: &Metrics) {}
    fn on_epoch_begin(&mut self, _epoch: u32, _metrics: &Metrics) {}
    fn on_epoch_end(&mut self, _epoch: u32, _metrics: &Metrics) {}
    fn on_batch_begin(&mut self, _batch: u32, _metrics: &Metrics) {}
    fn on_batch_end(&mut self, _batch: u32, _metrics: &Metrics) {}
}

/// Discards every event.
impl ProgressSink for () {}

/// Routes `record` to the matching hook of `sink`.
pub fn dispatch(sink: &mut dyn ProgressSink, record: &ProgressRecord) {
    let ProgressRecord {
        kind,
        index,
        metrics,
    } = record;

    match kind {
        ProgressKind::TrainingBegin => sink.on_training_begin(metrics),
        ProgressKind::TrainingEnd => sink.on_training_end(metrics),
        ProgressKind::EpochBegin => sink.on_epoch_begin(*index, metrics),
        ProgressKind::EpochEnd => sink.on_epoch_end(*index, metrics),
        ProgressKind::BatchBegin => sink.on_batch_begin(*index, metrics),
        ProgressKind::BatchEnd => sink.on_batch_end(*index, metrics),
    }
}

/// The signature the engine invokes for every progress record.
pub type ProgressFn = unsafe extern "C" fn(data: *const u8, len: u32);

/// The sink of the call running on this thread, plus the first failure seen
/// while feeding it.
struct Slot {
    sink: NonNull<dyn ProgressSink + 'static>,
    records: usize,
    failure: Option<BridgeErr>,
}

thread_local! {
    static ACTIVE: RefCell<Option<Slot>> = const { RefCell::new(None) };
}

/// Keeps `sink` reachable from [`on_progress`] while it's alive. Only one
/// scope may exist per thread, which the engine's `&mut self` calls ensure.
pub(crate) struct Scope<'a> {
    _sink: std::marker::PhantomData<&'a mut dyn ProgressSink>,
}

impl<'a> Scope<'a> {
    pub(crate) fn enter(sink: &'a mut dyn ProgressSink) -> Self {
        let sink = NonNull::from(sink);

        // SAFETY: Only the lifetime is erased. The pointer is removed from the
        //         slot when the scope drops, before `'a` ends, and never read
        //         after that.
        let sink: NonNull<dyn ProgressSink + 'static> = unsafe { std::mem::transmute(sink) };

        ACTIVE.with_borrow_mut(|slot| {
            *slot = Some(Slot {
                sink,
                records: 0,
                failure: None,
            })
        });

        Self {
            _sink: std::marker::PhantomData,
        }
    }

    /// Ends the scope, returning how many records were dispatched and the
    /// first failure, if any.
    pub(crate) fn finish(self) -> (usize, Option<BridgeErr>) {
        let slot = ACTIVE.with_borrow_mut(Option::take);
        std::mem::forget(self);

        slot.map_or((0, None), |slot| (slot.records, slot.failure))
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        ACTIVE.with_borrow_mut(|slot| *slot = None);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// The callback handed to the engine. Decodes the record and feeds it to the
/// sink of the call in progress on this thread.
///
/// After the first failure the remaining records of the call are dropped, the
/// failure is reported once the call returns.
pub(crate) unsafe extern "C" fn on_progress(data: *const u8, len: u32) {
    let bytes = if data.is_null() || len == 0 {
        &[][..]
    } else {
        // SAFETY: The engine guarantees `data` points to `len` readable bytes
        //         for the duration of this callback.
        unsafe { slice::from_raw_parts(data, len as usize) }
    };

    ACTIVE.with_borrow_mut(|slot| {
        let Some(slot) = slot else {
            warn!("progress record received outside of a call, dropping it");
            return;
        };

        if slot.failure.is_some() {
            return;
        }

        let record = match ProgressRecord::decode(bytes) {
            Ok(record) => record,
            Err(e) => {
                slot.failure = Some(BridgeErr::Decode(e));
                return;
            }
        };

        debug!(kind:? = record.kind, index = record.index; "progress");

        // SAFETY: The slot only holds a sink while its `Scope` is alive, and
        //         the scope holds the unique borrow of it.
        let sink = unsafe { slot.sink.as_mut() };

        // unwinding into the engine's frames would abort the process
        match panic::catch_unwind(AssertUnwindSafe(|| dispatch(sink, &record))) {
            Ok(()) => slot.records += 1,
            Err(payload) => {
                let msg = panic_message(payload);
                warn!("progress sink panicked: {msg}");
                slot.failure = Some(BridgeErr::Callback(msg));
            }
        }
    });
}

/// The address of the progress callback, as it travels in the request.
pub(crate) fn callback_address() -> u64 {
    on_progress as ProgressFn as usize as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl ProgressSink for Log {
        fn on_training_begin(&mut self, _: &Metrics) {
            self.0.push("training_begin".into());
        }

        fn on_epoch_end(&mut self, epoch: u32, metrics: &Metrics) {
            self.0.push(format!("epoch_end {epoch} {:?}", metrics.get("loss")));
        }
    }

    fn feed(record: &[u8]) {
        unsafe { on_progress(record.as_ptr(), record.len() as u32) };
    }

    #[test]
    fn records_reach_the_scoped_sink() {
        let mut log = Log::default();
        let scope = Scope::enter(&mut log);

        feed(&ProgressRecord::new(ProgressKind::TrainingBegin, 0).encode().unwrap());
        feed(
            &ProgressRecord::new(ProgressKind::EpochEnd, 2)
                .with("loss", 0.5)
                .encode()
                .unwrap(),
        );
        // hooks left to their default do nothing
        feed(&ProgressRecord::new(ProgressKind::BatchBegin, 0).encode().unwrap());

        let (records, failure) = scope.finish();
        assert_eq!(records, 3);
        assert!(failure.is_none());
        assert_eq!(log.0, vec!["training_begin", "epoch_end 2 Some(0.5)"]);
    }

    #[test]
    fn records_outside_a_scope_are_dropped() {
        feed(&ProgressRecord::new(ProgressKind::TrainingBegin, 0).encode().unwrap());
        ACTIVE.with_borrow(|slot| assert!(slot.is_none()));
    }

    #[test]
    fn corrupt_record_stops_dispatch() {
        let mut log = Log::default();
        let scope = Scope::enter(&mut log);

        feed(&[0, 0, 0, 3, 9]);
        feed(&ProgressRecord::new(ProgressKind::TrainingBegin, 0).encode().unwrap());

        let (records, failure) = scope.finish();
        assert_eq!(records, 0);
        assert!(matches!(failure, Some(BridgeErr::Decode(_))));
        assert!(log.0.is_empty());
    }

    #[test]
    fn panicking_sink_is_contained() {
        struct Panics;
        impl ProgressSink for Panics {
            fn on_training_begin(&mut self, _: &Metrics) {
                panic!("boom");
            }
        }

        let mut sink = Panics;
        let scope = Scope::enter(&mut sink);
        feed(&ProgressRecord::new(ProgressKind::TrainingBegin, 0).encode().unwrap());

        let (_, failure) = scope.finish();
        assert!(matches!(failure, Some(BridgeErr::Callback(msg)) if msg == "boom"));
    }

    #[test]
    fn dropped_scope_clears_the_slot() {
        let mut log = Log::default();
        drop(Scope::enter(&mut log));
        ACTIVE.with_borrow(|slot| assert!(slot.is_none()));
    }
}
