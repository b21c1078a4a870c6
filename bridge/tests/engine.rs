mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use bridge::{BridgeErr, ConsoleProgress, Engine, ProgressSink};
use comms::{Hyperparams, Metrics, ModelRef, Request};
use common::Behavior;
use tensor::{DType, Tensor};

/// Records every hook invocation as a readable line.
#[derive(Default)]
struct Recorder(Vec<String>);

impl ProgressSink for Recorder {
    fn on_training_begin(&mut self, _: &Metrics) {
        self.0.push("training_begin".into());
    }

    fn on_training_end(&mut self, _: &Metrics) {
        self.0.push("training_end".into());
    }

    fn on_epoch_begin(&mut self, epoch: u32, _: &Metrics) {
        self.0.push(format!("epoch_begin {epoch}"));
    }

    fn on_epoch_end(&mut self, epoch: u32, _: &Metrics) {
        self.0.push(format!("epoch_end {epoch}"));
    }

    fn on_batch_begin(&mut self, batch: u32, _: &Metrics) {
        self.0.push(format!("batch_begin {batch}"));
    }

    fn on_batch_end(&mut self, batch: u32, metrics: &Metrics) {
        self.0.push(format!("batch_end {batch} n={}", metrics["nsamples"]));
    }
}

fn hyperparams(batch_size: u32, epochs: u32) -> Hyperparams {
    Hyperparams {
        batch_size,
        epochs,
        verbose: 1,
        cache: false,
    }
}

fn fit_request(samples: usize, batch_size: u32, epochs: u32) -> Request {
    let x = Tensor::zeros(DType::F32, &[samples, 2]).unwrap();
    let y = Tensor::zeros(DType::F32, &[samples, 1]).unwrap();
    Request::fit(
        r#"{"graph":[]}"#.into(),
        hyperparams(batch_size, epochs),
        x,
        y,
        ModelRef::None,
    )
}

#[test]
fn fit_dispatches_progress_in_order() {
    let mut engine = common::engine(Behavior::Run);
    let mut recorder = Recorder::default();

    let response = engine.call(fit_request(4, 2, 1), &mut recorder).unwrap();

    assert_eq!(
        recorder.0,
        vec![
            "training_begin",
            "epoch_begin 0",
            "batch_begin 0",
            "batch_end 0 n=2",
            "batch_begin 1",
            "batch_end 1 n=2",
            "epoch_end 0",
            "training_end",
        ]
    );
    assert_eq!(response.model.as_deref(), Some(&br#"{"graph":[]}"#[..]));
    assert_eq!(common::releases().len(), 1);
    assert_eq!(common::live_buffers(), 0);
}

#[test]
fn request_carries_the_callback_address() {
    let mut engine = common::engine(Behavior::Run);
    engine.call(fit_request(1, 1, 1), &mut ()).unwrap();

    let request = common::last_request().unwrap();
    assert!(request.progress_callback.is_some_and(|addr| addr != 0));
    assert_eq!(request.tensors[0].shape(), &[1, 2]);
    assert_eq!(request.tensors[1].shape(), &[1, 1]);
}

#[test]
fn error_channel_becomes_engine_error() {
    let mut engine = common::engine(Behavior::Fail(b"boom!".to_vec()));

    let err = engine.call(fit_request(4, 2, 1), &mut ()).unwrap_err();

    assert!(matches!(&err, BridgeErr::Engine(text) if text == "boom!"));
    assert_eq!(common::releases(), vec![1]);
    assert_eq!(common::live_buffers(), 0);
}

#[test]
fn failed_call_is_not_retried() {
    let mut engine = common::engine(Behavior::Fail(b"nope".to_vec()));

    assert!(engine.call(fit_request(2, 1, 1), &mut ()).is_err());
    assert!(common::last_request().is_none());
    assert_eq!(common::releases().len(), 1);

    common::set_behavior(Behavior::Run);
    engine.call(fit_request(2, 1, 1), &mut ()).unwrap();
    assert_eq!(common::releases().len(), 2);
}

#[test]
fn corrupt_response_is_a_decode_error_after_release() {
    let mut engine = common::engine(Behavior::CorruptResponse);

    let err = engine.call(fit_request(2, 2, 1), &mut ()).unwrap_err();

    assert!(matches!(err, BridgeErr::Decode(_)));
    assert_eq!(common::releases().len(), 1);
    assert_eq!(common::live_buffers(), 0);
}

#[test]
fn corrupt_progress_record_fails_the_call() {
    let mut engine = common::engine(Behavior::CorruptProgress);
    let mut recorder = Recorder::default();

    let err = engine.call(fit_request(2, 2, 1), &mut recorder).unwrap_err();

    assert!(matches!(err, BridgeErr::Decode(_)));
    assert!(recorder.0.is_empty());
    assert_eq!(common::releases().len(), 1);
}

#[test]
fn panicking_sink_does_not_leak_the_buffer() {
    struct Panics;
    impl ProgressSink for Panics {
        fn on_batch_end(&mut self, _: u32, _: &Metrics) {
            panic!("sink exploded");
        }
    }

    let mut engine = common::engine(Behavior::Run);
    let err = engine.call(fit_request(4, 2, 2), &mut Panics).unwrap_err();

    assert!(matches!(&err, BridgeErr::Callback(msg) if msg == "sink exploded"));
    assert_eq!(common::releases().len(), 1);
    assert_eq!(common::live_buffers(), 0);
}

#[test]
fn predict_returns_outputs_and_model_id() {
    let mut engine = common::engine(Behavior::Run);
    let x = Tensor::from_slice(&[3, 1], &[0.0f32, 1.0, 0.25]).unwrap();
    let request = Request::predict(None, hyperparams(32, 0), x, ModelRef::Blob(vec![1]));

    let response = engine.call(request, &mut ()).unwrap();

    assert_eq!(response.model_id.as_deref(), Some("mock-model"));
    assert_eq!(response.outputs.len(), 1);
    assert_eq!(response.outputs[0].shape(), &[3, 2]);
    assert_eq!(response.outputs[0].get_element_as_float(&[2, 1]).unwrap(), 0.25);
}

#[test]
fn console_progress_renders_a_fit() {
    let mut engine = common::engine(Behavior::Run);
    let mut console = ConsoleProgress::new(Vec::new(), 1, 4);

    engine.call(fit_request(4, 2, 1), &mut console).unwrap();

    let text = String::from_utf8(console.into_inner()).unwrap();
    assert!(text.starts_with("Epoch 1/1\n"));
    assert!(text.contains("\r4/4 [====================] 100.00%"));
}

extern "C" fn noop_entry(
    _: *const u8,
    _: u32,
    _: *mut *const u8,
    _: *mut u32,
    _: *mut u64,
    _: *mut *const u8,
    _: *mut u32,
    _: *mut u64,
) {
}

extern "C" fn noop_release(_: u64) {}

static COUNTED_RELEASES: AtomicUsize = AtomicUsize::new(0);

extern "C" fn counting_release(_: u64) {
    COUNTED_RELEASES.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn unfilled_output_is_a_decode_error_without_release() {
    let _serial = common::serial();
    COUNTED_RELEASES.store(0, Ordering::SeqCst);

    let mut engine = unsafe { Engine::from_symbols(noop_entry, counting_release) }.unwrap();
    let err = engine.call(fit_request(4, 2, 1), &mut ());

    assert!(matches!(err, Err(BridgeErr::Decode(_))));
    assert_eq!(COUNTED_RELEASES.load(Ordering::SeqCst), 0);
}

#[test]
fn only_one_engine_at_a_time() {
    let _engine = common::engine(Behavior::Run);

    let second = unsafe { Engine::from_symbols(noop_entry, noop_release) };
    assert!(matches!(second, Err(BridgeErr::AlreadyLoaded)));
}

#[test]
fn missing_library_is_a_load_error_and_frees_the_slot() {
    let _serial = common::serial();

    let err = Engine::load("/nonexistent/libengine.so");
    assert!(matches!(err, Err(BridgeErr::Load(_))));

    let engine = unsafe { Engine::from_symbols(noop_entry, noop_release) };
    assert!(engine.is_ok());
}

#[test]
fn dropping_the_engine_tears_it_down() {
    let _serial = common::serial();

    let first = unsafe { Engine::from_symbols(noop_entry, noop_release) }.unwrap();
    drop(first);
    let second = unsafe { Engine::from_symbols(noop_entry, noop_release) };
    assert!(second.is_ok());
}
