//! An in-process engine speaking the wire protocol, used to drive `Engine`
//! without a native library.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    slice,
    sync::LazyLock,
};

use bridge::{Engine, ProgressFn};
use comms::{Mode, ProgressKind, ProgressRecord, Request, Response, decode_request, encode_response};
use parking_lot::{Mutex, MutexGuard};
use tensor::{DType, Tensor};

/// What the mock does with the next request.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Runs the request, emitting progress for every batch.
    Run,
    /// Fills the error channel with these bytes.
    Fail(Vec<u8>),
    /// Sends one undecodable progress record before running.
    CorruptProgress,
    /// Answers with a response that doesn't decode.
    CorruptResponse,
}

#[derive(Default)]
struct State {
    behavior: Option<Behavior>,
    next_handle: u64,
    buffers: HashMap<u64, Vec<u8>>,
    releases: Vec<u64>,
    last_request: Option<Request>,
}

static STATE: LazyLock<Mutex<State>> = LazyLock::new(Default::default);

// tests share the process wide engine slot and the mock's state
static SERIAL: Mutex<()> = Mutex::new(());

/// An `Engine` bound to the mock, holding the test lock until dropped.
pub struct MockEngine {
    engine: Engine,
    _serial: MutexGuard<'static, ()>,
}

impl Deref for MockEngine {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        &self.engine
    }
}

impl DerefMut for MockEngine {
    fn deref_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

/// Holds the test lock without binding an engine.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

pub fn engine(behavior: Behavior) -> MockEngine {
    let serial = SERIAL.lock();
    *STATE.lock() = State {
        behavior: Some(behavior),
        ..Default::default()
    };

    let engine = unsafe { Engine::from_symbols(entry, release) }.unwrap();
    MockEngine {
        engine,
        _serial: serial,
    }
}

pub fn set_behavior(behavior: Behavior) {
    STATE.lock().behavior = Some(behavior);
}

pub fn releases() -> Vec<u64> {
    STATE.lock().releases.clone()
}

/// Buffers handed out and not released yet.
pub fn live_buffers() -> usize {
    STATE.lock().buffers.len()
}

pub fn last_request() -> Option<Request> {
    STATE.lock().last_request.clone()
}

fn emit(progress: ProgressFn, record: ProgressRecord) {
    let bytes = record.encode().unwrap();
    unsafe { progress(bytes.as_ptr(), bytes.len() as u32) };
}

fn train(request: &Request, progress: ProgressFn) {
    let samples = request.tensors[0].shape().first().copied().unwrap_or(0);
    let batch_size = (request.hyperparams.batch_size as usize).max(1);

    emit(progress, ProgressRecord::new(ProgressKind::TrainingBegin, 0));

    for epoch in 0..request.hyperparams.epochs {
        emit(progress, ProgressRecord::new(ProgressKind::EpochBegin, epoch));

        for (batch, start) in (0..samples).step_by(batch_size).enumerate() {
            let n = batch_size.min(samples - start) as f64;
            let batch = batch as u32;

            emit(progress, ProgressRecord::new(ProgressKind::BatchBegin, batch));
            emit(
                progress,
                ProgressRecord::new(ProgressKind::BatchEnd, batch)
                    .with("acc", 0.5)
                    .with("loss", 1.0 / (epoch + 1) as f64)
                    .with("nsamples", n),
            );
        }

        emit(
            progress,
            ProgressRecord::new(ProgressKind::EpochEnd, epoch).with("nsamples", samples as f64),
        );
    }

    emit(progress, ProgressRecord::new(ProgressKind::TrainingEnd, 0));
}

/// Two class scores per sample, `[1 - x0, x0]` where `x0` is the sample's
/// first feature.
fn predict(x: &Tensor) -> Tensor {
    let samples = x.shape().first().copied().unwrap_or(0);
    let values = x.cast(DType::F64).unwrap().to_vec::<f64>().unwrap();
    let features = if samples == 0 { 0 } else { values.len() / samples };

    let scores: Vec<f32> = (0..samples)
        .flat_map(|i| {
            let x0 = values[i * features] as f32;
            [1.0 - x0, x0]
        })
        .collect();

    Tensor::from_slice(&[samples, 2], &scores).unwrap()
}

fn run(bytes: &[u8]) -> Result<Vec<u8>, Vec<u8>> {
    let behavior = STATE.lock().behavior.clone().unwrap_or(Behavior::Run);
    if let Behavior::Fail(text) = behavior {
        return Err(text);
    }

    let request = decode_request(bytes).map_err(|e| e.to_string().into_bytes())?;
    STATE.lock().last_request = Some(request.clone());

    let address = request.progress_callback.ok_or(b"no progress callback".to_vec())?;
    let progress: ProgressFn = unsafe { std::mem::transmute(address as usize) };

    if let Behavior::CorruptProgress = behavior {
        let garbage = [0xff, 0, 1];
        unsafe { progress(garbage.as_ptr(), garbage.len() as u32) };
    }

    let response = match request.mode {
        Mode::Fit => {
            train(&request, progress);
            Response {
                model: Some(request.graph.clone().unwrap_or_default().into_bytes()),
                ..Default::default()
            }
        }
        Mode::Predict => Response {
            model_id: Some("mock-model".into()),
            outputs: vec![predict(&request.tensors[0])],
            ..Default::default()
        },
    };

    if let Behavior::CorruptResponse = behavior {
        return Ok(vec![0, 0, 0, 2, 0xee]);
    }

    Ok(encode_response(&response).unwrap())
}

unsafe extern "C" fn entry(
    in_data: *const u8,
    in_len: u32,
    out_data: *mut *const u8,
    out_len: *mut u32,
    out_handle: *mut u64,
    err_data: *mut *const u8,
    err_len: *mut u32,
    err_handle: *mut u64,
) {
    let bytes = unsafe { slice::from_raw_parts(in_data, in_len as usize) };

    let (buf, data, len, handle) = match run(bytes) {
        Ok(buf) => (buf, out_data, out_len, out_handle),
        Err(buf) => (buf, err_data, err_len, err_handle),
    };

    let mut state = STATE.lock();
    state.next_handle += 1;
    let id = state.next_handle;

    unsafe {
        *data = buf.as_ptr();
        *len = buf.len() as u32;
        *handle = id;
    }

    state.buffers.insert(id, buf);
}

unsafe extern "C" fn release(handle: u64) {
    let mut state = STATE.lock();
    state.releases.push(handle);
    state.buffers.remove(&handle);
}
