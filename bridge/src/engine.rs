use std::{
    path::Path,
    ptr, slice,
    sync::atomic::{AtomicBool, Ordering},
};

use comms::{Request, Response};
use log::{debug, info, warn};

use crate::{
    BridgeErr, Result,
    progress::{self, ProgressSink},
};

/// The engine's single entry point.
///
/// Takes the request buffer and fills exactly one of the two output groups:
/// (data, length, handle) for the response or for the error text.
pub type EntryFn = unsafe extern "C" fn(
    in_data: *const u8,
    in_len: u32,
    out_data: *mut *const u8,
    out_len: *mut u32,
    out_handle: *mut u64,
    err_data: *mut *const u8,
    err_len: *mut u32,
    err_handle: *mut u64,
);

/// Hands a buffer obtained through [`EntryFn`] back to the engine.
pub type ReleaseFn = unsafe extern "C" fn(handle: u64);

/// The exported names of the engine's entry points.
#[derive(Debug, Clone, Copy)]
pub struct Symbols<'a> {
    pub entry: &'a str,
    pub release: &'a str,
}

impl Default for Symbols<'_> {
    fn default() -> Self {
        Self {
            entry: "KerasFitModel",
            release: "KerasDeletePointer",
        }
    }
}

static LOADED: AtomicBool = AtomicBool::new(false);

/// The process wide binding to the native engine.
///
/// At most one `Engine` is alive at a time, creating it is the engine's
/// initialization and dropping it its teardown. Calls take `&mut self`, so
/// there's never more than one outstanding request.
pub struct Engine {
    entry: EntryFn,
    release: ReleaseFn,
    // keeps the symbols above valid, dropped after them
    _lib: Option<libloading::Library>,
}

/// One output group of the entry point, as the engine filled it.
struct NativeBuffer {
    data: *const u8,
    len: u32,
    handle: u64,
}

impl NativeBuffer {
    fn empty() -> Self {
        Self {
            data: ptr::null(),
            len: 0,
            handle: 0,
        }
    }

    /// Copies the buffer into owned memory and releases its handle. A group
    /// the engine left null holds no buffer, nothing is released for it and
    /// the result is empty.
    ///
    /// # Safety
    /// `data` must point to `len` readable bytes owned by the engine until
    /// `handle` is released, and this must be the only release of `handle`.
    unsafe fn take(self, release: ReleaseFn) -> Vec<u8> {
        if self.data.is_null() {
            warn!("engine returned without filling any output group");
            return Vec::new();
        }

        let bytes = if self.len == 0 {
            Vec::new()
        } else {
            // SAFETY: Upheld by the caller.
            unsafe { slice::from_raw_parts(self.data, self.len as usize) }.to_vec()
        };

        debug!(handle = self.handle, len = self.len; "releasing native buffer");

        // SAFETY: Upheld by the caller.
        unsafe { release(self.handle) };
        bytes
    }
}

/// What came out of a completed call, already copied and released.
enum Outcome {
    Success(Vec<u8>),
    Failure(Vec<u8>),
}

impl Engine {
    /// Loads the engine from the shared library at `path`.
    ///
    /// # Errors
    /// `AlreadyLoaded` if another `Engine` is alive, `Load` if the library or
    /// one of its entry points can't be resolved.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, Symbols::default())
    }

    /// Loads the engine from the shared library at `path`, resolving the
    /// given entry point names.
    pub fn load_with<P: AsRef<Path>>(path: P, symbols: Symbols<'_>) -> Result<Self> {
        let path = path.as_ref();
        acquire()?;

        // SAFETY: Loading runs the library's initializers, the engine library
        //         is trusted to be well behaved. The symbols are only used
        //         while `lib` is kept alive inside the returned `Engine`.
        let resolved = unsafe {
            libloading::Library::new(path).and_then(|lib| {
                let entry = *lib.get::<EntryFn>(symbols.entry.as_bytes())?;
                let release = *lib.get::<ReleaseFn>(symbols.release.as_bytes())?;
                Ok((lib, entry, release))
            })
        };

        let (lib, entry, release) = resolved.inspect_err(|_| LOADED.store(false, Ordering::Release))?;
        info!("engine loaded from {}", path.display());

        Ok(Self {
            entry,
            release,
            _lib: Some(lib),
        })
    }

    /// Binds an engine that's already part of the process, such as one linked
    /// statically.
    ///
    /// # Safety
    /// `entry` and `release` must follow the engine's calling contract.
    pub unsafe fn from_symbols(entry: EntryFn, release: ReleaseFn) -> Result<Self> {
        acquire()?;
        info!("engine bound in process");

        Ok(Self {
            entry,
            release,
            _lib: None,
        })
    }

    /// Runs `request` on the engine, blocking until it's done.
    ///
    /// The progress callback is registered in the request and every record
    /// the engine emits during the call is dispatched to `sink`.
    ///
    /// # Errors
    /// `Engine` with the engine's text if the error channel was filled,
    /// `Decode` if the response or a progress record is corrupt, `Callback`
    /// if the sink panicked.
    pub fn call(&mut self, mut request: Request, sink: &mut dyn ProgressSink) -> Result<Response> {
        request.progress_callback = Some(progress::callback_address());
        let bytes = comms::encode_request(&request).map_err(BridgeErr::Encode)?;

        debug!(mode:% = request.mode, len = bytes.len(); "submitting request");

        let scope = progress::Scope::enter(sink);
        let outcome = self.submit(&bytes);
        let (records, failure) = scope.finish();

        let outcome = outcome?;
        if let Some(e) = failure {
            return Err(e);
        }

        match outcome {
            Outcome::Failure(text) => {
                let text = String::from_utf8_lossy(&text).into_owned();
                info!("engine call failed after {records} progress records");
                Err(BridgeErr::Engine(text))
            }
            Outcome::Success(bytes) => {
                let response = comms::decode_response(&bytes).map_err(BridgeErr::Decode)?;
                info!(
                    "engine call completed: {} output tensors, {records} progress records",
                    response.outputs.len()
                );
                Ok(response)
            }
        }
    }

    /// The single blocking call into the engine. Whichever output group got
    /// filled is copied and its handle released before returning.
    fn submit(&mut self, bytes: &[u8]) -> Result<Outcome> {
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeErr::RequestTooLarge(bytes.len()))?;

        let mut out = NativeBuffer::empty();
        let mut err = NativeBuffer::empty();

        // SAFETY: `bytes` outlives the call and every out pointer refers to a
        //         live local.
        unsafe {
            (self.entry)(
                bytes.as_ptr(),
                len,
                &mut out.data,
                &mut out.len,
                &mut out.handle,
                &mut err.data,
                &mut err.len,
                &mut err.handle,
            )
        };

        // SAFETY: The engine filled the group with a buffer it owns until
        //         release, and `take` consumes it so it's released only once.
        let outcome = if err.len > 0 {
            Outcome::Failure(unsafe { err.take(self.release) })
        } else {
            Outcome::Success(unsafe { out.take(self.release) })
        };

        Ok(outcome)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        LOADED.store(false, Ordering::Release);
        info!("engine torn down");
    }
}

fn acquire() -> Result<()> {
    LOADED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|_| BridgeErr::AlreadyLoaded)
}
