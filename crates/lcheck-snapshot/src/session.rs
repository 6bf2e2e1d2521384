use std::fmt;
use std::sync::Mutex;

use lcheck_crypto::{AccumulatorMode, HashAccumulator};
use lcheck_types::Hash256;

/// One accumulator shared by every traversal worker of a snapshot.
///
/// Each `add`/`remove` takes the session lock for the duration of the call.
/// The lock belongs to the session, so independent runs never contend.
pub struct AccumulatorSession {
    mode: AccumulatorMode,
    inner: Mutex<Box<dyn HashAccumulator>>,
}

impl AccumulatorSession {
    pub fn new(mode: AccumulatorMode, accumulator: Box<dyn HashAccumulator>) -> Self {
        Self {
            mode,
            inner: Mutex::new(accumulator),
        }
    }

    pub fn add(&self, primary: &[u8], secondary: &[u8]) {
        self.inner
            .lock()
            .expect("lock poisoned")
            .add(primary, secondary);
    }

    pub fn remove(&self, primary: &[u8]) {
        self.inner.lock().expect("lock poisoned").remove(primary);
    }

    /// Digest over the current entries. Only meaningful once every worker
    /// feeding this session has been joined.
    pub fn digest(&self) -> Hash256 {
        self.inner.lock().expect("lock poisoned").digest()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AccumulatorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulatorSession")
            .field("mode", &self.mode)
            .field("entries", &self.len())
            .finish()
    }
}
