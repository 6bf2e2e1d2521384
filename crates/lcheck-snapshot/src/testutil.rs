use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use lcheck_crypto::{AccumulatorMode, HashAccumulator, MerkleFactory};
use lcheck_store::{InMemoryStore, LedgerSimulator};
use lcheck_types::{Hash256, Key, Sequence};

use crate::session::AccumulatorSession;

pub fn k(n: u64) -> Key {
    Key::from_u64(n)
}

pub fn simulator() -> LedgerSimulator {
    simulator_at(1)
}

pub fn simulator_at(first: Sequence) -> LedgerSimulator {
    LedgerSimulator::new(Arc::new(InMemoryStore::new()), Arc::new(MerkleFactory), first)
}

/// Keys added to a [`KeyCollector`], in call order.
#[derive(Clone, Default)]
pub struct KeyLog(Arc<Mutex<Vec<Key>>>);

impl KeyLog {
    pub fn keys(&self) -> Vec<Key> {
        self.0.lock().unwrap().clone()
    }
}

/// Fake accumulator that records which keys were added.
pub struct KeyCollector {
    log: KeyLog,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl HashAccumulator for KeyCollector {
    fn add(&mut self, primary: &[u8], secondary: &[u8]) {
        if let Ok(key) = Key::from_slice(primary) {
            self.log.0.lock().unwrap().push(key);
        }
        self.entries.insert(primary.to_vec(), secondary.to_vec());
    }

    fn remove(&mut self, primary: &[u8]) {
        self.entries.remove(primary);
    }

    fn digest(&self) -> Hash256 {
        Hash256::default()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn collector() -> (AccumulatorSession, KeyLog) {
    let log = KeyLog::default();
    let acc = KeyCollector {
        log: log.clone(),
        entries: BTreeMap::new(),
    };
    (
        AccumulatorSession::new(AccumulatorMode::State, Box::new(acc)),
        log,
    )
}
