#![allow(dead_code)]

use std::sync::{Arc, Mutex};

/// Records every value it is given, in call order.
pub struct Recorder<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Recorder {
            calls: self.calls.clone(),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Recorder {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, value: T) {
        self.calls.lock().unwrap().push(value);
    }

    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}
