//! Context Stack
//!
//! Scoped key/value frames pushed around statement-level nodes. A value
//! set in a frame is visible to every descendant until the frame is
//! popped; lookups search from the innermost frame outwards.

use std::collections::{BTreeSet, HashMap};

/// Value stored in a context frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CtxValue {
    Str(String),
    Names(BTreeSet<String>),
}

#[derive(Debug, Clone)]
pub struct ContextStack {
    frames: Vec<HashMap<&'static str, CtxValue>>,
}

impl Default for ContextStack {
    fn default() -> Self {
        ContextStack::new()
    }
}

impl ContextStack {
    /// A stack holding only the root frame.
    pub fn new() -> Self {
        ContextStack {
            frames: vec![HashMap::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost frame. The root frame is never removed.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Drop every frame and start over with an empty root.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames.push(HashMap::new());
    }

    pub fn get(&self, key: &str) -> Option<&CtxValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(CtxValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_names(&self, key: &str) -> Option<&BTreeSet<String>> {
        match self.get(key) {
            Some(CtxValue::Names(names)) => Some(names),
            _ => None,
        }
    }

    /// Set `key` in the innermost frame.
    pub fn set(&mut self, key: &'static str, value: CtxValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(key, value);
        }
    }
}
