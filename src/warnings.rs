//! User-facing analysis warnings.
//!
//! Soft failures (unknown target ref, shallow clone) are surfaced through an
//! `AnalysisWarnings` sink. Adding the same message twice keeps one copy.

use std::sync::Mutex;

pub trait AnalysisWarnings: Send + Sync {
    fn add_unique(&self, message: &str);
}

/// Collects warnings in insertion order, dropping duplicates.
#[derive(Debug, Default)]
pub struct WarningCollector {
    messages: Mutex<Vec<String>>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AnalysisWarnings for WarningCollector {
    fn add_unique(&self, message: &str) {
        let mut messages = match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !messages.iter().any(|m| m == message) {
            messages.push(message.to_string());
        }
    }
}
