//! Shared label state for every latency observation.
//!
//! Values are positional: index 0 and 1 hold the overridable entry identity,
//! the remaining static dimensions are fixed when the state is built. Each
//! `finish` takes a snapshot under the lock and appends the per-call
//! `operation` and `status` values.

use crate::identity::ProcessIdentity;
use std::sync::{Mutex, PoisonError};

/// Static label names, in value order.
pub const STATIC_LABEL_KEYS: [&str; 9] = [
    "entry_name",
    "entry_type",
    "realm",
    "region",
    "az",
    "domain",
    "instance",
    "app_version",
    "app_name",
];

/// Per-call label names appended after the static ones.
pub const OPERATION_LABEL: &str = "operation";
pub const STATUS_LABEL: &str = "status";

const ENTRY_NAME_INDEX: usize = 0;
const ENTRY_TYPE_INDEX: usize = 1;

/// Outcome of a finished operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry identity carried by a cursor from its call site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryIdentity {
    pub name: String,
    pub kind: String,
}

impl EntryIdentity {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug)]
pub struct LabelState {
    values: Mutex<Vec<String>>,
}

impl LabelState {
    /// Build the state from process identity. Entry identity starts empty.
    pub fn new(identity: &ProcessIdentity) -> Self {
        let values = vec![
            String::new(),
            String::new(),
            identity.realm.clone(),
            identity.region.clone(),
            identity.az.clone(),
            identity.domain.clone(),
            identity.instance.clone(),
            identity.app_version.clone(),
            identity.app_name.clone(),
        ];
        debug_assert_eq!(values.len(), STATIC_LABEL_KEYS.len());

        Self {
            values: Mutex::new(values),
        }
    }

    /// Every label name a latency sink must be registered with.
    pub fn label_names() -> Vec<&'static str> {
        let mut names = STATIC_LABEL_KEYS.to_vec();
        names.push(OPERATION_LABEL);
        names.push(STATUS_LABEL);
        names
    }

    /// Replace the global entry identity. Both fields are written under one
    /// lock so readers never see a mixed pair. Content is not validated.
    pub fn override_identity(&self, entry_name: &str, entry_type: &str) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values[ENTRY_NAME_INDEX] = entry_name.to_string();
        values[ENTRY_TYPE_INDEX] = entry_type.to_string();
    }

    /// Current global entry identity.
    pub fn identity(&self) -> EntryIdentity {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        EntryIdentity::new(
            values[ENTRY_NAME_INDEX].clone(),
            values[ENTRY_TYPE_INDEX].clone(),
        )
    }

    /// Owned label values for one observation.
    ///
    /// A call-site identity takes precedence over the global one; without it
    /// the global override is reported.
    pub fn snapshot_for(
        &self,
        operation: &str,
        entry: Option<&EntryIdentity>,
        status: Status,
    ) -> Vec<String> {
        let mut snapshot = Vec::with_capacity(STATIC_LABEL_KEYS.len() + 2);
        {
            let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            snapshot.extend(values.iter().cloned());
        }

        if let Some(entry) = entry {
            snapshot[ENTRY_NAME_INDEX] = entry.name.clone();
            snapshot[ENTRY_TYPE_INDEX] = entry.kind.clone();
        }
        snapshot.push(operation.to_string());
        snapshot.push(status.as_str().to_string());
        snapshot
    }
}
