//! DisableSnapshot: точка во времени всего кольца DisableScheduler
//!
//! Authority публикует один snapshot за тик (PublishedSnapshot).
//! Transport (вне этого crate) доставляет его replicas: сериализация через serde,
//! wire format выбирает хост. Replica передаёт полученное в SnapshotReconciler::deliver.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scheduler::DisableEntry;
use crate::tick::Tick;

/// Содержимое кольца на конец тика `tick`
///
/// `slots.len()` всегда == capacity кольца.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableSnapshot {
    pub tick: Tick,
    pub slots: Vec<Option<DisableEntry>>,
}

impl DisableSnapshot {
    /// Пустое кольцо (до первой доставки)
    pub fn empty(capacity: usize) -> Self {
        Self {
            tick: Tick::ZERO,
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

/// Последний опубликованный snapshot (authority → transport)
#[derive(Resource, Debug, Default)]
pub struct PublishedSnapshot {
    latest: Option<DisableSnapshot>,
}

impl PublishedSnapshot {
    pub fn publish(&mut self, snapshot: DisableSnapshot) {
        self.latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&DisableSnapshot> {
        self.latest.as_ref()
    }
}
