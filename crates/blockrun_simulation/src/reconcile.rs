//! SnapshotReconciler: replica-side зеркалирование DisableScheduler
//!
//! Replica НЕ исполняет game logic и никогда не решает, когда что истекает.
//! Каждый тик: diff(previous, current) по слотам кольца → переходы → локальные эффекты.
//!
//! Правила diff'а:
//! - слот не изменился → ничего (поэтому повторная доставка = no-op)
//! - был занят → re-enable предыдущего блока
//! - занят сейчас → disable текущего блока с его reappear_tick
//! - A → B в одном слоте = оба эффекта, не взаимоуничтожаются
//!
//! Все re-enables применяются раньше всех disables. Иначе блок, истёкший в слоте 5
//! и заново выключенный в слот 0 тем же тиком, остался бы на replica включённым.
//!
//! Пропущенный snapshot → diff против последнего реально увиденного.

use bevy::ecs::error::Result as SystemResult;
use bevy::prelude::*;
use thiserror::Error;

use crate::blocks::{BlockAccess, BlockId, BlockStates};
use crate::config::SessionConfig;
use crate::scheduler::DisableEntry;
use crate::snapshot::DisableSnapshot;
use crate::tick::{is_replica, NetRole, Tick, TickSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Host loop обязан всегда отдавать массивы длины capacity
    #[error("snapshot length mismatch: previous has {previous} slots, current has {current}")]
    LengthMismatch { previous: usize, current: usize },

    #[error("snapshot reconciliation must not run on the authority")]
    OnAuthority,
}

/// Локальный эффект, выведенный из diff'а
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reenable(BlockId),
    Disable { block: BlockId, reappear_tick: Tick },
}

/// Чистый diff двух состояний кольца
pub fn diff_snapshots(
    role: NetRole,
    previous: &[Option<DisableEntry>],
    current: &[Option<DisableEntry>],
) -> Result<Vec<Transition>, ReconcileError> {
    if role.is_authority() {
        return Err(ReconcileError::OnAuthority);
    }
    if previous.len() != current.len() {
        return Err(ReconcileError::LengthMismatch {
            previous: previous.len(),
            current: current.len(),
        });
    }

    let mut reenables = Vec::new();
    let mut disables = Vec::new();

    for (before, after) in previous.iter().zip(current) {
        if before == after {
            continue;
        }
        if let Some(entry) = before {
            reenables.push(Transition::Reenable(entry.block));
        }
        if let Some(entry) = after {
            disables.push(Transition::Disable {
                block: entry.block,
                reappear_tick: entry.reappear_tick,
            });
        }
    }

    reenables.extend(disables);
    Ok(reenables)
}

/// Применить переходы к локальным блокам. Отсутствующие блоки пропускаются.
pub fn apply_transitions(transitions: &[Transition], states: &mut impl BlockStates) -> usize {
    let mut applied = 0;
    for transition in transitions {
        let ok = match *transition {
            Transition::Reenable(block) => states.reenable(block),
            Transition::Disable {
                block,
                reappear_tick,
            } => states.disable(block, reappear_tick),
        };
        if ok {
            applied += 1;
        } else {
            crate::log(&format!("Reconcile: skipped {:?}, block not present", transition));
        }
    }
    applied
}

/// Replica-side состояние: последний увиденный snapshot + ожидающий доставки
#[derive(Resource, Debug)]
pub struct SnapshotReconciler {
    last_seen: DisableSnapshot,
    seen_any: bool,
    pending: Option<DisableSnapshot>,
    dropped_stale: u64,
}

impl SnapshotReconciler {
    pub fn new(capacity: usize) -> Self {
        Self {
            last_seen: DisableSnapshot::empty(capacity),
            seen_any: false,
            pending: None,
            dropped_stale: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.disable_capacity())
    }

    pub fn last_seen(&self) -> &DisableSnapshot {
        &self.last_seen
    }

    /// Snapshots, выброшенные как устаревшие (tick меньше уже увиденного)
    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Transport → replica. Несколько доставок до reconcile: побеждает самая новая.
    pub fn deliver(&mut self, snapshot: DisableSnapshot) {
        let newest_known = match &self.pending {
            Some(pending) => Some(pending.tick),
            None if self.seen_any => Some(self.last_seen.tick),
            None => None,
        };

        if newest_known.is_some_and(|tick| snapshot.tick < tick) {
            self.dropped_stale += 1;
            return;
        }
        self.pending = Some(snapshot);
    }

    /// Один шаг reconciliation: возвращает число применённых эффектов
    pub fn reconcile(
        &mut self,
        role: NetRole,
        states: &mut impl BlockStates,
    ) -> Result<usize, ReconcileError> {
        let Some(current) = self.pending.take() else {
            return Ok(0);
        };

        let transitions = diff_snapshots(role, &self.last_seen.slots, &current.slots)?;
        let applied = apply_transitions(&transitions, states);

        self.last_seen = current;
        self.seen_any = true;
        Ok(applied)
    }
}

impl Default for SnapshotReconciler {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// System: reconcile доставленного snapshot (replica, фаза Reconcile)
///
/// LengthMismatch фатален, ошибка уходит в Bevy error handler (panic по умолчанию).
pub fn reconcile_disabled_blocks(
    role: Res<NetRole>,
    mut reconciler: ResMut<SnapshotReconciler>,
    mut blocks: BlockAccess,
) -> SystemResult {
    let applied = reconciler.reconcile(*role, &mut blocks)?;
    if applied > 0 {
        crate::log(&format!(
            "Replica reconciled snapshot {}: {} effect(s)",
            reconciler.last_seen().tick,
            applied
        ));
    }
    Ok(())
}

pub struct ReconcilePlugin;

impl Plugin for ReconcilePlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SessionConfig>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(SnapshotReconciler::from_config(&config))
            .add_systems(
                FixedUpdate,
                reconcile_disabled_blocks
                    .in_set(TickSet::Reconcile)
                    .run_if(is_replica),
            );
    }
}
