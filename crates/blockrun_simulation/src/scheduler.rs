//! DisableScheduler: authoritative кольцо "блок выключен до tick T"
//!
//! Архитектура:
//! - Fixed-capacity ring: `head` = следующий слот для вставки, `tail` = самый старый pending
//! - Порядок FIFO по вставке == порядок по deadline, потому что у всех entries
//!   одинаковая длительность (`duration_ticks`). Если длительности когда-нибудь
//!   станут разными, нужна priority queue по reappear_tick, кольцо сломается.
//! - Переполнение: самый старый disable принудительно обрывается (блок
//!   возвращается раньше срока). `disable` никогда не фейлится.
//!
//! Только authority мутирует кольцо. Replicas видят его через DisableSnapshot.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blocks::{BlockAccess, BlockId, BlockStates};
use crate::config::SessionConfig;
use crate::snapshot::{DisableSnapshot, PublishedSnapshot};
use crate::tick::{is_authority, SimTick, Tick, TickSet};

/// Один выключенный блок в слоте кольца
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub struct DisableEntry {
    pub block: BlockId,
    pub reappear_tick: Tick,
}

/// Результат `DisableScheduler::disable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    Scheduled {
        reappear_tick: Tick,
        /// Блок, принудительно возвращённый из-за переполнения
        evicted: Option<BlockId>,
    },
    /// Блок уже в кольце, повторно не вставляем
    AlreadyDisabled,
}

#[derive(Resource, Debug, Clone)]
pub struct DisableScheduler {
    slots: Vec<Option<DisableEntry>>,
    head: usize,
    tail: usize,
    len: usize,
    duration_ticks: u64,
    evictions: u64,
}

impl DisableScheduler {
    pub fn new(capacity: usize, duration_ticks: u64) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            tail: 0,
            len: 0,
            duration_ticks,
            evictions: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.disable_capacity(), config.disable_duration_ticks)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Занятые слоты (≤ capacity)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }

    /// Сколько раз срабатывал overflow eviction за сессию
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn slots(&self) -> &[Option<DisableEntry>] {
        &self.slots
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.slots.iter().flatten().any(|entry| entry.block == block)
    }

    fn step(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Выключить блок на `duration_ticks` от `now`
    ///
    /// Caller уже проверил cooldown/range актора, здесь не перепроверяем.
    pub fn disable(
        &mut self,
        block: BlockId,
        now: Tick,
        states: &mut impl BlockStates,
    ) -> DisableOutcome {
        if self.contains(block) {
            crate::log_warning(&format!(
                "DisableScheduler: {} already disabled, ignoring (tick {})",
                block, now
            ));
            return DisableOutcome::AlreadyDisabled;
        }

        let slot = self.head;
        let mut evicted = None;

        if let Some(oldest) = self.slots[slot].take() {
            // Занятый head = кольцо полно, head == tail
            debug_assert_eq!(self.head, self.tail);
            if !states.reenable(oldest.block) {
                crate::log(&format!("Evicted {} no longer exists", oldest.block));
            }
            self.tail = self.step(self.tail);
            self.len -= 1;
            self.evictions += 1;
            evicted = Some(oldest.block);

            crate::log_warning(&format!(
                "⚠️ DisableScheduler overflow (capacity {}): {} reinstated early (was due {}, now {})",
                self.capacity(),
                oldest.block,
                oldest.reappear_tick,
                now
            ));
        }

        let reappear_tick = now.after(self.duration_ticks);
        if !states.disable(block, reappear_tick) {
            crate::log(&format!("Disable target {} does not exist, slot kept", block));
        }

        self.slots[slot] = Some(DisableEntry {
            block,
            reappear_tick,
        });
        self.head = self.step(slot);
        self.len += 1;

        DisableOutcome::Scheduled {
            reappear_tick,
            evicted,
        }
    }

    /// Вернуть все блоки, чей deadline ≤ now. Возвращает количество.
    ///
    /// Единственное место, где authority включает блоки обратно по таймеру.
    pub fn advance(&mut self, now: Tick, states: &mut impl BlockStates) -> usize {
        let mut reenabled = 0;

        while let Some(entry) = self.slots[self.tail] {
            if entry.reappear_tick > now {
                break;
            }

            self.slots[self.tail] = None;
            if !states.reenable(entry.block) {
                crate::log(&format!("Expired {} no longer exists", entry.block));
            }
            self.tail = self.step(self.tail);
            self.len -= 1;
            reenabled += 1;
        }

        reenabled
    }

    /// Полная копия кольца для replicas
    pub fn snapshot(&self, tick: Tick) -> DisableSnapshot {
        DisableSnapshot {
            tick,
            slots: self.slots.clone(),
        }
    }
}

impl Default for DisableScheduler {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// System: истечение disables (authority, фаза Expire)
pub fn advance_disables(
    tick: Res<SimTick>,
    mut scheduler: ResMut<DisableScheduler>,
    mut blocks: BlockAccess,
) {
    let now = tick.now();
    let reenabled = scheduler.advance(now, &mut blocks);
    if reenabled > 0 {
        crate::log(&format!(
            "Tick {}: {} block(s) reappeared, {} pending",
            now,
            reenabled,
            scheduler.len()
        ));
    }
}

/// System: опубликовать snapshot кольца этого тика (authority, фаза Publish)
pub fn publish_disable_snapshot(
    tick: Res<SimTick>,
    scheduler: Res<DisableScheduler>,
    mut published: ResMut<PublishedSnapshot>,
) {
    published.publish(scheduler.snapshot(tick.now()));
}

/// Scheduler plugin (authority-only системы, на replica просто не запускаются)
pub struct DisableSchedulerPlugin;

impl Plugin for DisableSchedulerPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SessionConfig>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(DisableScheduler::from_config(&config))
            .init_resource::<PublishedSnapshot>()
            .add_systems(
                FixedUpdate,
                (
                    advance_disables.in_set(TickSet::Expire),
                    publish_disable_snapshot.in_set(TickSet::Publish),
                )
                    .run_if(is_authority),
            );
    }
}
