//! Blocks: препятствия, которые игроки могут временно "сломать"
//!
//! Entity handles разные в каждом процессе, поэтому всё, что уходит в snapshot,
//! адресует блок через стабильный `BlockId` (network id).
//! Каждый процесс держит свой BlockRegistry: BlockId → локальный Entity.
//!
//! Presentation (визуал/звук выключения) слушает события:
//! - BlockDisabled: блок исчез (collider + mesh off)
//! - BlockReenabled: блок вернулся
//! Их шлёт DisableScheduler на authority и reconciler на replicas.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::tick::{Tick, TickSet};

/// Стабильный network id блока (одинаковый на authority и replicas)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect, Serialize, Deserialize,
)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block:{}", self.0)
    }
}

/// Блок уровня
///
/// Инвариант: `reappear_tick.is_some() == disabled` (выставляются вместе).
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Block {
    pub id: BlockId,
    disabled: bool,
    reappear_tick: Option<Tick>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            disabled: false,
            reappear_tick: None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn reappear_tick(&self) -> Option<Tick> {
        self.reappear_tick
    }

    fn hide(&mut self, reappear_tick: Tick) {
        self.disabled = true;
        self.reappear_tick = Some(reappear_tick);
    }

    fn show(&mut self) {
        self.disabled = false;
        self.reappear_tick = None;
    }
}

/// Event: блок выключен (presentation countdown по `reappear_tick`)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDisabled {
    pub block: BlockId,
    pub reappear_tick: Tick,
}

/// Event: блок снова включён
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReenabled {
    pub block: BlockId,
}

/// BlockId ↔ Entity для этого процесса
#[derive(Resource, Debug, Default)]
pub struct BlockRegistry {
    by_id: HashMap<BlockId, Entity>,
    by_entity: HashMap<Entity, BlockId>,
}

impl BlockRegistry {
    pub fn get(&self, id: BlockId) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, id: BlockId, entity: Entity) {
        if let Some(previous) = self.by_id.insert(id, entity) {
            if previous != entity {
                crate::log_warning(&format!(
                    "BlockRegistry: {} re-bound {:?} → {:?}",
                    id, previous, entity
                ));
                self.by_entity.remove(&previous);
            }
        }
        self.by_entity.insert(entity, id);
    }

    pub fn forget(&mut self, entity: Entity) -> Option<BlockId> {
        let id = self.by_entity.remove(&entity)?;
        if self.by_id.get(&id) == Some(&entity) {
            self.by_id.remove(&id);
        }
        Some(id)
    }
}

/// Доступ к состоянию блоков для scheduler / reconciler
///
/// Отдельный trait, чтобы алгоритмы кольца и diff'а тестировались без App.
pub trait BlockStates {
    fn is_disabled(&self, block: BlockId) -> bool;

    /// Выключить блок до `reappear_tick`. false = блока нет (despawned) → no-op.
    fn disable(&mut self, block: BlockId, reappear_tick: Tick) -> bool;

    /// Включить блок. false = блока нет → no-op.
    fn reenable(&mut self, block: BlockId) -> bool;
}

/// ECS-реализация BlockStates: registry + Block components + presentation events
#[derive(SystemParam)]
pub struct BlockAccess<'w, 's> {
    registry: Res<'w, BlockRegistry>,
    blocks: Query<'w, 's, &'static mut Block>,
    disabled_events: EventWriter<'w, BlockDisabled>,
    reenabled_events: EventWriter<'w, BlockReenabled>,
}

impl BlockStates for BlockAccess<'_, '_> {
    fn is_disabled(&self, block: BlockId) -> bool {
        self.registry
            .get(block)
            .and_then(|entity| self.blocks.get(entity).ok())
            .is_some_and(|b| b.is_disabled())
    }

    fn disable(&mut self, block: BlockId, reappear_tick: Tick) -> bool {
        let Some(entity) = self.registry.get(block) else {
            return false;
        };
        let Ok(mut state) = self.blocks.get_mut(entity) else {
            return false;
        };
        state.hide(reappear_tick);
        self.disabled_events.write(BlockDisabled {
            block,
            reappear_tick,
        });
        true
    }

    fn reenable(&mut self, block: BlockId) -> bool {
        let Some(entity) = self.registry.get(block) else {
            return false;
        };
        let Ok(mut state) = self.blocks.get_mut(entity) else {
            return false;
        };
        state.show();
        self.reenabled_events.write(BlockReenabled { block });
        true
    }
}

/// System: зарегистрировать новые блоки, забыть удалённые
pub fn track_blocks(
    added: Query<(Entity, &Block), Added<Block>>,
    mut removed: RemovedComponents<Block>,
    mut registry: ResMut<BlockRegistry>,
) {
    for entity in removed.read() {
        if let Some(id) = registry.forget(entity) {
            crate::log(&format!("Block {} removed ({:?})", id, entity));
        }
    }

    for (entity, block) in added.iter() {
        registry.insert(block.id, entity);
    }
}

/// Отсортированный список (BlockId, reappear_tick) всех выключенных блоков
///
/// Используется для сравнения authority vs replica в тестах и headless binary.
pub fn disabled_blocks(world: &mut World) -> Vec<(BlockId, Tick)> {
    let mut query = world.query::<&Block>();
    let mut disabled: Vec<_> = query
        .iter(world)
        .filter_map(|block| block.reappear_tick().map(|tick| (block.id, tick)))
        .collect();
    disabled.sort();
    disabled
}

pub struct BlocksPlugin;

impl Plugin for BlocksPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BlockRegistry>()
            .add_event::<BlockDisabled>()
            .add_event::<BlockReenabled>()
            .add_systems(FixedUpdate, track_blocks.in_set(TickSet::Bookkeeping));
    }
}
