//! Simulation clock: fixed-step tick counter + network role
//!
//! Один tick = один шаг FixedUpdate. Все таймеры (cooldowns, disable deadlines)
//! считаются в тиках, а не в секундах: authority и replicas идут в lockstep
//! и должны получать одинаковые deadlines.
//!
//! Порядок внутри тика (TickSet, chained):
//! 1. Bookkeeping: регистрация новых/удалённых блоков
//! 2. Expire: DisableScheduler::advance, окончание glide (authority)
//! 3. Abilities: intents → cooldown gate → dispatch (authority)
//! 4. Publish: snapshot кольца и cooldowns для replicas (authority)
//! 5. Reconcile: diff snapshot'ов, зеркало cooldowns (replica)
//! 6. Presentation: HUD readouts
//! 7. Clock: SimTick += 1 (последним, чтобы весь тик видел один `now`)

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Номер шага симуляции. Монотонно растёт, wraparound не рассматриваем.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub fn get(self) -> u64 {
        self.0
    }

    /// Tick через `ticks` шагов от этого
    pub fn after(self, ticks: u64) -> Tick {
        Tick(self.0.saturating_add(ticks))
    }

    pub fn next(self) -> Tick {
        self.after(1)
    }

    /// Сколько тиков осталось до `later` (0 если `later` уже прошёл)
    pub fn ticks_until(self, later: Tick) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Секунды → тики (округление вверх, отрицательные → 0)
pub fn secs_to_ticks(secs: f32, tick_rate_hz: u32) -> u64 {
    let ticks = (secs as f64 * tick_rate_hz as f64).ceil();
    if ticks <= 0.0 {
        0
    } else {
        ticks as u64
    }
}

/// Текущий tick этого процесса (TickClock)
#[derive(Resource, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Resource)]
pub struct SimTick {
    pub current: Tick,
}

impl SimTick {
    pub fn now(&self) -> Tick {
        self.current
    }

    /// Перейти к следующему тику, вернуть новый номер
    pub fn advance(&mut self) -> Tick {
        self.current = self.current.next();
        self.current
    }
}

/// Роль процесса в сессии
///
/// Authority: единственный writer DisableScheduler.
/// Replica: только зеркалит snapshots, никогда не решает когда что истекает.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[reflect(Resource)]
pub enum NetRole {
    #[default]
    Authority,
    Replica,
}

impl NetRole {
    pub fn is_authority(self) -> bool {
        self == NetRole::Authority
    }
}

/// Run condition: только на authority
pub fn is_authority(role: Res<NetRole>) -> bool {
    role.is_authority()
}

/// Run condition: только на replica
pub fn is_replica(role: Res<NetRole>) -> bool {
    !role.is_authority()
}

/// Фазы одного тика (см. module docs)
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSet {
    Bookkeeping,
    Expire,
    Abilities,
    Publish,
    Reconcile,
    Presentation,
    Clock,
}

/// System: продвинуть TickClock (последняя фаза тика)
pub fn advance_sim_tick(mut tick: ResMut<SimTick>) {
    tick.advance();
}

/// Clock plugin: SimTick + порядок фаз в FixedUpdate
pub struct TickPlugin;

impl Plugin for TickPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimTick>()
            .init_resource::<NetRole>()
            .configure_sets(
                FixedUpdate,
                (
                    TickSet::Bookkeeping,
                    TickSet::Expire,
                    TickSet::Abilities,
                    TickSet::Publish,
                    TickSet::Reconcile,
                    TickSet::Presentation,
                    TickSet::Clock,
                )
                    .chain(),
            )
            .add_systems(FixedUpdate, advance_sim_tick.in_set(TickSet::Clock));
    }
}
