//! BLOCKRUN Simulation Core
//!
//! ECS-симуляция на Bevy 0.16 (tick-based ability + block disable layer)
//!
//! HYBRID ARCHITECTURE:
//! - ECS = authoritative game state (cooldowns, disabled blocks, round flow)
//! - Host = physics, rendering, raycasts, transport
//!
//! Authority гоняет DisableScheduler и публикует DisableSnapshot каждый тик.
//! Replica никогда не решает сама, когда блок возвращается: она только
//! сравнивает соседние snapshots (SnapshotReconciler) и применяет разницу.
//! Cooldowns игроков replica тоже не считает: зеркалит CooldownSnapshot authority.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ability;
pub mod actor;
pub mod blocks;
pub mod config;
pub mod cooldown;
pub mod hud;
pub mod logger;
pub mod reconcile;
pub mod round;
pub mod scheduler;
pub mod snapshot;
pub mod tick;

// Re-export для удобства host'а
pub use ability::{
    AbilityActivated, AbilityBook, AbilityCooldowns, AbilityDescriptor, AbilityEffect,
    AbilityIntent, AbilityKind, AbilityPlugin, AbilityRejected, AbilityTarget, CooldownMirror,
    CooldownSnapshot, GlideEndReason, GlideEnded, GlideReleased, Gliding, PublishedCooldowns,
    RacerAbilityState, RejectReason, racer_cooldowns,
};
pub use actor::{Racer, RacerId};
pub use blocks::{
    disabled_blocks, Block, BlockDisabled, BlockId, BlockReenabled, BlockRegistry, BlockStates,
    BlocksPlugin,
};
pub use config::{AbilityCooldownTicks, ConfigError, SessionConfig};
pub use cooldown::CooldownTimer;
pub use hud::{CooldownHud, HudPlugin};
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, log_with_level, set_log_level,
    set_logger, set_logger_if_needed, ConsoleLogger, LogLevel, LogPrinter,
};
pub use reconcile::{ReconcileError, ReconcilePlugin, SnapshotReconciler, Transition};
pub use round::{
    FinishReached, PlayerReady, RoundFinished, RoundPhase, RoundPlugin, RoundStarted, RoundState,
};
pub use scheduler::{DisableEntry, DisableOutcome, DisableScheduler, DisableSchedulerPlugin};
pub use snapshot::{DisableSnapshot, PublishedSnapshot};
pub use tick::{secs_to_ticks, NetRole, SimTick, Tick, TickPlugin, TickSet};

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// SessionConfig читается plugin'ами в момент build: вставляй его ДО add_plugins.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<SessionConfig>() {
            app.insert_resource(SessionConfig::default());
        }

        app.add_plugins((
            TickPlugin,
            BlocksPlugin,
            DisableSchedulerPlugin,
            ReconcilePlugin,
            AbilityPlugin,
            RoundPlugin,
            HudPlugin,
        ));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции (без SimulationPlugin)
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Полная сессия одной роли: authority или replica
pub fn create_session_app(seed: u64, role: NetRole, config: SessionConfig) -> App {
    let mut app = create_headless_app(seed);
    app.insert_resource(Time::<Fixed>::from_hz(f64::from(config.tick_rate_hz)))
        .insert_resource(role)
        .insert_resource(config)
        .add_plugins(SimulationPlugin);

    app
}

/// Ровно один simulation tick
///
/// FixedUpdate гоняется напрямую, а не через `app.update()`: число шагов не зависит
/// от wall clock, поэтому тесты и lockstep binary детерминированы.
///
/// `First` (а с ним event_update_system) здесь не запускается, поэтому event
/// buffers переключаем сами в начале тика. Events прошлого тика ещё читаемы
/// в этом, позапрошлого уже нет.
pub fn run_tick(app: &mut App) {
    let world = app.world_mut();
    if let Err(err) = world.run_system_cached(bevy::ecs::event::event_update_system) {
        log_error(&format!("event update failed: {}", err));
    }
    world.run_schedule(FixedUpdate);
    world.clear_trackers();
}
