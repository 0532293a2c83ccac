//! Headless lockstep симуляция BLOCKRUN
//!
//! Authority + replica в одном процессе. Authority публикует DisableSnapshot и
//! CooldownSnapshot каждый тик, цикл ниже "доставляет" их replica и проверяет,
//! что выключены одни и те же блоки и у игроков одни и те же cooldowns.
//!
//! Usage: blockrun_simulation [config.ron] [ticks]

use bevy::prelude::*;
use rand::Rng;

use blockrun_simulation::{
    create_session_app, disabled_blocks, run_tick, AbilityIntent, AbilityKind, AbilityTarget,
    Block, BlockId, CooldownMirror, DeterministicRng, DisableScheduler, NetRole, PlayerReady,
    PublishedCooldowns, PublishedSnapshot, Racer, SessionConfig, SnapshotReconciler,
    racer_cooldowns,
};

const BLOCK_COUNT: u32 = 48;
const BOT_COUNT: usize = 4;

fn spawn_level(app: &mut App) -> Vec<Entity> {
    let world = app.world_mut();
    for id in 0..BLOCK_COUNT {
        world.spawn(Block::new(BlockId(id)));
    }
    (0..BOT_COUNT)
        .map(|i| world.spawn(Racer::new(i as u32, format!("bot_{}", i))).id())
        .collect()
}

/// Случайное намерение бота (или ничего в этом тике)
fn roll_intent(rng: &mut DeterministicRng, range: f32) -> Option<(AbilityKind, Option<AbilityTarget>)> {
    let rng = &mut rng.rng;
    if !rng.gen_bool(0.15) {
        return None;
    }

    let kind = AbilityKind::ALL[rng.gen_range(0..AbilityKind::ALL.len())];
    let target = AbilityTarget {
        block: BlockId(rng.gen_range(0..BLOCK_COUNT)),
        // Иногда промахиваемся за range
        distance: rng.gen_range(0.0..range * 1.4),
    };
    Some((kind, Some(target)))
}

fn main() {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match SessionConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => SessionConfig::default(),
    };
    let ticks: u64 = args.next().and_then(|t| t.parse().ok()).unwrap_or(3600);

    let seed = 42;
    println!(
        "Starting BLOCKRUN lockstep simulation (seed: {}, {} Hz, {} ticks)",
        seed, config.tick_rate_hz, ticks
    );

    let range = config.ability_range;
    let mut authority = create_session_app(seed, NetRole::Authority, config.clone());
    let mut replica = create_session_app(seed, NetRole::Replica, config);

    let authority_bots = spawn_level(&mut authority);
    // Replica знает игроков только по RacerId, Entity ей не нужны
    spawn_level(&mut replica);

    for &actor in &authority_bots {
        authority.world_mut().send_event(PlayerReady { actor });
    }

    let mut divergent_ticks = 0u64;

    for tick in 0..ticks {
        // Intents роллятся на authority RNG, решает только authority
        for (bot, &actor) in authority_bots.iter().enumerate() {
            let intent = {
                let mut rng = authority.world_mut().resource_mut::<DeterministicRng>();
                roll_intent(&mut rng, range)
            };
            let Some((kind, target)) = intent else {
                continue;
            };
            if tick % 600 == 0 {
                println!("Tick {}: bot_{} → {}", tick, bot, kind.name());
            }
            authority.world_mut().send_event(AbilityIntent { actor, kind, target });
        }

        run_tick(&mut authority);

        // "Транспорт": snapshots этого тика → replica
        let snapshot = authority.world().resource::<PublishedSnapshot>().latest().cloned();
        if let Some(snapshot) = snapshot {
            replica.world_mut().resource_mut::<SnapshotReconciler>().deliver(snapshot);
        }
        let cooldowns = authority.world().resource::<PublishedCooldowns>().latest().cloned();
        if let Some(cooldowns) = cooldowns {
            replica.world_mut().resource_mut::<CooldownMirror>().deliver(cooldowns);
        }

        run_tick(&mut replica);

        let expected = disabled_blocks(authority.world_mut());
        let actual = disabled_blocks(replica.world_mut());
        if expected != actual {
            divergent_ticks += 1;
            eprintln!("Tick {}: replica diverged ({:?} vs {:?})", tick, expected, actual);
        }
        if racer_cooldowns(authority.world_mut()) != racer_cooldowns(replica.world_mut()) {
            divergent_ticks += 1;
            eprintln!("Tick {}: replica cooldowns diverged", tick);
        }

        if tick % 600 == 0 {
            let scheduler = authority.world().resource::<DisableScheduler>();
            println!(
                "Tick {}: {} disabled, {} evictions",
                tick,
                expected.len(),
                scheduler.evictions()
            );
        }
    }

    if divergent_ticks > 0 {
        eprintln!("Simulation finished with {} divergent ticks", divergent_ticks);
        std::process::exit(1);
    }
    println!("Simulation complete! Replica matched authority on every tick.");
}
