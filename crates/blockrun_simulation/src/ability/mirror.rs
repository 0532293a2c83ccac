//! Cooldown mirror: authority → replicas
//!
//! Replica не гоняет ability gate: её блоки отстают на snapshot, и любое
//! "предсказание" расходится с authority. Вместо этого authority каждый тик
//! публикует cooldowns + glide всех Racer'ов (CooldownSnapshot), а replica
//! перезаписывает свои копии целиком. Адресация по RacerId.
//!
//! Правила доставки те же, что у SnapshotReconciler: новейший pending побеждает,
//! устаревший отбрасывается, повтор ничего не меняет.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{AbilityCooldowns, Gliding};
use crate::actor::{Racer, RacerId};
use crate::cooldown::CooldownTimer;
use crate::tick::{SimTick, Tick};

/// Ability state одного игрока на конец тика
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacerAbilityState {
    pub racer: RacerId,
    pub cooldowns: AbilityCooldowns,
    /// Some = в glide до этого тика
    pub glide_ends: Option<Tick>,
}

/// Все игроки, отсортированы по RacerId
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownSnapshot {
    pub tick: Tick,
    pub racers: Vec<RacerAbilityState>,
}

impl CooldownSnapshot {
    pub fn get(&self, racer: RacerId) -> Option<&RacerAbilityState> {
        self.racers
            .binary_search_by_key(&racer, |state| state.racer)
            .ok()
            .map(|index| &self.racers[index])
    }
}

/// Последний опубликованный CooldownSnapshot (authority → transport)
#[derive(Resource, Debug, Default)]
pub struct PublishedCooldowns {
    latest: Option<CooldownSnapshot>,
}

impl PublishedCooldowns {
    pub fn publish(&mut self, snapshot: CooldownSnapshot) {
        self.latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&CooldownSnapshot> {
        self.latest.as_ref()
    }
}

/// Входящие CooldownSnapshot на replica
#[derive(Resource, Debug, Default)]
pub struct CooldownMirror {
    pending: Option<CooldownSnapshot>,
    last_applied: Option<Tick>,
    dropped_stale: u64,
}

impl CooldownMirror {
    pub fn last_applied(&self) -> Option<Tick> {
        self.last_applied
    }

    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }

    /// Transport → replica
    pub fn deliver(&mut self, snapshot: CooldownSnapshot) {
        let newest_known = self
            .pending
            .as_ref()
            .map(|pending| pending.tick)
            .or(self.last_applied);

        if newest_known.is_some_and(|tick| snapshot.tick < tick) {
            self.dropped_stale += 1;
            return;
        }
        self.pending = Some(snapshot);
    }

    fn take_pending(&mut self) -> Option<CooldownSnapshot> {
        let snapshot = self.pending.take()?;
        self.last_applied = Some(snapshot.tick);
        Some(snapshot)
    }
}

/// System: опубликовать cooldowns всех игроков (authority, фаза Publish)
pub fn publish_cooldowns(
    tick: Res<SimTick>,
    racers: Query<(&Racer, &AbilityCooldowns, Option<&Gliding>)>,
    mut published: ResMut<PublishedCooldowns>,
) {
    let mut states: Vec<RacerAbilityState> = racers
        .iter()
        .map(|(racer, cooldowns, gliding)| RacerAbilityState {
            racer: racer.id,
            cooldowns: cooldowns.clone(),
            glide_ends: gliding.and_then(|gliding| gliding.ends.target_tick()),
        })
        .collect();
    states.sort_by_key(|state| state.racer);

    published.publish(CooldownSnapshot {
        tick: tick.now(),
        racers: states,
    });
}

/// System: перезаписать cooldowns и glide из snapshot (replica, фаза Reconcile)
///
/// Игрок, которого authority ещё не знает, остаётся как есть.
pub fn mirror_cooldowns(
    mut mirror: ResMut<CooldownMirror>,
    mut racers: Query<(Entity, &Racer, &mut AbilityCooldowns, Option<&Gliding>)>,
    mut commands: Commands,
) {
    let Some(snapshot) = mirror.take_pending() else {
        return;
    };

    for (actor, racer, mut cooldowns, gliding) in racers.iter_mut() {
        let Some(state) = snapshot.get(racer.id) else {
            continue;
        };

        if *cooldowns != state.cooldowns {
            *cooldowns = state.cooldowns.clone();
        }

        let local_glide = gliding.and_then(|gliding| gliding.ends.target_tick());
        match state.glide_ends {
            Some(ends) if local_glide != Some(ends) => {
                commands.entity(actor).insert(Gliding {
                    ends: CooldownTimer::expiring_at(ends),
                });
            }
            None if gliding.is_some() => {
                commands.entity(actor).remove::<Gliding>();
            }
            _ => {}
        }
    }
}

/// Отсортированный список (RacerId, AbilityCooldowns) для сравнения ролей
pub fn racer_cooldowns(world: &mut World) -> Vec<(RacerId, AbilityCooldowns)> {
    let mut query = world.query::<(&Racer, &AbilityCooldowns)>();
    let mut cooldowns: Vec<_> = query
        .iter(world)
        .map(|(racer, cooldowns)| (racer.id, cooldowns.clone()))
        .collect();
    cooldowns.sort_by_key(|(id, _)| *id);
    cooldowns
}
