//! Round flow (authority)
//!
//! Waiting → (все ready) → Playing → (кто-то дошёл до финиша) → Waiting
//!
//! Старт раунда = внешняя policy, которая принудительно сбрасывает все cooldowns
//! и обрывает glide. Это обычная перезапись из того же tick step, гонок нет.

use bevy::prelude::*;

use crate::ability::{activate_abilities, AbilityCooldowns, GlideEndReason, GlideEnded, Gliding};
use crate::actor::Racer;
use crate::tick::{is_authority, TickSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum RoundPhase {
    #[default]
    Waiting,
    Playing,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RoundState {
    pub phase: RoundPhase,
    pub winner: Option<Entity>,
    /// Номер текущего/последнего раунда (0 = ещё не стартовали)
    pub round: u32,
}

/// Event: игрок готов (host lobby UI → ECS)
#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerReady {
    pub actor: Entity,
}

/// Event: игрок вошёл в финишный trigger (host physics → ECS)
#[derive(Event, Debug, Clone, Copy)]
pub struct FinishReached {
    pub actor: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStarted {
    pub round: u32,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundFinished {
    pub round: u32,
    pub winner: Entity,
}

/// System: отметить готовых игроков
pub fn mark_ready(mut events: EventReader<PlayerReady>, mut racers: Query<&mut Racer>) {
    for event in events.read() {
        if let Ok(mut racer) = racers.get_mut(event.actor) {
            racer.ready = true;
        }
    }
}

/// System: первый дошедший до финиша побеждает, все снова не готовы
pub fn finish_round(
    mut events: EventReader<FinishReached>,
    mut state: ResMut<RoundState>,
    mut racers: Query<&mut Racer>,
    mut finished: EventWriter<RoundFinished>,
) {
    for event in events.read() {
        if state.phase != RoundPhase::Playing || state.winner.is_some() {
            continue;
        }
        if !racers.contains(event.actor) {
            continue;
        }

        state.winner = Some(event.actor);
        state.phase = RoundPhase::Waiting;
        for mut racer in racers.iter_mut() {
            racer.ready = false;
        }

        finished.write(RoundFinished {
            round: state.round,
            winner: event.actor,
        });
        crate::log_info(&format!("Round {} won by {:?}", state.round, event.actor));
    }
}

/// System: все готовы → новый раунд, сброс cooldowns и glide
pub fn start_round_when_ready(
    mut state: ResMut<RoundState>,
    mut racers: Query<(Entity, &Racer, &mut AbilityCooldowns, Has<Gliding>)>,
    mut commands: Commands,
    mut started: EventWriter<RoundStarted>,
    mut glide_ended: EventWriter<GlideEnded>,
) {
    if state.phase != RoundPhase::Waiting {
        return;
    }
    if racers.is_empty() || racers.iter().any(|(_, racer, _, _)| !racer.ready) {
        return;
    }

    state.phase = RoundPhase::Playing;
    state.winner = None;
    state.round += 1;

    for (actor, _, mut cooldowns, gliding) in racers.iter_mut() {
        cooldowns.reset_all();
        if gliding {
            commands.entity(actor).remove::<Gliding>();
            glide_ended.write(GlideEnded {
                actor,
                reason: GlideEndReason::RoundReset,
            });
        }
    }

    started.write(RoundStarted { round: state.round });
    crate::log_info(&format!("Round {} started", state.round));
}

pub struct RoundPlugin;

impl Plugin for RoundPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoundState>()
            .add_event::<PlayerReady>()
            .add_event::<FinishReached>()
            .add_event::<RoundStarted>()
            .add_event::<RoundFinished>()
            .add_systems(
                FixedUpdate,
                (mark_ready, finish_round, start_round_when_ready)
                    .chain()
                    .in_set(TickSet::Abilities)
                    .before(activate_abilities)
                    .run_if(is_authority),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityKind;
    use crate::cooldown::CooldownTimer;
    use crate::tick::{NetRole, Tick};
    use crate::{create_session_app, run_tick, SessionConfig};

    fn session_with_racers() -> (App, Entity, Entity) {
        let mut app = create_session_app(3, NetRole::Authority, SessionConfig::default());
        let alice = app.world_mut().spawn(Racer::new(1, "alice")).id();
        let bob = app.world_mut().spawn(Racer::new(2, "bob")).id();
        (app, alice, bob)
    }

    fn sent<E: Event + Clone>(app: &App) -> Vec<E> {
        app.world()
            .resource::<Events<E>>()
            .iter_current_update_events()
            .cloned()
            .collect()
    }

    #[test]
    fn test_round_waits_for_everyone() {
        let (mut app, alice, _bob) = session_with_racers();

        app.world_mut().send_event(PlayerReady { actor: alice });
        run_tick(&mut app);

        let state = app.world().resource::<RoundState>();
        assert_eq!(state.phase, RoundPhase::Waiting);
        assert_eq!(state.round, 0);
        assert!(sent::<RoundStarted>(&app).is_empty());
    }

    #[test]
    fn test_round_start_resets_cooldowns_and_glide() {
        let (mut app, alice, bob) = session_with_racers();

        app.world_mut()
            .get_mut::<AbilityCooldowns>(alice)
            .unwrap()
            .start(AbilityKind::Grapple, Tick(0), 500);
        app.world_mut().entity_mut(bob).insert(Gliding {
            ends: CooldownTimer::start_for(Tick(0), 1000),
        });

        app.world_mut().send_event(PlayerReady { actor: alice });
        app.world_mut().send_event(PlayerReady { actor: bob });
        run_tick(&mut app);

        let state = app.world().resource::<RoundState>();
        assert_eq!(state.phase, RoundPhase::Playing);
        assert_eq!(state.round, 1);
        assert_eq!(sent::<RoundStarted>(&app), vec![RoundStarted { round: 1 }]);

        let cooldowns = app.world().get::<AbilityCooldowns>(alice).unwrap();
        assert!(cooldowns.is_ready(AbilityKind::Grapple, Tick(1)));
        assert!(app.world().get::<Gliding>(bob).is_none());
        assert_eq!(
            sent::<GlideEnded>(&app),
            vec![GlideEnded { actor: bob, reason: GlideEndReason::RoundReset }]
        );
    }

    #[test]
    fn test_first_finisher_wins() {
        let (mut app, alice, bob) = session_with_racers();
        app.world_mut().send_event(PlayerReady { actor: alice });
        app.world_mut().send_event(PlayerReady { actor: bob });
        run_tick(&mut app);

        app.world_mut().send_event(FinishReached { actor: bob });
        app.world_mut().send_event(FinishReached { actor: alice });
        run_tick(&mut app);

        let state = app.world().resource::<RoundState>();
        assert_eq!(state.phase, RoundPhase::Waiting);
        assert_eq!(state.winner, Some(bob));
        assert_eq!(
            sent::<RoundFinished>(&app),
            vec![RoundFinished { round: 1, winner: bob }]
        );

        // Все снова должны нажать ready
        assert!(!app.world().get::<Racer>(alice).unwrap().ready);
        assert!(!app.world().get::<Racer>(bob).unwrap().ready);
    }

    #[test]
    fn test_finish_ignored_while_waiting() {
        let (mut app, alice, _bob) = session_with_racers();
        app.world_mut().send_event(FinishReached { actor: alice });
        run_tick(&mut app);

        assert_eq!(app.world().resource::<RoundState>().winner, None);
        assert!(sent::<RoundFinished>(&app).is_empty());
    }
}
