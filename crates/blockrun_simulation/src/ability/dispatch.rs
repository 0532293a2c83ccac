//! Ability dispatch: единая точка применения способностей
//!
//! Pipeline одного intent:
//! 1. Cooldown gate (generic, одинаковый для всех)
//! 2. Target gate: range из descriptor (если задан)
//! 3. Effect preconditions (уже в glide? блок уже выключен?)
//! 4. Commit: таймер заменяется через start_for (у glide позже, при окончании)
//! 5. Effect: match по AbilityEffect
//!
//! Отклонённый intent таймер не трогает.
//! Работает только на authority: replicas получают cooldowns через CooldownMirror.

use bevy::prelude::*;
use std::collections::HashMap;

use super::glide::start_glide_cooldown;
use super::{
    AbilityActivated, AbilityBook, AbilityCooldowns, AbilityEffect, AbilityIntent,
    AbilityRejected, GlideEndReason, GlideEnded, Gliding,
};
use crate::blocks::{BlockAccess, BlockId, BlockStates};
use crate::cooldown::CooldownTimer;
use crate::scheduler::{DisableOutcome, DisableScheduler};
use crate::tick::{SimTick, Tick};

/// Почему intent отклонён
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    OnCooldown { remaining_ticks: u64 },
    MissingTarget,
    OutOfRange { distance: f32, range: f32 },
    TargetAlreadyDisabled(BlockId),
    AlreadyGliding,
    UnknownActor,
}

/// Что host/ECS должен сделать после успешной активации
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AbilityOutcome {
    pub target: Option<BlockId>,
    pub enter_glide: bool,
    pub cancel_glide: bool,
    /// Блок, досрочно возвращённый overflow eviction'ом
    pub evicted: Option<BlockId>,
}

/// Применить одну способность
///
/// `gliding`: состояние актора до активации.
pub fn dispatch_ability(
    book: &AbilityBook,
    intent: &AbilityIntent,
    now: Tick,
    cooldowns: &mut AbilityCooldowns,
    gliding: bool,
    scheduler: &mut DisableScheduler,
    blocks: &mut impl BlockStates,
) -> Result<AbilityOutcome, RejectReason> {
    let descriptor = book.get(intent.kind);
    let kind = descriptor.kind;

    if !cooldowns.is_ready(kind, now) {
        return Err(RejectReason::OnCooldown {
            remaining_ticks: cooldowns.remaining_ticks(kind, now),
        });
    }

    let target = match descriptor.range {
        Some(range) => {
            let target = intent.target.ok_or(RejectReason::MissingTarget)?;
            if target.distance > range {
                return Err(RejectReason::OutOfRange {
                    distance: target.distance,
                    range,
                });
            }
            Some(target.block)
        }
        None => None,
    };

    match descriptor.effect {
        AbilityEffect::EnterGlide if gliding => return Err(RejectReason::AlreadyGliding),
        AbilityEffect::DisableTarget => {
            let block = target.ok_or(RejectReason::MissingTarget)?;
            if blocks.is_disabled(block) {
                return Err(RejectReason::TargetAlreadyDisabled(block));
            }
        }
        _ => {}
    }

    let mut outcome = AbilityOutcome {
        target,
        cancel_glide: gliding && descriptor.cancels_glide,
        ..default()
    };

    match descriptor.effect {
        AbilityEffect::Impulse => cooldowns.start(kind, now, descriptor.cooldown_ticks),
        AbilityEffect::EnterGlide => outcome.enter_glide = true,
        AbilityEffect::DisableTarget => {
            cooldowns.start(kind, now, descriptor.cooldown_ticks);
            if let Some(block) = target {
                if let DisableOutcome::Scheduled { evicted, .. } =
                    scheduler.disable(block, now, blocks)
                {
                    outcome.evicted = evicted;
                }
            }
        }
    }

    if outcome.cancel_glide {
        start_glide_cooldown(book, cooldowns, now);
    }

    Ok(outcome)
}

/// System: обработка AbilityIntent (authority, фаза Abilities)
#[allow(clippy::too_many_arguments)]
pub fn activate_abilities(
    tick: Res<SimTick>,
    book: Res<AbilityBook>,
    mut intents: EventReader<AbilityIntent>,
    mut actors: Query<(&mut AbilityCooldowns, Has<Gliding>)>,
    mut scheduler: ResMut<DisableScheduler>,
    mut blocks: BlockAccess,
    mut commands: Commands,
    mut activated: EventWriter<AbilityActivated>,
    mut rejected: EventWriter<AbilityRejected>,
    mut glide_ended: EventWriter<GlideEnded>,
) {
    let now = tick.now();
    // Commands применяются после системы: glide state внутри тика ведём сами
    let mut gliding_now: HashMap<Entity, bool> = HashMap::new();

    for intent in intents.read() {
        let result = match actors.get_mut(intent.actor) {
            Ok((mut cooldowns, has_gliding)) => {
                let gliding = gliding_now
                    .get(&intent.actor)
                    .copied()
                    .unwrap_or(has_gliding);
                dispatch_ability(
                    &book,
                    intent,
                    now,
                    &mut cooldowns,
                    gliding,
                    &mut scheduler,
                    &mut blocks,
                )
            }
            Err(_) => Err(RejectReason::UnknownActor),
        };

        match result {
            Ok(outcome) => {
                if outcome.cancel_glide {
                    commands.entity(intent.actor).remove::<Gliding>();
                    gliding_now.insert(intent.actor, false);
                    glide_ended.write(GlideEnded {
                        actor: intent.actor,
                        reason: GlideEndReason::Cancelled,
                    });
                }
                if outcome.enter_glide {
                    commands.entity(intent.actor).insert(Gliding {
                        ends: CooldownTimer::start_for(now, book.max_glide_ticks()),
                    });
                    gliding_now.insert(intent.actor, true);
                }

                activated.write(AbilityActivated {
                    actor: intent.actor,
                    kind: intent.kind,
                    target: outcome.target,
                });

                crate::log(&format!(
                    "Tick {}: {:?} used {} (target {:?})",
                    now,
                    intent.actor,
                    intent.kind.name(),
                    outcome.target
                ));
            }
            Err(reason) => {
                rejected.write(AbilityRejected {
                    actor: intent.actor,
                    kind: intent.kind,
                    reason,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{AbilityKind, AbilityTarget, GlideReleased};
    use crate::actor::Racer;
    use crate::blocks::test_support::MemoryBlocks;
    use crate::tick::NetRole;
    use crate::{create_session_app, run_tick, SessionConfig};

    struct Fixture {
        book: AbilityBook,
        cooldowns: AbilityCooldowns,
        scheduler: DisableScheduler,
        blocks: MemoryBlocks,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                book: AbilityBook::default(),
                cooldowns: AbilityCooldowns::default(),
                scheduler: DisableScheduler::new(4, 180),
                blocks: MemoryBlocks::with_blocks([1, 2]),
            }
        }

        fn use_ability(
            &mut self,
            kind: AbilityKind,
            target: Option<AbilityTarget>,
            now: u64,
            gliding: bool,
        ) -> Result<AbilityOutcome, RejectReason> {
            let intent = AbilityIntent {
                actor: Entity::PLACEHOLDER,
                kind,
                target,
            };
            dispatch_ability(
                &self.book,
                &intent,
                Tick(now),
                &mut self.cooldowns,
                gliding,
                &mut self.scheduler,
                &mut self.blocks,
            )
        }
    }

    fn aim(block: u32, distance: f32) -> Option<AbilityTarget> {
        Some(AbilityTarget {
            block: BlockId(block),
            distance,
        })
    }

    #[test]
    fn test_special_action_disables_block() {
        let mut fx = Fixture::new();
        let outcome = fx
            .use_ability(AbilityKind::SpecialAction, aim(1, 10.0), 0, false)
            .unwrap();

        assert_eq!(outcome.target, Some(BlockId(1)));
        assert!(fx.blocks.is_disabled(BlockId(1)));
        assert_eq!(fx.scheduler.len(), 1);
        assert!(!fx.cooldowns.is_ready(AbilityKind::SpecialAction, Tick(74)));
        assert!(fx.cooldowns.is_ready(AbilityKind::SpecialAction, Tick(75)));
    }

    #[test]
    fn test_cooldown_rejection_keeps_timer() {
        let mut fx = Fixture::new();
        fx.use_ability(AbilityKind::SpecialAction, aim(1, 5.0), 0, false)
            .unwrap();

        let err = fx
            .use_ability(AbilityKind::SpecialAction, aim(2, 5.0), 30, false)
            .unwrap_err();
        assert_eq!(err, RejectReason::OnCooldown { remaining_ticks: 45 });
        assert!(!fx.blocks.is_disabled(BlockId(2)));
        // Таймер не перезапущен
        assert!(fx.cooldowns.is_ready(AbilityKind::SpecialAction, Tick(75)));
    }

    #[test]
    fn test_range_and_target_gates() {
        let mut fx = Fixture::new();

        assert_eq!(
            fx.use_ability(AbilityKind::Grapple, None, 0, false),
            Err(RejectReason::MissingTarget)
        );
        assert_eq!(
            fx.use_ability(AbilityKind::Grapple, aim(1, 30.0), 0, false),
            Err(RejectReason::OutOfRange { distance: 30.0, range: 25.0 })
        );
        // Отклонения не запускают cooldown
        assert!(fx.cooldowns.is_ready(AbilityKind::Grapple, Tick(0)));

        let outcome = fx
            .use_ability(AbilityKind::Grapple, aim(1, 25.0), 0, false)
            .unwrap();
        assert_eq!(outcome.target, Some(BlockId(1)));
        // Grapple не выключает блок
        assert!(!fx.blocks.is_disabled(BlockId(1)));
    }

    #[test]
    fn test_already_disabled_target_rejected() {
        let mut fx = Fixture::new();
        fx.use_ability(AbilityKind::SpecialAction, aim(1, 5.0), 0, false)
            .unwrap();

        // Другой актор (свежие cooldowns) целится в тот же блок
        fx.cooldowns = AbilityCooldowns::default();
        assert_eq!(
            fx.use_ability(AbilityKind::SpecialAction, aim(1, 5.0), 1, false),
            Err(RejectReason::TargetAlreadyDisabled(BlockId(1)))
        );
        assert!(fx.cooldowns.is_ready(AbilityKind::SpecialAction, Tick(1)));
        assert_eq!(fx.scheduler.len(), 1);
    }

    #[test]
    fn test_glide_cancel_policy() {
        let mut fx = Fixture::new();

        let glide = fx.use_ability(AbilityKind::Glide, None, 0, false).unwrap();
        assert!(glide.enter_glide);
        // Cooldown glide ждёт окончания
        assert!(!fx.cooldowns.timer(AbilityKind::Glide).is_running());

        assert_eq!(
            fx.use_ability(AbilityKind::Glide, None, 5, true),
            Err(RejectReason::AlreadyGliding)
        );

        let jump = fx.use_ability(AbilityKind::DoubleJump, None, 10, true).unwrap();
        assert!(jump.cancel_glide);
        assert_eq!(
            fx.cooldowns.timer(AbilityKind::Glide).target_tick(),
            Some(Tick(1210))
        );

        // Не в glide → нечего отменять
        let grapple = fx
            .use_ability(AbilityKind::Grapple, aim(2, 3.0), 10, false)
            .unwrap();
        assert!(!grapple.cancel_glide);

        // SpecialAction glide не трогает
        let special = fx
            .use_ability(AbilityKind::SpecialAction, aim(2, 3.0), 10, true)
            .unwrap();
        assert!(!special.cancel_glide);
    }

    fn session_with_racer() -> (App, Entity) {
        let mut app = create_session_app(11, NetRole::Authority, SessionConfig::default());
        let racer = app.world_mut().spawn(Racer::new(1, "glider")).id();
        (app, racer)
    }

    fn intent(app: &mut App, actor: Entity, kind: AbilityKind) {
        app.world_mut().send_event(AbilityIntent {
            actor,
            kind,
            target: None,
        });
    }

    fn glide_ends(app: &App) -> Vec<GlideEndReason> {
        app.world()
            .resource::<Events<GlideEnded>>()
            .iter_current_update_events()
            .map(|event| event.reason)
            .collect()
    }

    #[test]
    fn test_double_jump_cancels_glide_started_same_tick() {
        let (mut app, racer) = session_with_racer();

        intent(&mut app, racer, AbilityKind::Glide);
        intent(&mut app, racer, AbilityKind::DoubleJump);
        run_tick(&mut app);

        assert!(app.world().get::<Gliding>(racer).is_none());
        assert_eq!(glide_ends(&app), vec![GlideEndReason::Cancelled]);
        let cooldowns = app.world().get::<AbilityCooldowns>(racer).unwrap();
        assert_eq!(
            cooldowns.timer(AbilityKind::Glide).target_tick(),
            Some(Tick(1200))
        );
    }

    #[test]
    fn test_second_glide_same_tick_rejected() {
        let (mut app, racer) = session_with_racer();

        intent(&mut app, racer, AbilityKind::Glide);
        intent(&mut app, racer, AbilityKind::Glide);
        run_tick(&mut app);

        let rejected: Vec<_> = app
            .world()
            .resource::<Events<AbilityRejected>>()
            .iter_current_update_events()
            .map(|event| event.reason)
            .collect();
        assert_eq!(rejected, vec![RejectReason::AlreadyGliding]);
        assert!(app.world().get::<Gliding>(racer).is_some());
    }

    #[test]
    fn test_glide_cooldown_starts_when_glide_expires() {
        let (mut app, racer) = session_with_racer();

        intent(&mut app, racer, AbilityKind::Glide);
        // Тики 0..=119: glide идёт (max_glide_ticks = 120)
        for _ in 0..120 {
            run_tick(&mut app);
        }
        assert!(app.world().get::<Gliding>(racer).is_some());
        assert!(app
            .world()
            .get::<AbilityCooldowns>(racer)
            .unwrap()
            .is_ready(AbilityKind::Glide, Tick(120)));

        // Тик 120: истёк
        run_tick(&mut app);
        assert!(app.world().get::<Gliding>(racer).is_none());
        assert_eq!(glide_ends(&app), vec![GlideEndReason::Expired]);
        let cooldowns = app.world().get::<AbilityCooldowns>(racer).unwrap();
        assert_eq!(
            cooldowns.timer(AbilityKind::Glide).target_tick(),
            Some(Tick(1320))
        );
    }

    #[test]
    fn test_released_glide_ends_early() {
        let (mut app, racer) = session_with_racer();

        intent(&mut app, racer, AbilityKind::Glide);
        for _ in 0..10 {
            run_tick(&mut app);
        }

        // Тик 10: отпустил кнопку
        app.world_mut().send_event(GlideReleased { actor: racer });
        run_tick(&mut app);

        assert!(app.world().get::<Gliding>(racer).is_none());
        assert_eq!(glide_ends(&app), vec![GlideEndReason::Released]);
        let cooldowns = app.world().get::<AbilityCooldowns>(racer).unwrap();
        assert_eq!(
            cooldowns.timer(AbilityKind::Glide).target_tick(),
            Some(Tick(1210))
        );
    }
}
