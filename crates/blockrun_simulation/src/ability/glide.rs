//! Glide: airborne special mode
//!
//! Заканчивается сам через max_glide_ticks, по отпусканию кнопки (GlideReleased)
//! или обрывается grapple / double jump.
//!
//! Cooldown glide стартует в момент окончания, а не активации: пока актор
//! в glide, повторная активация отклоняется как AlreadyGliding.
//! Round reset обрывает glide без cooldown (reset_all уже всё очистил).

use bevy::prelude::*;

use super::{AbilityBook, AbilityCooldowns, AbilityKind};
use crate::cooldown::CooldownTimer;
use crate::tick::{SimTick, Tick};

#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Gliding {
    pub ends: CooldownTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlideEndReason {
    Expired,
    Released,
    Cancelled,
    RoundReset,
}

/// Event: игрок отпустил glide (host input → ECS)
#[derive(Event, Debug, Clone, Copy)]
pub struct GlideReleased {
    pub actor: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlideEnded {
    pub actor: Entity,
    pub reason: GlideEndReason,
}

/// Запустить cooldown glide от момента окончания
pub fn start_glide_cooldown(book: &AbilityBook, cooldowns: &mut AbilityCooldowns, now: Tick) {
    let duration = book.get(AbilityKind::Glide).cooldown_ticks;
    cooldowns.start(AbilityKind::Glide, now, duration);
}

/// System: снять Gliding по таймеру или по отпусканию (authority, фаза Expire)
pub fn end_glides(
    tick: Res<SimTick>,
    book: Res<AbilityBook>,
    mut released: EventReader<GlideReleased>,
    mut gliders: Query<(Entity, &Gliding, &mut AbilityCooldowns)>,
    mut commands: Commands,
    mut ended: EventWriter<GlideEnded>,
) {
    let now = tick.now();
    let released: Vec<Entity> = released.read().map(|event| event.actor).collect();

    for (actor, gliding, mut cooldowns) in gliders.iter_mut() {
        let reason = if released.contains(&actor) {
            GlideEndReason::Released
        } else if gliding.ends.is_expired_or_idle(now) {
            GlideEndReason::Expired
        } else {
            continue;
        };

        commands.entity(actor).remove::<Gliding>();
        start_glide_cooldown(&book, &mut cooldowns, now);
        ended.write(GlideEnded { actor, reason });
    }
}
