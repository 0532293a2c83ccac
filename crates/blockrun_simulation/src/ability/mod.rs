//! Ability system (grapple, glide, double jump, break block)
//!
//! ECS ответственность:
//! - Cooldown gate на каждого актора (AbilityCooldowns)
//! - Dispatch по tagged descriptor (AbilityBook): одна функция, без наследования
//! - Break block → DisableScheduler
//! - Всё это только на authority; replicas зеркалят cooldowns (mirror.rs)
//!
//! Host ответственность (вне crate):
//! - Raycast: какой блок под прицелом и на каком расстоянии (AbilityTarget)
//! - Physics: impulse для grapple/jump по AbilityActivated
//!
//! Events: AbilityIntent, GlideReleased (host → ECS), AbilityActivated / AbilityRejected (ECS → host)

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blocks::BlockId;
use crate::config::SessionConfig;
use crate::tick::{is_authority, is_replica, TickSet};

pub mod cooldowns;
pub mod dispatch;
pub mod glide;
pub mod mirror;

pub use cooldowns::AbilityCooldowns;
pub use dispatch::{activate_abilities, dispatch_ability, AbilityOutcome, RejectReason};
pub use glide::{end_glides, GlideEndReason, GlideEnded, GlideReleased, Gliding};
pub use mirror::{
    mirror_cooldowns, publish_cooldowns, racer_cooldowns, CooldownMirror, CooldownSnapshot,
    PublishedCooldowns, RacerAbilityState,
};

/// Именованные способности актора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AbilityKind {
    Grapple,
    Glide,
    DoubleJump,
    /// Break block: временно выключить блок под прицелом
    SpecialAction,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 4] = [
        AbilityKind::Grapple,
        AbilityKind::Glide,
        AbilityKind::DoubleJump,
        AbilityKind::SpecialAction,
    ];

    pub fn index(self) -> usize {
        match self {
            AbilityKind::Grapple => 0,
            AbilityKind::Glide => 1,
            AbilityKind::DoubleJump => 2,
            AbilityKind::SpecialAction => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AbilityKind::Grapple => "grapple",
            AbilityKind::Glide => "glide",
            AbilityKind::DoubleJump => "double_jump",
            AbilityKind::SpecialAction => "special_action",
        }
    }
}

/// Что делает способность после прохождения gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum AbilityEffect {
    /// Host применяет impulse (grapple pull, double jump)
    Impulse,
    /// Войти в glide (airborne special mode)
    EnterGlide,
    /// Выключить целевой блок через DisableScheduler
    DisableTarget,
}

/// Tagged descriptor способности
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct AbilityDescriptor {
    pub kind: AbilityKind,
    /// Some = нужна цель-блок не дальше range (метры)
    pub range: Option<f32>,
    pub cooldown_ticks: u64,
    pub effect: AbilityEffect,
    /// Активация обрывает текущий glide
    pub cancels_glide: bool,
}

/// Descriptors всех способностей сессии
#[derive(Resource, Debug, Clone)]
pub struct AbilityBook {
    descriptors: [AbilityDescriptor; 4],
    max_glide_ticks: u64,
}

impl AbilityBook {
    pub fn from_config(config: &SessionConfig) -> Self {
        let range = Some(config.ability_range);
        let descriptor = |kind, range, effect, cancels_glide| AbilityDescriptor {
            kind,
            range,
            cooldown_ticks: config.cooldown_ticks(kind),
            effect,
            cancels_glide,
        };

        Self {
            descriptors: [
                descriptor(AbilityKind::Grapple, range, AbilityEffect::Impulse, true),
                descriptor(AbilityKind::Glide, None, AbilityEffect::EnterGlide, false),
                descriptor(AbilityKind::DoubleJump, None, AbilityEffect::Impulse, true),
                descriptor(AbilityKind::SpecialAction, range, AbilityEffect::DisableTarget, false),
            ],
            max_glide_ticks: config.max_glide_ticks,
        }
    }

    pub fn get(&self, kind: AbilityKind) -> &AbilityDescriptor {
        &self.descriptors[kind.index()]
    }

    pub fn max_glide_ticks(&self) -> u64 {
        self.max_glide_ticks
    }
}

impl Default for AbilityBook {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Цель под прицелом (host raycast)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityTarget {
    pub block: BlockId,
    /// Расстояние от актора до точки попадания (метры)
    pub distance: f32,
}

/// Event: актёр ХОЧЕТ применить способность (host input → ECS)
#[derive(Event, Debug, Clone, Copy)]
pub struct AbilityIntent {
    pub actor: Entity,
    pub kind: AbilityKind,
    pub target: Option<AbilityTarget>,
}

/// Event: способность применена (ECS → host physics/audio)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AbilityActivated {
    pub actor: Entity,
    pub kind: AbilityKind,
    pub target: Option<BlockId>,
}

/// Event: способность отклонена (debug / UI feedback)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AbilityRejected {
    pub actor: Entity,
    pub kind: AbilityKind,
    pub reason: RejectReason,
}

/// Ability Plugin
///
/// Порядок в FixedUpdate:
/// 1. end_glides (Expire, authority)
/// 2. activate_abilities (Abilities, authority)
/// 3. publish_cooldowns (Publish, authority)
/// 4. mirror_cooldowns (Reconcile, replica)
pub struct AbilityPlugin;

impl Plugin for AbilityPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SessionConfig>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(AbilityBook::from_config(&config))
            .init_resource::<PublishedCooldowns>()
            .init_resource::<CooldownMirror>()
            .add_event::<AbilityIntent>()
            .add_event::<AbilityActivated>()
            .add_event::<AbilityRejected>()
            .add_event::<GlideReleased>()
            .add_event::<GlideEnded>()
            .add_systems(
                FixedUpdate,
                (
                    end_glides.in_set(TickSet::Expire),
                    activate_abilities.in_set(TickSet::Abilities),
                    publish_cooldowns.in_set(TickSet::Publish),
                )
                    .run_if(is_authority),
            )
            .add_systems(
                FixedUpdate,
                mirror_cooldowns
                    .in_set(TickSet::Reconcile)
                    .run_if(is_replica),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_from_default_config() {
        let book = AbilityBook::default();

        let grapple = book.get(AbilityKind::Grapple);
        assert_eq!(grapple.range, Some(25.0));
        assert_eq!(grapple.cooldown_ticks, 120);
        assert!(grapple.cancels_glide);

        let special = book.get(AbilityKind::SpecialAction);
        assert_eq!(special.effect, AbilityEffect::DisableTarget);
        assert_eq!(special.cooldown_ticks, 75);
        assert!(!special.cancels_glide);

        assert_eq!(book.get(AbilityKind::Glide).range, None);
        assert_eq!(book.max_glide_ticks(), 120);
    }

    #[test]
    fn test_kind_index_matches_all_order() {
        for (i, kind) in AbilityKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
