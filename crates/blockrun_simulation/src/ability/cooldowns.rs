//! AbilityCooldowns: per-actor cooldown gate
//!
//! Один независимый CooldownTimer на каждую способность.
//! Только tick step самого актора (и round reset) пишет его таймеры.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::AbilityKind;
use crate::cooldown::CooldownTimer;
use crate::tick::Tick;

#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityCooldowns {
    timers: HashMap<AbilityKind, CooldownTimer>,
}

impl AbilityCooldowns {
    pub fn timer(&self, kind: AbilityKind) -> CooldownTimer {
        self.timers.get(&kind).copied().unwrap_or(CooldownTimer::IDLE)
    }

    /// Запустить cooldown (замена таймера целиком)
    pub fn start(&mut self, kind: AbilityKind, now: Tick, duration_ticks: u64) {
        self.timers
            .insert(kind, CooldownTimer::start_for(now, duration_ticks));
    }

    pub fn is_ready(&self, kind: AbilityKind, now: Tick) -> bool {
        self.timer(kind).is_expired_or_idle(now)
    }

    pub fn remaining_ticks(&self, kind: AbilityKind, now: Tick) -> u64 {
        self.timer(kind).remaining(now)
    }

    /// Для HUD (1.0 = только что запущен, 0.0 = готов)
    pub fn remaining_fraction(&self, kind: AbilityKind, now: Tick, duration_ticks: u64) -> f32 {
        self.timer(kind).remaining_fraction(now, duration_ticks)
    }

    /// Принудительный сброс (round reset)
    pub fn reset_all(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_blocks_until_expired() {
        let mut cooldowns = AbilityCooldowns::default();
        assert!(cooldowns.is_ready(AbilityKind::Grapple, Tick(0)));

        cooldowns.start(AbilityKind::Grapple, Tick(10), 120);
        assert!(!cooldowns.is_ready(AbilityKind::Grapple, Tick(10)));
        assert!(!cooldowns.is_ready(AbilityKind::Grapple, Tick(129)));
        assert!(cooldowns.is_ready(AbilityKind::Grapple, Tick(130)));
    }

    #[test]
    fn test_timers_independent() {
        let mut cooldowns = AbilityCooldowns::default();
        cooldowns.start(AbilityKind::Glide, Tick(0), 1200);

        assert!(!cooldowns.is_ready(AbilityKind::Glide, Tick(5)));
        assert!(cooldowns.is_ready(AbilityKind::DoubleJump, Tick(5)));
        assert!(cooldowns.is_ready(AbilityKind::SpecialAction, Tick(5)));
    }

    #[test]
    fn test_fraction_resets_to_one_on_restart() {
        let mut cooldowns = AbilityCooldowns::default();
        cooldowns.start(AbilityKind::DoubleJump, Tick(0), 300);
        assert_eq!(cooldowns.remaining_fraction(AbilityKind::DoubleJump, Tick(150), 300), 0.5);

        cooldowns.start(AbilityKind::DoubleJump, Tick(150), 300);
        assert_eq!(cooldowns.remaining_fraction(AbilityKind::DoubleJump, Tick(150), 300), 1.0);
    }

    #[test]
    fn test_reset_all() {
        let mut cooldowns = AbilityCooldowns::default();
        for kind in AbilityKind::ALL {
            cooldowns.start(kind, Tick(0), 500);
        }
        cooldowns.reset_all();
        for kind in AbilityKind::ALL {
            assert!(cooldowns.is_ready(kind, Tick(1)));
            assert_eq!(cooldowns.timer(kind), CooldownTimer::IDLE);
        }
    }
}
