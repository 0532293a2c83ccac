//! CooldownTimer: "истекает на tick T" или "не запущен"
//!
//! Чистое значение без side effects. Никогда не мутируется на месте:
//! рестарт = замена целиком через `start_for`, сброс = `CooldownTimer::IDLE`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tick::Tick;

/// Tick-based таймер
///
/// Инвариант: `target_tick == None` всегда считается истёкшим.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub struct CooldownTimer {
    target_tick: Option<Tick>,
}

impl CooldownTimer {
    /// Не запущенный таймер
    pub const IDLE: CooldownTimer = CooldownTimer { target_tick: None };

    /// Таймер, истекающий через `duration_ticks` от `now`
    pub fn start_for(now: Tick, duration_ticks: u64) -> Self {
        Self {
            target_tick: Some(now.after(duration_ticks)),
        }
    }

    /// Таймер с уже известным deadline (зеркало authority)
    pub fn expiring_at(target_tick: Tick) -> Self {
        Self {
            target_tick: Some(target_tick),
        }
    }

    pub fn target_tick(&self) -> Option<Tick> {
        self.target_tick
    }

    pub fn is_running(&self) -> bool {
        self.target_tick.is_some()
    }

    pub fn is_expired_or_idle(&self, now: Tick) -> bool {
        match self.target_tick {
            None => true,
            Some(target) => now >= target,
        }
    }

    /// max(0, target - now); idle → 0
    pub fn remaining(&self, now: Tick) -> u64 {
        self.target_tick
            .map(|target| now.ticks_until(target))
            .unwrap_or(0)
    }

    /// remaining / duration, clamp [0, 1]. Только для presentation.
    pub fn remaining_fraction(&self, now: Tick, duration_ticks: u64) -> f32 {
        if duration_ticks == 0 {
            return 0.0;
        }
        (self.remaining(now) as f32 / duration_ticks as f32).clamp(0.0, 1.0)
    }
}
