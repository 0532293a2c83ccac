//! Session configuration
//!
//! Фиксируется при старте сессии и не меняется посреди матча.
//! Все длительности в тиках. Defaults = параметры оригинальной игры при 60Hz:
//! - disable блока: 3 сек
//! - grapple 2 сек, glide 20 сек, double jump 5 сек, break block 1.25 сек
//! - 12 игроков, ability range 25м
//!
//! Capacity кольца DisableScheduler НЕ настраивается напрямую: выводится из
//! max_actors × (сколько disables один актор может держать одновременно).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ability::AbilityKind;
use crate::tick::secs_to_ticks;

pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read session config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse session config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize session config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("invalid session config: {0}")]
    Invalid(&'static str),
}

/// Cooldown каждой способности (тики)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityCooldownTicks {
    pub grapple: u64,
    pub glide: u64,
    pub double_jump: u64,
    pub special_action: u64,
}

impl Default for AbilityCooldownTicks {
    fn default() -> Self {
        Self {
            grapple: secs_to_ticks(2.0, DEFAULT_TICK_RATE_HZ),
            glide: secs_to_ticks(20.0, DEFAULT_TICK_RATE_HZ),
            double_jump: secs_to_ticks(5.0, DEFAULT_TICK_RATE_HZ),
            special_action: secs_to_ticks(1.25, DEFAULT_TICK_RATE_HZ),
        }
    }
}

/// Константы сессии
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Частота FixedUpdate
    pub tick_rate_hz: u32,

    /// Максимум игроков в сессии
    pub max_actors: u32,

    /// Сколько тиков блок остаётся выключенным
    pub disable_duration_ticks: u64,

    /// Дальность grapple / break block (метры, проверяет ability gate)
    pub ability_range: f32,

    /// Максимальная длительность glide (тики)
    pub max_glide_ticks: u64,

    pub cooldowns: AbilityCooldownTicks,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            max_actors: 12,
            disable_duration_ticks: secs_to_ticks(3.0, DEFAULT_TICK_RATE_HZ),
            ability_range: 25.0,
            max_glide_ticks: secs_to_ticks(2.0, DEFAULT_TICK_RATE_HZ),
            cooldowns: AbilityCooldownTicks::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn to_ron_pretty(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("tick_rate_hz must be > 0"));
        }
        if self.max_actors == 0 {
            return Err(ConfigError::Invalid("max_actors must be > 0"));
        }
        if self.disable_duration_ticks == 0 {
            return Err(ConfigError::Invalid("disable_duration_ticks must be > 0"));
        }
        // Делитель в disable_capacity()
        if self.cooldowns.special_action == 0 {
            return Err(ConfigError::Invalid("special_action cooldown must be > 0"));
        }
        if !(self.ability_range >= 0.0) {
            return Err(ConfigError::Invalid("ability_range must be >= 0"));
        }
        Ok(())
    }

    pub fn cooldown_ticks(&self, kind: AbilityKind) -> u64 {
        match kind {
            AbilityKind::Grapple => self.cooldowns.grapple,
            AbilityKind::Glide => self.cooldowns.glide,
            AbilityKind::DoubleJump => self.cooldowns.double_jump,
            AbilityKind::SpecialAction => self.cooldowns.special_action,
        }
    }

    /// Сколько блоков один актор может держать выключенными одновременно
    ///
    /// ceil(disable_duration / special_action cooldown): при 3 сек и 1.25 сек → 3
    pub fn max_concurrent_disables_per_actor(&self) -> usize {
        let cooldown = self.cooldowns.special_action.max(1);
        self.disable_duration_ticks.div_ceil(cooldown).max(1) as usize
    }

    /// Capacity кольца DisableScheduler (derived)
    pub fn disable_capacity(&self) -> usize {
        (self.max_actors.max(1) as usize) * self.max_concurrent_disables_per_actor()
    }
}
