//! Racer: игрок в сессии

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ability::AbilityCooldowns;

/// Стабильный network id игрока (Entity у authority и replicas разные)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect, Serialize, Deserialize,
)]
pub struct RacerId(pub u32);

impl fmt::Display for RacerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "racer:{}", self.0)
    }
}

/// Игрок (локальный или удалённый)
///
/// Автоматически добавляет AbilityCooldowns через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(AbilityCooldowns)]
pub struct Racer {
    pub id: RacerId,
    pub name: String,
    /// Нажал "ready" в лобби (важно только authority)
    pub ready: bool,
}

impl Racer {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: RacerId(id),
            name: name.into(),
            ready: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_racer_requires_cooldowns() {
        let mut app = crate::create_headless_app(7);
        let racer = app.world_mut().spawn(Racer::new(1, "alice")).id();

        let world = app.world();
        assert!(world.get::<AbilityCooldowns>(racer).is_some());
        assert_eq!(world.get::<Racer>(racer).map(|r| r.id), Some(RacerId(1)));
        assert!(!world.get::<Racer>(racer).is_some_and(|r| r.ready));
    }
}
