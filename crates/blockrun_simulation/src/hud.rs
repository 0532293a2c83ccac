//! Cooldown HUD readout
//!
//! Вместо глобального UI singleton: HUD entity получает актора явно при spawn
//! (`CooldownHud::tracking(actor)`) и каждый тик копирует его remaining fractions.
//! Рисует HUD host (вне crate).

use bevy::prelude::*;

use crate::ability::{AbilityBook, AbilityCooldowns, AbilityKind};
use crate::tick::{SimTick, TickSet};

#[derive(Component, Debug, Clone)]
pub struct CooldownHud {
    tracked: Entity,
    fractions: [f32; 4],
}

impl CooldownHud {
    pub fn tracking(actor: Entity) -> Self {
        Self {
            tracked: actor,
            fractions: [0.0; 4],
        }
    }

    pub fn tracked(&self) -> Entity {
        self.tracked
    }

    /// 1.0 = только что использована, 0.0 = готова
    pub fn fraction(&self, kind: AbilityKind) -> f32 {
        self.fractions[kind.index()]
    }
}

/// System: обновить все HUD'ы (фаза Presentation)
pub fn refresh_cooldown_huds(
    tick: Res<SimTick>,
    book: Res<AbilityBook>,
    actors: Query<&AbilityCooldowns>,
    mut huds: Query<&mut CooldownHud>,
) {
    let now = tick.now();
    for mut hud in huds.iter_mut() {
        let Ok(cooldowns) = actors.get(hud.tracked) else {
            // Актор despawned → пустой HUD
            hud.fractions = [0.0; 4];
            continue;
        };
        for kind in AbilityKind::ALL {
            let duration = book.get(kind).cooldown_ticks;
            hud.fractions[kind.index()] = cooldowns.remaining_fraction(kind, now, duration);
        }
    }
}

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            refresh_cooldown_huds.in_set(TickSet::Presentation),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityIntent;
    use crate::actor::Racer;
    use crate::tick::NetRole;
    use crate::{create_session_app, run_tick, SessionConfig};

    #[test]
    fn test_hud_follows_tracked_actor() {
        let mut app = create_session_app(5, NetRole::Authority, SessionConfig::default());
        let actor = app.world_mut().spawn(Racer::new(1, "local")).id();
        let hud = app.world_mut().spawn(CooldownHud::tracking(actor)).id();

        app.world_mut().send_event(AbilityIntent {
            actor,
            kind: AbilityKind::DoubleJump,
            target: None,
        });
        run_tick(&mut app);

        let readout = app.world().get::<CooldownHud>(hud).unwrap();
        assert_eq!(readout.tracked(), actor);
        assert_eq!(readout.fraction(AbilityKind::DoubleJump), 1.0);
        assert_eq!(readout.fraction(AbilityKind::Grapple), 0.0);

        // double jump = 300 тиков; после 150 тиков осталась половина
        for _ in 0..150 {
            run_tick(&mut app);
        }
        let readout = app.world().get::<CooldownHud>(hud).unwrap();
        assert_eq!(readout.fraction(AbilityKind::DoubleJump), 0.5);
    }

    #[test]
    fn test_hud_blank_when_actor_gone() {
        let mut app = create_session_app(5, NetRole::Authority, SessionConfig::default());
        let actor = app.world_mut().spawn(Racer::new(1, "gone")).id();
        let hud = app.world_mut().spawn(CooldownHud::tracking(actor)).id();

        app.world_mut().send_event(AbilityIntent {
            actor,
            kind: AbilityKind::Glide,
            target: None,
        });
        run_tick(&mut app);
        assert_eq!(
            app.world().get::<CooldownHud>(hud).unwrap().fraction(AbilityKind::Glide),
            1.0
        );

        app.world_mut().despawn(actor);
        run_tick(&mut app);
        assert_eq!(
            app.world().get::<CooldownHud>(hud).unwrap().fraction(AbilityKind::Glide),
            0.0
        );
    }
}
