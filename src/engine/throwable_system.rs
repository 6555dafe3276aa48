use glam::{Vec2, Vec3};

use crate::config::PlayerTuning;
use crate::types::{NoiseCategory, RuntimeEvent, ThrowableView};

use super::utils::forward_from_yaw;
use super::GameEngine;

/// A thrown object in flight. `y` is height above the floor.
#[derive(Clone, Debug, PartialEq)]
pub struct Throwable {
    pub id: u64,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Throwable {
    pub fn launch(id: u64, origin: Vec2, yaw: f32, tuning: &PlayerTuning) -> Self {
        let forward = forward_from_yaw(yaw) * tuning.throw_force;
        Self {
            id,
            position: Vec3::new(origin.x, tuning.height, origin.y),
            velocity: Vec3::new(forward.x, tuning.throw_lift, forward.y),
        }
    }

    /// Returns the floor position once the object comes down.
    pub fn integrate(&mut self, dt_sec: f32, tuning: &PlayerTuning) -> Option<Vec2> {
        self.velocity.y -= tuning.throw_gravity * dt_sec;
        self.position += self.velocity * dt_sec;
        (self.position.y <= tuning.throw_landing_height).then(|| Vec2::new(self.position.x, self.position.z))
    }

    pub fn view(&self) -> ThrowableView {
        ThrowableView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            z: self.position.z,
        }
    }
}

impl GameEngine {
    /// Advances objects in flight; each landing becomes a Throw noise.
    pub(super) fn update_throwables(&mut self, dt_sec: f32, now_ms: u64) {
        let tuning = &self.config.player;
        let mut landed = Vec::new();
        self.throwables
            .retain_mut(|throwable| match throwable.integrate(dt_sec, tuning) {
                Some(point) => {
                    landed.push((throwable.id, point));
                    false
                }
                None => true,
            });

        for (id, point) in landed {
            self.sound.publish(point, NoiseCategory::Throw, now_ms);
            self.events.push(RuntimeEvent::ThrowLanded {
                id,
                x: point.x,
                z: point.y,
            });
        }
    }
}
