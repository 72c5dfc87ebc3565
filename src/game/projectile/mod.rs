//! Projectile System
//!
//! Firebolts, mortars and fire areas as tagged variants, plus the cooldown
//! tables of the two castable abilities. The system owns all of this state;
//! the session only calls in.
//!
//! Per tick the session calls, in order:
//! 1. `tick_cooldowns` (before any fire request)
//! 2. `fire_firebolt` / `fire_mortar`
//! 3. `update` (advance, mortar impacts spawn fire areas)
//! 4. `check_all_collisions` / `check_mortar_ground_collision` per victim

pub mod cooldown;
pub mod fire_area;
pub mod firebolt;
pub mod mortar;

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ProjectileConfig;
use crate::core::math::{rotate_yaw, xz};
use crate::game::collision::CollisionWorld;
use crate::game::events::DamageSource;
use crate::game::input::InputMode;
use crate::game::state::{CharacterName, PlayerId};
use crate::game::stats::StatsResolver;

pub use cooldown::CooldownTable;
pub use fire_area::{FireArea, FirePhase};
pub use firebolt::{Firebolt, FireboltStep};
pub use mortar::{Mortar, MortarStep};

/// Projectile id, unique within one system.
pub type ProjectileId = u64;

// =============================================================================
// SHARED TYPES
// =============================================================================

/// Data every projectile kind carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileCommon {
    /// Id.
    pub id: ProjectileId,
    /// Player that fired it.
    pub owner: PlayerId,
    /// Character that fired it.
    pub character: CharacterName,
    /// System time at spawn.
    pub spawn_time: f64,
    /// Seconds alive.
    pub age: f32,
    /// Seconds before expiry.
    pub max_lifetime: f32,
    /// Damage per hit (per tick for fire areas).
    pub damage: f32,
    /// Tint as `0xRRGGBB`.
    pub color: u32,
}

/// A projectile of any kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Direct-fire bolt.
    Firebolt(Firebolt),
    /// Ballistic shell.
    Mortar(Mortar),
    /// Splash damage circle.
    FireArea(FireArea),
}

impl ProjectileKind {
    /// Shared data.
    pub fn common(&self) -> &ProjectileCommon {
        match self {
            ProjectileKind::Firebolt(p) => &p.common,
            ProjectileKind::Mortar(p) => &p.common,
            ProjectileKind::FireArea(p) => &p.common,
        }
    }

    /// Current position.
    pub fn position(&self) -> Vec3 {
        match self {
            ProjectileKind::Firebolt(p) => p.position,
            ProjectileKind::Mortar(p) => p.position,
            ProjectileKind::FireArea(p) => p.center,
        }
    }
}

/// A body that projectiles can damage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VictimBody {
    /// Victim id.
    pub id: PlayerId,
    /// Body center.
    pub position: Vec3,
    /// Footprint width.
    pub size: f32,
    /// Body height.
    pub height: f32,
}

/// Aim state of the local shooter, used to steer and accelerate the bolts
/// it owns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AimContext {
    /// Player whose bolts follow this aim.
    pub owner: PlayerId,
    /// Shooter position.
    pub shooter: Vec3,
    /// Cursor on the ground plane (mouse aim).
    pub cursor: Option<Vec2>,
    /// Right stick deflection (gamepad aim).
    pub right_stick: Option<Vec2>,
    /// Camera yaw for stick-relative aim.
    pub camera_yaw: f32,
    /// Active device family.
    pub mode: InputMode,
}

impl AimContext {
    /// Control input in [0, 1]: stick magnitude, or cursor distance over
    /// `span`.
    pub fn control_input(&self, span: f32) -> Option<f32> {
        match self.mode {
            InputMode::Gamepad => self.right_stick.map(|s| s.length().clamp(0.0, 1.0)),
            InputMode::Keyboard => self
                .cursor
                .map(|c| (c.distance(xz(self.shooter)) / span.max(1e-3)).clamp(0.0, 1.0)),
        }
    }

    /// Camera-relative aim point `range` units from the shooter along the
    /// right stick. Only in gamepad mode.
    pub fn stick_target(&self, range: f32) -> Option<Vec2> {
        if self.mode != InputMode::Gamepad {
            return None;
        }
        let stick = self.right_stick?.normalize_or_zero();
        if stick == Vec2::ZERO {
            return None;
        }
        let world = rotate_yaw(Vec2::new(stick.x, -stick.y), self.camera_yaw);
        Some(xz(self.shooter) + world * range)
    }

    /// Direction to fire from the shooter, if any aim exists.
    pub fn fire_direction(&self, range: f32) -> Option<Vec2> {
        let target = match self.mode {
            InputMode::Gamepad => self.stick_target(range)?,
            InputMode::Keyboard => self.cursor?,
        };
        let dir = target - xz(self.shooter);
        (dir.length() > 1e-3).then_some(dir)
    }

    /// Ground point to lob a mortar at.
    pub fn mortar_target(&self, range: f32) -> Option<Vec2> {
        match self.mode {
            InputMode::Gamepad => self.stick_target(range),
            InputMode::Keyboard => self.cursor,
        }
    }
}

/// A damaging contact found by a collision query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileHit {
    /// Projectile that hit.
    pub projectile: ProjectileId,
    /// Its owner.
    pub owner: PlayerId,
    /// Character that fired it.
    pub character: CharacterName,
    /// Damage to apply.
    pub damage: f32,
    /// Kind of hit.
    pub source: DamageSource,
    /// Where the hit happened.
    pub position: Vec3,
}

/// Launch parameters for a projectile, local or remote.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LaunchSpec {
    /// Firebolt along a direction (x, z).
    Firebolt {
        /// Direction, not necessarily normalized.
        direction: Vec2,
    },
    /// Mortar toward a ground target (x, z).
    Mortar {
        /// Target point.
        target: Vec2,
    },
}

/// Why a fire request was refused.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FireError {
    /// Ability still cooling down.
    #[error("Ability on cooldown")]
    OnCooldown,

    /// Direction too short to normalize.
    #[error("Firing direction is degenerate")]
    DegenerateDirection,
}

/// Notable things that happened during `update`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProjectileEvent {
    /// Lifetime ran out.
    Expired {
        /// Projectile id.
        id: ProjectileId,
    },
    /// Firebolt flew into a wall.
    HitWall {
        /// Projectile id.
        id: ProjectileId,
        /// Last position.
        position: Vec3,
    },
    /// Mortar reached its target and left a fire area.
    Splash {
        /// Mortar id.
        mortar: ProjectileId,
        /// New fire area id.
        fire_area: ProjectileId,
        /// Splash center.
        center: Vec3,
        /// Fire area radius.
        radius: f32,
    },
}

// =============================================================================
// SYSTEM
// =============================================================================

/// Owns every projectile and both cooldown tables.
#[derive(Clone, Debug)]
pub struct ProjectileSystem {
    config: ProjectileConfig,
    stats: StatsResolver,
    projectiles: BTreeMap<ProjectileId, ProjectileKind>,
    firebolt_cooldowns: CooldownTable,
    mortar_cooldowns: CooldownTable,
    aim: Option<AimContext>,
    next_id: ProjectileId,
    time: f64,
}

impl ProjectileSystem {
    /// Create an empty system.
    pub fn new(config: ProjectileConfig, stats: StatsResolver) -> Self {
        Self {
            config,
            stats,
            projectiles: BTreeMap::new(),
            firebolt_cooldowns: CooldownTable::new(),
            mortar_cooldowns: CooldownTable::new(),
            aim: None,
            next_id: 0,
            time: 0.0,
        }
    }

    /// Tuning in use.
    pub fn config(&self) -> &ProjectileConfig {
        &self.config
    }

    /// Stats resolver in use.
    pub fn stats(&self) -> &StatsResolver {
        &self.stats
    }

    /// Every live projectile, ordered by id.
    pub fn projectiles(&self) -> impl Iterator<Item = &ProjectileKind> {
        self.projectiles.values()
    }

    /// Projectile lookup.
    pub fn get(&self, id: ProjectileId) -> Option<&ProjectileKind> {
        self.projectiles.get(&id)
    }

    /// Number of live projectiles.
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// No live projectiles?
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Live firebolts.
    pub fn firebolts(&self) -> impl Iterator<Item = &Firebolt> {
        self.projectiles.values().filter_map(|p| match p {
            ProjectileKind::Firebolt(f) => Some(f),
            _ => None,
        })
    }

    /// Live mortars.
    pub fn mortars(&self) -> impl Iterator<Item = &Mortar> {
        self.projectiles.values().filter_map(|p| match p {
            ProjectileKind::Mortar(m) => Some(m),
            _ => None,
        })
    }

    /// Live fire areas.
    pub fn fire_areas(&self) -> impl Iterator<Item = &FireArea> {
        self.projectiles.values().filter_map(|p| match p {
            ProjectileKind::FireArea(a) => Some(a),
            _ => None,
        })
    }

    // -------------------------------------------------------------------------
    // Cooldowns
    // -------------------------------------------------------------------------

    /// Decrement both cooldown tables. Must run before fire requests.
    pub fn tick_cooldowns(&mut self, dt: f32) {
        self.firebolt_cooldowns.tick(dt);
        self.mortar_cooldowns.tick(dt);
    }

    /// Firebolt ready?
    pub fn can_shoot(&self, player: PlayerId) -> bool {
        self.firebolt_cooldowns.can_shoot(player)
    }

    /// Mortar ready?
    pub fn can_shoot_mortar(&self, player: PlayerId) -> bool {
        self.mortar_cooldowns.can_shoot(player)
    }

    /// Firebolt cooldown table.
    pub fn firebolt_cooldowns(&self) -> &CooldownTable {
        &self.firebolt_cooldowns
    }

    /// Mortar cooldown table.
    pub fn mortar_cooldowns(&self) -> &CooldownTable {
        &self.mortar_cooldowns
    }

    /// Clear both tables (character swap).
    pub fn clear_cooldowns(&mut self) {
        self.firebolt_cooldowns.clear();
        self.mortar_cooldowns.clear();
    }

    // -------------------------------------------------------------------------
    // Spawning
    // -------------------------------------------------------------------------

    /// Install or clear the local shooter's aim.
    pub fn set_aim(&mut self, aim: Option<AimContext>) {
        self.aim = aim;
    }

    /// Current aim context.
    pub fn aim(&self) -> Option<&AimContext> {
        self.aim.as_ref()
    }

    fn common(&mut self, owner: PlayerId, character: CharacterName, lifetime: f32, damage: f32) -> ProjectileCommon {
        self.next_id += 1;
        ProjectileCommon {
            id: self.next_id,
            owner,
            character,
            spawn_time: self.time,
            age: 0.0,
            max_lifetime: lifetime,
            damage,
            color: self.stats.character_color(character),
        }
    }

    fn spawn(
        &mut self,
        owner: PlayerId,
        character: CharacterName,
        origin: Vec3,
        spec: LaunchSpec,
    ) -> Result<ProjectileId, FireError> {
        let projectile = match spec {
            LaunchSpec::Firebolt { direction } => {
                let stats = self.stats.firebolt_stats(character);
                let common = self.common(owner, character, stats.lifetime, stats.damage);
                let bolt = Firebolt::launch(common, origin, direction, &stats, self.config.min_direction)
                    .ok_or(FireError::DegenerateDirection)?;
                ProjectileKind::Firebolt(bolt)
            }
            LaunchSpec::Mortar { target } => {
                let stats = self.stats.mortar_stats(character);
                let common = self.common(owner, character, self.config.mortar_lifetime, stats.damage);
                ProjectileKind::Mortar(Mortar::launch(common, origin, target, &stats, &self.config))
            }
        };

        let id = projectile.common().id;
        self.projectiles.insert(id, projectile);
        Ok(id)
    }

    /// Fire a firebolt, honoring and then starting the cooldown.
    pub fn fire_firebolt(
        &mut self,
        owner: PlayerId,
        character: CharacterName,
        origin: Vec3,
        direction: Vec2,
    ) -> Result<ProjectileId, FireError> {
        if !self.firebolt_cooldowns.can_shoot(owner) {
            return Err(FireError::OnCooldown);
        }
        let id = self.spawn(owner, character, origin, LaunchSpec::Firebolt { direction })?;
        let cooldown = self.stats.firebolt_stats(character).cooldown;
        self.firebolt_cooldowns.start(owner, cooldown);
        Ok(id)
    }

    /// Fire a mortar, honoring and then starting the cooldown.
    pub fn fire_mortar(
        &mut self,
        owner: PlayerId,
        character: CharacterName,
        origin: Vec3,
        target: Vec2,
    ) -> Result<ProjectileId, FireError> {
        if !self.mortar_cooldowns.can_shoot(owner) {
            return Err(FireError::OnCooldown);
        }
        let id = self.spawn(owner, character, origin, LaunchSpec::Mortar { target })?;
        let cooldown = self.stats.mortar_stats(character).cooldown;
        self.mortar_cooldowns.start(owner, cooldown);
        Ok(id)
    }

    /// Spawn a projectile announced by a remote player. Cooldowns are not
    /// consulted.
    pub fn spawn_remote(
        &mut self,
        owner: PlayerId,
        character: CharacterName,
        origin: Vec3,
        spec: LaunchSpec,
    ) -> Option<ProjectileId> {
        match self.spawn(owner, character, origin, spec) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(owner = %owner.short(), error = %e, "ignoring remote projectile");
                None
            }
        }
    }

    /// Remove everything a player owns (player left).
    pub fn remove_owned_by(&mut self, owner: PlayerId) {
        self.projectiles.retain(|_, p| p.common().owner != owner);
        self.firebolt_cooldowns.reset(owner);
        self.mortar_cooldowns.reset(owner);
    }

    // -------------------------------------------------------------------------
    // Simulation
    // -------------------------------------------------------------------------

    /// Advance every projectile. Mortars reaching their target spawn a fire
    /// area at the target's ground height.
    pub fn update(&mut self, dt: f32, world: &dyn CollisionWorld) -> Vec<ProjectileEvent> {
        self.time += dt as f64;
        let mut events = Vec::new();
        let mut removed = Vec::new();
        let mut splashes = Vec::new();

        let aim = self.aim;
        for (id, projectile) in self.projectiles.iter_mut() {
            match projectile {
                ProjectileKind::Firebolt(bolt) => {
                    if bolt.has_hit {
                        removed.push(*id);
                        continue;
                    }
                    let own_aim = aim.as_ref().filter(|a| a.owner == bolt.common.owner);
                    let shooter_y = own_aim.map(|a| a.shooter.y);
                    match bolt.advance(dt, own_aim, shooter_y, world, &self.config) {
                        FireboltStep::Flying => {}
                        FireboltStep::Expired => {
                            removed.push(*id);
                            events.push(ProjectileEvent::Expired { id: *id });
                        }
                        FireboltStep::HitWall => {
                            removed.push(*id);
                            events.push(ProjectileEvent::HitWall { id: *id, position: bolt.position });
                        }
                    }
                }
                ProjectileKind::Mortar(shell) => match shell.advance(dt, world, &self.config) {
                    MortarStep::Flying => {}
                    MortarStep::Impact(center) => {
                        removed.push(*id);
                        splashes.push((*id, shell.clone(), center));
                    }
                    MortarStep::Expired => {
                        removed.push(*id);
                        events.push(ProjectileEvent::Expired { id: *id });
                    }
                },
                ProjectileKind::FireArea(area) => {
                    if !area.advance(dt) {
                        removed.push(*id);
                        events.push(ProjectileEvent::Expired { id: *id });
                    }
                }
            }
        }

        for id in removed {
            self.projectiles.remove(&id);
        }

        for (mortar_id, shell, center) in splashes {
            let mut common = self.common(
                shell.common.owner,
                shell.common.character,
                shell.fire_duration,
                shell.area_damage,
            );
            common.color = shell.common.color;
            let area = FireArea::new(
                common,
                center,
                shell.splash_radius,
                self.config.fire_expand_duration,
                self.config.fire_shrink_duration,
                self.config.fire_ticks_per_second,
            );
            let fire_id = area.common.id;
            self.projectiles.insert(fire_id, ProjectileKind::FireArea(area));
            events.push(ProjectileEvent::Splash {
                mortar: mortar_id,
                fire_area: fire_id,
                center,
                radius: shell.splash_radius,
            });
            debug!(mortar = mortar_id, x = center.x, z = center.z, "mortar splash");
        }

        events
    }

    /// First damaging contact for `victim`: firebolt direct hits, then
    /// mortar mid-air detonations, then fire-area ticks. Latches the
    /// projectile that hit.
    pub fn check_all_collisions(&mut self, victim: &VictimBody) -> Option<ProjectileHit> {
        for projectile in self.projectiles.values_mut() {
            if let ProjectileKind::Firebolt(bolt) = projectile {
                if bolt.hits(victim) {
                    bolt.has_hit = true;
                    return Some(hit(&bolt.common, DamageSource::Firebolt, bolt.position));
                }
            }
        }

        for projectile in self.projectiles.values_mut() {
            if let ProjectileKind::Mortar(shell) = projectile {
                if shell.check_direct_hit(victim, &self.config) {
                    return Some(hit(&shell.common, DamageSource::Mortar, shell.position));
                }
            }
        }

        for projectile in self.projectiles.values_mut() {
            if let ProjectileKind::FireArea(area) = projectile {
                if let Some(damage) = area.try_damage(victim) {
                    let mut h = hit(&area.common, DamageSource::FireArea, area.center);
                    h.damage = damage;
                    return Some(h);
                }
            }
        }

        None
    }

    /// Ground-level direct mortar hit for `victim`.
    pub fn check_mortar_ground_collision(
        &mut self,
        victim: &VictimBody,
        world: &dyn CollisionWorld,
    ) -> Option<ProjectileHit> {
        for projectile in self.projectiles.values_mut() {
            if let ProjectileKind::Mortar(shell) = projectile {
                if shell.check_ground_hit(victim, world, &self.config) {
                    return Some(hit(&shell.common, DamageSource::Mortar, shell.position));
                }
            }
        }
        None
    }
}

fn hit(common: &ProjectileCommon, source: DamageSource, position: Vec3) -> ProjectileHit {
    ProjectileHit {
        projectile: common.id,
        owner: common.owner,
        character: common.character,
        damage: common.damage,
        source,
        position,
    }
}
