//! Present Surface
//!
//! The renderer is an opaque sink. The kernel holds `RenderHandle`s and keeps
//! its own typed records keyed by entity id; the surface never carries
//! gameplay state.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Serialize, Deserialize};

use crate::game::animation::AnimKey;
use crate::game::state::PlayerId;

/// Opaque scene node handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// Particle-style effects the renderer may show.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VisualEffect {
    /// Small dust puff behind a running character.
    SmokePuff,
    /// Large burst when swapping characters.
    SmokeBurst,
    /// Mortar splash or mid-air detonation.
    Explosion {
        /// Blast radius.
        radius: f32,
    },
    /// Melee swing circle.
    MeleeSwing {
        /// Swing radius.
        radius: f32,
    },
    /// Poison tick on a victim.
    Poison,
}

/// What the surface reports about one of its scene nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneNode {
    /// Node handle.
    pub handle: RenderHandle,
    /// Player the node was created for.
    pub owner: PlayerId,
    /// Texture image loaded and non-empty.
    pub texture_valid: bool,
}

/// Rendering backend as seen by the kernel.
pub trait PresentSurface {
    /// Attach a sprite node for a player using already validated textures.
    fn attach_sprite(&mut self, owner: PlayerId, textures: &[String]) -> RenderHandle;

    /// Move and re-frame a sprite.
    fn update_sprite(
        &mut self,
        handle: RenderHandle,
        position: Vec3,
        rotation: f32,
        anim: AnimKey,
        frame: usize,
    );

    /// Remove a node. Returns `false` if it did not exist.
    fn dispose(&mut self, handle: RenderHandle) -> bool;

    /// All sprite nodes currently in the scene.
    fn scene_nodes(&self) -> Vec<SceneNode>;

    /// Show an effect.
    fn spawn_effect(&mut self, effect: VisualEffect, position: Vec3);

    /// Red damage vignette strength in [0, 1].
    fn set_damage_overlay(&mut self, alpha: f32);

    /// Respawn fade strength in [0, 1].
    fn set_fade_overlay(&mut self, alpha: f32);

    /// Present the frame.
    fn present(&mut self);
}

// =============================================================================
// HEADLESS SURFACE
// =============================================================================

/// Node record kept by the headless surface.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessNode {
    /// Owner.
    pub owner: PlayerId,
    /// Last position.
    pub position: Vec3,
    /// Last rotation.
    pub rotation: f32,
    /// Last animation key.
    pub anim: Option<AnimKey>,
    /// Last frame.
    pub frame: usize,
    /// Texture state.
    pub texture_valid: bool,
}

/// Surface that records calls without drawing.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_handle: u64,
    nodes: BTreeMap<RenderHandle, HeadlessNode>,
    /// Frames presented.
    pub frames: u64,
    /// Effects spawned, in order.
    pub effects: Vec<(VisualEffect, Vec3)>,
    /// Last damage overlay alpha.
    pub damage_overlay: f32,
    /// Last fade overlay alpha.
    pub fade_overlay: f32,
}

impl HeadlessSurface {
    /// Empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node lookup.
    pub fn node(&self, handle: RenderHandle) -> Option<&HeadlessNode> {
        self.nodes.get(&handle)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Mark a node's texture as lost (e.g. a context loss).
    pub fn invalidate_texture(&mut self, handle: RenderHandle) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.texture_valid = false;
        }
    }
}

impl PresentSurface for HeadlessSurface {
    fn attach_sprite(&mut self, owner: PlayerId, textures: &[String]) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.nodes.insert(
            handle,
            HeadlessNode {
                owner,
                position: Vec3::ZERO,
                rotation: 0.0,
                anim: None,
                frame: 0,
                texture_valid: !textures.is_empty(),
            },
        );
        handle
    }

    fn update_sprite(
        &mut self,
        handle: RenderHandle,
        position: Vec3,
        rotation: f32,
        anim: AnimKey,
        frame: usize,
    ) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.position = position;
            node.rotation = rotation;
            node.anim = Some(anim);
            node.frame = frame;
        }
    }

    fn dispose(&mut self, handle: RenderHandle) -> bool {
        self.nodes.remove(&handle).is_some()
    }

    fn scene_nodes(&self) -> Vec<SceneNode> {
        self.nodes
            .iter()
            .map(|(handle, node)| SceneNode {
                handle: *handle,
                owner: node.owner,
                texture_valid: node.texture_valid,
            })
            .collect()
    }

    fn spawn_effect(&mut self, effect: VisualEffect, position: Vec3) {
        self.effects.push((effect, position));
    }

    fn set_damage_overlay(&mut self, alpha: f32) {
        self.damage_overlay = alpha.clamp(0.0, 1.0);
    }

    fn set_fade_overlay(&mut self, alpha: f32) {
        self.fade_overlay = alpha.clamp(0.0, 1.0);
    }

    fn present(&mut self) {
        self.frames += 1;
    }
}
