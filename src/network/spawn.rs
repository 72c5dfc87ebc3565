//! Remote Spawn Preparation
//!
//! Spawning a remote player is split in two: an async preparation that loads
//! and validates every texture of the character's animation set, and a
//! synchronous attach performed by the replication layer on the tick thread.
//! Nothing touches the scene until every texture has validated.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use thiserror::Error;
use tracing::{debug, warn};

use crate::game::animation::{AnimationError, AnimationSet, CharacterAssets};
use crate::game::state::{CharacterName, PlayerId};
use crate::network::protocol::PlayerStateMsg;

/// Spawn errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpawnError {
    /// Texture did not load in time.
    #[error("Texture load timed out: {0}")]
    Timeout(String),

    /// Texture loaded but is unusable.
    #[error("Texture invalid: {0}")]
    InvalidTexture(String),

    /// Loader failure.
    #[error("Texture load failed for {path}: {reason}")]
    Load {
        /// Texture path.
        path: String,
        /// Loader message.
        reason: String,
    },

    /// No animation bundle for the character.
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// The spawn was abandoned or superseded while it was being prepared.
    #[error("Spawn for {0} is no longer pending")]
    NotPending(PlayerId),
}

/// Loaded image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    /// Path loaded.
    pub path: String,
    /// Decoding finished.
    pub complete: bool,
    /// Width in pixels.
    pub natural_width: u32,
    /// Height in pixels.
    pub natural_height: u32,
}

impl TextureInfo {
    /// A texture is usable once complete with a non-zero width.
    pub fn is_valid(&self) -> bool {
        self.complete && self.natural_width > 0
    }
}

/// Asynchronous texture source.
pub trait TextureLoader: Send + Sync {
    /// Load one texture.
    fn load(&self, path: String) -> BoxFuture<'static, Result<TextureInfo, SpawnError>>;
}

/// Shared loader handle.
pub type SharedLoader = Arc<dyn TextureLoader>;

/// What the replication layer asks to be prepared.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Remote player.
    pub player_id: PlayerId,
    /// Character to load.
    pub character: CharacterName,
    /// State that triggered the spawn.
    pub state: PlayerStateMsg,
}

/// Everything needed to attach a remote entity synchronously.
#[derive(Debug, Clone)]
pub struct SpawnBundle {
    /// Remote player.
    pub player_id: PlayerId,
    /// Character loaded.
    pub character: CharacterName,
    /// Animation set.
    pub animations: Arc<AnimationSet>,
    /// Validated textures.
    pub textures: Vec<String>,
}

/// Load and validate every texture of `request.character` with a
/// per-texture timeout.
pub async fn prepare_spawn(
    request: SpawnRequest,
    assets: &CharacterAssets,
    loader: &dyn TextureLoader,
    timeout: Duration,
) -> Result<SpawnBundle, SpawnError> {
    let animations = assets.get(request.character)?;
    let textures = animations.textures();

    let loads = textures.iter().map(|path| {
        let load = loader.load(path.clone());
        let path = path.clone();
        async move {
            match tokio::time::timeout(timeout, load).await {
                Ok(Ok(info)) if info.is_valid() => Ok(()),
                Ok(Ok(_)) => Err(SpawnError::InvalidTexture(path)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SpawnError::Timeout(path)),
            }
        }
    });

    for result in join_all(loads).await {
        if let Err(e) = result {
            warn!(player = %request.player_id.short(), error = %e, "remote spawn preparation failed");
            return Err(e);
        }
    }

    debug!(
        player = %request.player_id.short(),
        character = %request.character,
        textures = textures.len(),
        "remote spawn prepared"
    );

    Ok(SpawnBundle {
        player_id: request.player_id,
        character: request.character,
        animations,
        textures,
    })
}

// =============================================================================
// LOADERS
// =============================================================================

/// Loader that reports every texture as a valid 64x64 image after an
/// optional delay. Paths registered as broken load incomplete.
#[derive(Debug, Default)]
pub struct StaticTextureLoader {
    delay: Duration,
    broken: Mutex<BTreeSet<String>>,
}

impl StaticTextureLoader {
    /// Instant loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that waits `delay` per texture.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    /// Make `path` load as an incomplete image.
    pub fn break_texture(&self, path: impl Into<String>) {
        if let Ok(mut broken) = self.broken.lock() {
            broken.insert(path.into());
        }
    }
}

impl TextureLoader for StaticTextureLoader {
    fn load(&self, path: String) -> BoxFuture<'static, Result<TextureInfo, SpawnError>> {
        let delay = self.delay;
        let broken = self.broken.lock().map(|b| b.contains(&path)).unwrap_or(false);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(TextureInfo {
                path,
                complete: !broken,
                natural_width: if broken { 0 } else { 64 },
                natural_height: if broken { 0 } else { 64 },
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::animation::{AnimKey, Facing};

    fn request(character: CharacterName) -> SpawnRequest {
        SpawnRequest {
            player_id: PlayerId::from_u128(5),
            character,
            state: PlayerStateMsg {
                player_id: PlayerId::from_u128(5),
                x: 0.0,
                y: 1.0,
                z: 0.0,
                rotation: 0.0,
                current_anim_key: AnimKey::idle(Facing::Front),
                last_facing: Facing::Front,
                is_grounded: true,
                is_running: false,
            },
        }
    }

    #[tokio::test]
    async fn test_prepare_spawn_validates_textures() {
        let assets = CharacterAssets::uniform(4, 8.0);
        let loader = StaticTextureLoader::new();
        let bundle = prepare_spawn(request(CharacterName::Herald), &assets, &loader, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(bundle.character, CharacterName::Herald);
        assert!(!bundle.textures.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_spawn_rejects_broken_texture() {
        let assets = CharacterAssets::uniform(4, 8.0);
        let loader = StaticTextureLoader::new();
        let broken = assets.get(CharacterName::Lucy).unwrap().textures()[0].clone();
        loader.break_texture(broken.clone());

        let err = prepare_spawn(request(CharacterName::Lucy), &assets, &loader, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, SpawnError::InvalidTexture(broken));
    }

    #[tokio::test]
    async fn test_prepare_spawn_times_out() {
        let assets = CharacterAssets::uniform(4, 8.0);
        let loader = StaticTextureLoader::with_delay(Duration::from_millis(200));
        let err = prepare_spawn(request(CharacterName::Lucy), &assets, &loader, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::Timeout(_)));
    }

    #[test]
    fn test_texture_validity() {
        let mut info = TextureInfo {
            path: "a.png".into(),
            complete: true,
            natural_width: 16,
            natural_height: 16,
        };
        assert!(info.is_valid());
        info.natural_width = 0;
        assert!(!info.is_valid());
    }
}
