//! Protocol Messages
//!
//! Wire format for peer-to-peer room traffic. Messages are serialized as
//! JSON with a `type` tag and camelCase fields, with an optional compact
//! binary (bincode) encoding for the same payloads.

use std::str::FromStr;

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::warn;

use crate::game::animation::{AnimKey, Facing};
use crate::game::collision::{Arena, UnknownArena};
use crate::game::mode::GameMode;
use crate::game::projectile::LaunchSpec;
use crate::game::state::{CharacterName, PlayerId};

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encode/decode failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encode/decode failed.
    #[error("Binary codec error: {0}")]
    Binary(#[from] bincode::Error),

    /// Room code is not 6 uppercase alphanumerics.
    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// A projectile message lacks its direction or target.
    #[error("Projectile message missing {0}")]
    MissingField(&'static str),
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Periodic authoritative state of the sender's character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateMsg {
    /// Sender.
    pub player_id: PlayerId,
    /// Position X.
    pub x: f32,
    /// Position Y.
    pub y: f32,
    /// Position Z.
    pub z: f32,
    /// Yaw.
    pub rotation: f32,
    /// Animation shown by the sender.
    pub current_anim_key: AnimKey,
    /// Last sprite facing.
    pub last_facing: Facing,
    /// Standing on ground.
    pub is_grounded: bool,
    /// Sprinting.
    pub is_running: bool,
}

impl PlayerStateMsg {
    /// Position as a vector.
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Projectile family on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireProjectileKind {
    /// Firebolt.
    Firebolt,
    /// Mortar.
    Mortar,
}

/// A point or direction on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireVec2 {
    /// X.
    pub x: f32,
    /// Z.
    pub z: f32,
}

impl From<Vec2> for WireVec2 {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, z: v.y }
    }
}

impl From<WireVec2> for Vec2 {
    fn from(v: WireVec2) -> Self {
        Vec2::new(v.x, v.z)
    }
}

/// A projectile fired by the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileCreateMsg {
    /// Family.
    pub kind: WireProjectileKind,
    /// Launch X.
    pub start_x: f32,
    /// Launch Y.
    pub start_y: f32,
    /// Launch Z.
    pub start_z: f32,
    /// Firebolt direction.
    #[serde(default)]
    pub direction: Option<WireVec2>,
    /// Mortar ground target.
    #[serde(default)]
    pub target: Option<WireVec2>,
    /// Character that fired.
    pub character_name: CharacterName,
}

impl ProjectileCreateMsg {
    /// Build from a local launch.
    pub fn new(origin: Vec3, spec: LaunchSpec, character: CharacterName) -> Self {
        let (kind, direction, target) = match spec {
            LaunchSpec::Firebolt { direction } => (WireProjectileKind::Firebolt, Some(direction.into()), None),
            LaunchSpec::Mortar { target } => (WireProjectileKind::Mortar, None, Some(target.into())),
        };
        Self {
            kind,
            start_x: origin.x,
            start_y: origin.y,
            start_z: origin.z,
            direction,
            target,
            character_name: character,
        }
    }

    /// Launch point.
    pub fn origin(&self) -> Vec3 {
        Vec3::new(self.start_x, self.start_y, self.start_z)
    }

    /// Launch parameters to replay locally.
    pub fn launch_spec(&self) -> Result<LaunchSpec, ProtocolError> {
        match self.kind {
            WireProjectileKind::Firebolt => self
                .direction
                .map(|d| LaunchSpec::Firebolt { direction: d.into() })
                .ok_or(ProtocolError::MissingField("direction")),
            WireProjectileKind::Mortar => self
                .target
                .map(|t| LaunchSpec::Mortar { target: t.into() })
                .ok_or(ProtocolError::MissingField("target")),
        }
    }
}

/// Damage the sender dealt to `target_id`. The shooter is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDamageMsg {
    /// Victim.
    pub target_id: PlayerId,
    /// Damage dealt.
    pub damage: f32,
    /// Victim health after the hit, as the shooter sees it.
    pub health: f32,
    /// Victim max health.
    pub max_health: f32,
}

/// The sender switched character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterChangeMsg {
    /// New character.
    pub character_name: CharacterName,
}

/// Room metadata changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdatedMsg {
    /// Privacy flag, when known.
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// A player left the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftMsg {
    /// Player that left.
    pub player_id: PlayerId,
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Every message exchanged in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NetMessage {
    /// Character state broadcast.
    PlayerState(PlayerStateMsg),
    /// Projectile fired.
    ProjectileCreate(ProjectileCreateMsg),
    /// Shooter-authoritative damage.
    PlayerDamage(PlayerDamageMsg),
    /// Character switched.
    CharacterChange(CharacterChangeMsg),
    /// Room metadata.
    RoomUpdated(RoomUpdatedMsg),
    /// Player departure.
    PlayerLeft(PlayerLeftMsg),
}

/// Externally tagged mirror of `NetMessage`; bincode cannot decode
/// internally tagged enums.
#[derive(Serialize, Deserialize)]
enum BinaryFrame {
    PlayerState(PlayerStateMsg),
    ProjectileCreate(ProjectileCreateMsg),
    PlayerDamage(PlayerDamageMsg),
    CharacterChange(CharacterChangeMsg),
    RoomUpdated(RoomUpdatedMsg),
    PlayerLeft(PlayerLeftMsg),
}

impl From<NetMessage> for BinaryFrame {
    fn from(msg: NetMessage) -> Self {
        match msg {
            NetMessage::PlayerState(m) => BinaryFrame::PlayerState(m),
            NetMessage::ProjectileCreate(m) => BinaryFrame::ProjectileCreate(m),
            NetMessage::PlayerDamage(m) => BinaryFrame::PlayerDamage(m),
            NetMessage::CharacterChange(m) => BinaryFrame::CharacterChange(m),
            NetMessage::RoomUpdated(m) => BinaryFrame::RoomUpdated(m),
            NetMessage::PlayerLeft(m) => BinaryFrame::PlayerLeft(m),
        }
    }
}

impl From<BinaryFrame> for NetMessage {
    fn from(frame: BinaryFrame) -> Self {
        match frame {
            BinaryFrame::PlayerState(m) => NetMessage::PlayerState(m),
            BinaryFrame::ProjectileCreate(m) => NetMessage::ProjectileCreate(m),
            BinaryFrame::PlayerDamage(m) => NetMessage::PlayerDamage(m),
            BinaryFrame::CharacterChange(m) => NetMessage::CharacterChange(m),
            BinaryFrame::RoomUpdated(m) => NetMessage::RoomUpdated(m),
            BinaryFrame::PlayerLeft(m) => NetMessage::PlayerLeft(m),
        }
    }
}

impl NetMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            NetMessage::PlayerState(_) => "player-state",
            NetMessage::ProjectileCreate(_) => "projectile-create",
            NetMessage::PlayerDamage(_) => "player-damage",
            NetMessage::CharacterChange(_) => "character-change",
            NetMessage::RoomUpdated(_) => "room-updated",
            NetMessage::PlayerLeft(_) => "player-left",
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to the binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(&BinaryFrame::from(self.clone()))?)
    }

    /// Deserialize from the binary encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let frame: BinaryFrame = bincode::deserialize(data)?;
        Ok(frame.into())
    }
}

/// An inbound message with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Sender.
    pub from: PlayerId,
    /// Payload.
    pub message: NetMessage,
}

impl Envelope {
    /// Wrap a message.
    pub fn new(from: PlayerId, message: NetMessage) -> Self {
        Self { from, message }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to the binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(&(self.from, BinaryFrame::from(self.message.clone())))?)
    }

    /// Deserialize from the binary encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let (from, frame): (PlayerId, BinaryFrame) = bincode::deserialize(data)?;
        Ok(Self { from, message: frame.into() })
    }
}

// =============================================================================
// ROOMS & LAUNCH PARAMETERS
// =============================================================================

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Uppercase a room code and check it is 6 ASCII alphanumerics.
pub fn normalize_room_code(code: &str) -> Result<String, ProtocolError> {
    let upper = code.trim().to_ascii_uppercase();
    if upper.len() == ROOM_CODE_LEN && upper.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(upper)
    } else {
        Err(ProtocolError::InvalidRoomCode(code.to_string()))
    }
}

/// Parameters a session is launched with (`?char=&mode=&arena=&room=`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// Requested character.
    pub character: Option<CharacterName>,
    /// Requested game mode.
    pub mode: Option<GameMode>,
    /// Requested arena code, validated at session start.
    pub arena: Option<String>,
    /// Room to auto-join.
    pub room: Option<String>,
}

impl LaunchParams {
    /// Parse a URL query string. Unknown keys are ignored; unparseable
    /// character, mode and room values are dropped with a warning.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.trim_start_matches('?');

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if value.is_empty() {
                continue;
            }
            match key {
                "char" => match CharacterName::from_str(value) {
                    Ok(c) => params.character = Some(c),
                    Err(e) => warn!(error = %e, "ignoring launch character"),
                },
                "mode" => match GameMode::from_str(value) {
                    Ok(m) => params.mode = Some(m),
                    Err(e) => warn!(error = %e, "ignoring launch mode"),
                },
                "arena" => params.arena = Some(value.to_string()),
                "room" => match normalize_room_code(value) {
                    Ok(code) => params.room = Some(code),
                    Err(e) => warn!(error = %e, "ignoring launch room"),
                },
                _ => {}
            }
        }

        params
    }

    /// Requested arena, the standard arena when absent.
    pub fn arena(&self) -> Result<Arena, UnknownArena> {
        match &self.arena {
            Some(code) => code.parse(),
            None => Ok(Arena::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::animation::AnimKind;

    fn state() -> NetMessage {
        NetMessage::PlayerState(PlayerStateMsg {
            player_id: PlayerId::from_u128(7),
            x: 1.0,
            y: 2.0,
            z: 3.0,
            rotation: 0.5,
            current_anim_key: AnimKey::walk(Facing::Back),
            last_facing: Facing::Back,
            is_grounded: true,
            is_running: false,
        })
    }

    #[test]
    fn test_player_state_json_shape() {
        let json = state().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "player-state");
        assert_eq!(value["currentAnimKey"], "walk_back");
        assert_eq!(value["lastFacing"], "back");
        assert_eq!(value["isGrounded"], true);
        assert_eq!(NetMessage::from_json(&json).unwrap(), state());
    }

    #[test]
    fn test_binary_encoding() {
        let bytes = state().to_bytes().unwrap();
        assert_eq!(NetMessage::from_bytes(&bytes).unwrap(), state());

        let env = Envelope::new(PlayerId::from_u128(7), state());
        assert_eq!(Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap(), env);
    }

    #[test]
    fn test_projectile_create_launch_spec() {
        let msg = ProjectileCreateMsg::new(
            Vec3::new(1.0, 1.0, 1.0),
            LaunchSpec::Mortar { target: Vec2::new(4.0, -2.0) },
            CharacterName::Herald,
        );
        let json = NetMessage::ProjectileCreate(msg.clone()).to_json().unwrap();
        assert!(json.contains("\"type\":\"projectile-create\""));
        assert!(json.contains("\"kind\":\"mortar\""));
        assert!(json.contains("\"characterName\":\"herald\""));
        assert_eq!(msg.launch_spec().unwrap(), LaunchSpec::Mortar { target: Vec2::new(4.0, -2.0) });

        let broken = ProjectileCreateMsg { target: None, ..msg };
        assert!(matches!(broken.launch_spec(), Err(ProtocolError::MissingField("target"))));
    }

    #[test]
    fn test_room_updated_optional_flag() {
        let msg = NetMessage::from_json(r#"{"type":"room-updated"}"#).unwrap();
        assert_eq!(msg, NetMessage::RoomUpdated(RoomUpdatedMsg { is_private: None }));
        let msg = NetMessage::from_json(r#"{"type":"room-updated","isPrivate":true}"#).unwrap();
        assert_eq!(msg, NetMessage::RoomUpdated(RoomUpdatedMsg { is_private: Some(true) }));
    }

    #[test]
    fn test_damage_message_field_names() {
        let msg = NetMessage::PlayerDamage(PlayerDamageMsg {
            target_id: PlayerId::from_u128(2),
            damage: 12.0,
            health: 88.0,
            max_health: 100.0,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("targetId"));
        assert!(json.contains("maxHealth"));
        assert_eq!(msg.kind(), "player-damage");
    }

    #[test]
    fn test_room_code_validation() {
        assert_eq!(normalize_room_code("ab12cd").unwrap(), "AB12CD");
        assert!(normalize_room_code("ABC").is_err());
        assert!(normalize_room_code("ABC-12").is_err());
        assert!(normalize_room_code("ABCDEFG").is_err());
    }

    #[test]
    fn test_launch_params() {
        let params = LaunchParams::parse("?char=herald&mode=shooting&arena=large&room=xy12ab&foo=1");
        assert_eq!(params.character, Some(CharacterName::Herald));
        assert_eq!(params.mode, Some(GameMode::Shooting));
        assert_eq!(params.arena(), Ok(Arena::Large));
        assert_eq!(params.room.as_deref(), Some("XY12AB"));

        let bad = LaunchParams::parse("char=bob&arena=moon&room=nope");
        assert_eq!(bad.character, None);
        assert_eq!(bad.room, None);
        assert!(bad.arena().is_err());

        assert_eq!(LaunchParams::parse("").arena(), Ok(Arena::Standard));
    }

    #[test]
    fn test_anim_key_kinds_survive_wire() {
        for kind in AnimKind::ALL {
            let key = AnimKey::new(kind, Facing::Front);
            let msg = NetMessage::PlayerState(PlayerStateMsg {
                current_anim_key: key,
                ..match state() {
                    NetMessage::PlayerState(s) => s,
                    _ => unreachable!(),
                }
            });
            assert_eq!(NetMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
        }
    }
}
