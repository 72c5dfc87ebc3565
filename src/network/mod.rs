//! Network Layer
//!
//! Room messaging, remote spawns and replication of other players.
//! This layer is **non-authoritative** for the local character: it only
//! renders what remote sessions report and relays what the local session
//! decides.

pub mod protocol;
pub mod replication;
pub mod spawn;
pub mod transport;

pub use protocol::{
    CharacterChangeMsg, Envelope, LaunchParams, NetMessage, PlayerDamageMsg, PlayerLeftMsg,
    PlayerStateMsg, ProjectileCreateMsg, ProtocolError, RoomUpdatedMsg,
};
pub use replication::{Impulse, RemoteEntity, RemoteReplication, RemovalReason, ReplicationEvent};
pub use spawn::{prepare_spawn, SharedLoader, SpawnBundle, SpawnError, SpawnRequest, StaticTextureLoader, TextureLoader};
pub use transport::{
    join_room_with_retry, ConnectionState, LoopbackHub, LoopbackTransport, ReconnectPolicy, Transport,
    TransportError, WebSocketTransport,
};
