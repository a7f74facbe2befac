//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::physics::Vector2;

/// Directional flags carried by a movement event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

/// Bullet payload attached to a fire event.
///
/// Clients echo the full bullet shape (`owner`, `direction`, `position`), but
/// only `direction` is trusted: the server assigns the owner and derives the
/// spawn position from the firer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BulletPayload {
    pub direction: Vector2,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// One fixed movement step in the flagged directions
    Movement {
        #[serde(default)]
        sequence: i64,
        #[serde(default)]
        movement: Option<Movement>,
    },

    /// Spawn a bullet travelling in the payload's direction
    Fire {
        #[serde(default)]
        sequence: i64,
        #[serde(default)]
        bullet: Option<BulletPayload>,
    },

    /// Pick a new random hue
    Reskin {
        #[serde(default)]
        sequence: i64,
    },
}

impl ClientEvent {
    /// Decode a single inbound frame
    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    /// Client-supplied sequence number
    pub fn sequence(&self) -> i64 {
        match self {
            ClientEvent::Movement { sequence, .. }
            | ClientEvent::Fire { sequence, .. }
            | ClientEvent::Reskin { sequence } => *sequence,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First frame on every connection, carries the player's own id
    Bootstrap { id: Uuid },

    /// Full room state
    Update {
        players: Vec<PlayerSnapshot>,
        bullets: Vec<BulletSnapshot>,
    },
}

impl ServerMsg {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    /// Hue in degrees (0-359)
    pub hue: u16,
    /// Last applied client sequence number
    pub sequence: i64,
    pub position: Vector2,
    /// Remaining respawn time in nanoseconds (0 = alive)
    pub spawn_time: u64,
}

/// Bullet state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub owner: Uuid,
    pub direction: Vector2,
    pub position: Vector2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_movement_event() {
        let event = ClientEvent::decode(
            br#"{"type":"movement","sequence":7,"movement":{"up":true,"left":true}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::Movement {
                sequence: 7,
                movement: Some(Movement {
                    up: true,
                    down: false,
                    left: true,
                    right: false,
                }),
            }
        );
        assert_eq!(event.sequence(), 7);
    }

    #[test]
    fn decodes_fire_event_ignoring_client_owner_and_position() {
        let event = ClientEvent::decode(
            br#"{"type":"fire","sequence":3,"movement":null,
                "bullet":{"owner":"someone","direction":{"x":0.6,"y":-0.8},"position":{"x":1,"y":2}}}"#,
        )
        .unwrap();

        match event {
            ClientEvent::Fire {
                sequence,
                bullet: Some(bullet),
            } => {
                assert_eq!(sequence, 3);
                assert_eq!(bullet.direction, Vector2::new(0.6, -0.8));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn fire_without_payload_decodes_to_none() {
        let event = ClientEvent::decode(br#"{"type":"fire","sequence":1}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Fire {
                sequence: 1,
                bullet: None
            }
        );
    }

    #[test]
    fn sequence_defaults_to_zero() {
        let event = ClientEvent::decode(br#"{"type":"reskin"}"#).unwrap();
        assert_eq!(event.sequence(), 0);
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        assert!(ClientEvent::decode(br#"{"type":"teleport","sequence":1}"#).is_err());
        assert!(ClientEvent::decode(br#"{"sequence":1}"#).is_err());
        assert!(ClientEvent::decode(b"not json").is_err());
    }

    #[test]
    fn bootstrap_wire_shape() {
        let id = Uuid::new_v4();
        let json: serde_json::Value =
            serde_json::from_str(&ServerMsg::Bootstrap { id }.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "bootstrap");
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn update_wire_shape() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::Update {
            players: vec![PlayerSnapshot {
                id,
                hue: 120,
                sequence: 4,
                position: Vector2::new(10.0, 20.0),
                spawn_time: 0,
            }],
            bullets: vec![BulletSnapshot {
                owner: id,
                direction: Vector2::new(1.0, 0.0),
                position: Vector2::new(30.0, 20.0),
            }],
        };
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "update");
        assert_eq!(json["players"][0]["hue"], 120);
        assert_eq!(json["players"][0]["position"]["y"], 20.0);
        assert_eq!(json["players"][0]["spawn_time"], 0);
        assert_eq!(json["bullets"][0]["owner"], id.to_string());
        assert_eq!(json["bullets"][0]["direction"]["x"], 1.0);
    }
}
