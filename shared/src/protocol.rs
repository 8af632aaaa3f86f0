use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::vec3::{PlayerPosition, Vec3};

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Shared payloads ===

/// Gameplay flags reported by a client alongside its position.
///
/// Updates are shallow-merged: fields present in an incoming state replace the
/// stored ones, absent fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_jumping: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub coins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub trick_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_performing_trick: Option<bool>,
}

impl PlayerState {
    pub fn merge(&mut self, update: PlayerState) {
        let PlayerState {
            speed,
            is_jumping,
            score,
            coins,
            trick_count,
            multiplier,
            is_performing_trick,
        } = update;

        if speed.is_some() {
            self.speed = speed;
        }
        if is_jumping.is_some() {
            self.is_jumping = is_jumping;
        }
        if score.is_some() {
            self.score = score;
        }
        if coins.is_some() {
            self.coins = coins;
        }
        if trick_count.is_some() {
            self.trick_count = trick_count;
        }
        if multiplier.is_some() {
            self.multiplier = multiplier;
        }
        if is_performing_trick.is_some() {
            self.is_performing_trick = is_performing_trick;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "lowercase")]
pub enum PowerUpKind {
    Speed,
    Control,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct PowerUpWire {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub kind: PowerUpKind,
}

impl PowerUpWire {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct RampWire {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Yaw in radians
    pub rotation: f64,
}

/// Shared world every client builds its terrain and collectibles from.
///
/// Coins and power-ups are slot lists: an entry keeps its index for the life
/// of the world and a collected entry becomes `null`. `coinIndex` and
/// `powerUpIndex` in collection notices refer to these slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct GameStateWire {
    pub seed: String,
    pub coins: Vec<Option<Vec3>>,
    pub power_ups: Vec<Option<PowerUpWire>>,
    pub ramps: Vec<RampWire>,
}

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "init")]
    Init(InitMsg),
    #[serde(rename = "player_joined")]
    PlayerJoined(PlayerJoinedMsg),
    #[serde(rename = "update")]
    Update(PlayerUpdateMsg),
    #[serde(rename = "coin_collected")]
    CoinCollected(CoinCollectedMsg),
    #[serde(rename = "powerup_collected")]
    PowerUpCollected(PowerUpCollectedMsg),
    #[serde(rename = "trick_performed")]
    TrickPerformed(TrickPerformedMsg),
    #[serde(rename = "chat_message")]
    ChatMessage(ChatMessageMsg),
    #[serde(rename = "player_left")]
    PlayerLeft(PlayerLeftMsg),
}

impl ServerMsg {
    /// Value of the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::Init(_) => "init",
            ServerMsg::PlayerJoined(_) => "player_joined",
            ServerMsg::Update(_) => "update",
            ServerMsg::CoinCollected(_) => "coin_collected",
            ServerMsg::PowerUpCollected(_) => "powerup_collected",
            ServerMsg::TrickPerformed(_) => "trick_performed",
            ServerMsg::ChatMessage(_) => "chat_message",
            ServerMsg::PlayerLeft(_) => "player_left",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct InitMsg {
    pub protocol_version: u32,
    pub id: String,
    pub game_state: GameStateWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct PlayerJoinedMsg {
    pub id: String,
    pub username: String,
    pub position: PlayerPosition,
    pub state: PlayerState,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct PlayerUpdateMsg {
    pub id: String,
    pub position: PlayerPosition,
    pub state: PlayerState,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct CoinCollectedMsg {
    pub coin_index: u32,
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PowerUpCollectedMsg {
    pub power_up_index: u32,
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct TrickPerformedMsg {
    pub player_id: String,
    pub trick_name: String,
    pub position: PlayerPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageMsg {
    pub player_id: String,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct PlayerLeftMsg {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub username: Option<String>,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "init")]
    Init { username: String },
    #[serde(rename = "update")]
    Update {
        position: PlayerPosition,
        #[serde(default)]
        state: Option<PlayerState>,
    },
    #[serde(rename = "coin_collected")]
    CoinCollected { coin: Vec3 },
    #[serde(rename = "powerup_collected")]
    PowerUpCollected {
        #[serde(rename = "powerUp")]
        power_up: Vec3,
    },
    #[serde(rename = "trick_performed")]
    TrickPerformed {
        #[serde(rename = "trickName")]
        trick_name: String,
    },
    #[serde(rename = "chat_message")]
    ChatMessage { message: String },
}

impl ClientMsg {
    /// Every `type` tag the server understands.
    pub const KINDS: [&'static str; 6] = [
        "init",
        "update",
        "coin_collected",
        "powerup_collected",
        "trick_performed",
        "chat_message",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::Init { .. } => "init",
            ClientMsg::Update { .. } => "update",
            ClientMsg::CoinCollected { .. } => "coin_collected",
            ClientMsg::PowerUpCollected { .. } => "powerup_collected",
            ClientMsg::TrickPerformed { .. } => "trick_performed",
            ClientMsg::ChatMessage { .. } => "chat_message",
        }
    }

    pub fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}
