//! Relay wire models.
//!
//! Typed payloads for every message type the relay forwards. Only the routing
//! fields are required; everything else is defaulted so partial payloads still
//! decode.

use serde::{Deserialize, Serialize};

use crate::gift_streak::StreakKey;

/// Lenient field decoders for values the relay sends with inconsistent JSON types.
pub(crate) mod de {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a string, a number or null as a string id.
    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
    }

    /// Accept a string, a number or null as an optional string.
    pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected string or number, got {other}"
            ))),
        }
    }

    /// Accept `true`/`false` as well as `0`/`1`.
    pub fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Number(n)) => Ok(n.as_i64().is_some_and(|v| v != 0)),
            Some(other) => Err(D::Error::custom(format!("expected bool, got {other}"))),
        }
    }
}

/// Badge shown next to a user's name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserBadge {
    #[serde(rename = "type")]
    pub badge_type: Option<String>,
    pub privilege_id: Option<String>,
    pub level: i64,
    pub badge_scene_type: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDetails {
    #[serde(deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
    pub bio_description: Option<String>,
    pub profile_picture_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowInfo {
    pub following_count: i64,
    pub follower_count: i64,
    pub follow_status: i64,
    pub push_status: i64,
}

/// User fields shared by every user-originated message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    #[serde(deserialize_with = "de::string_or_number")]
    pub user_id: String,
    pub sec_uid: Option<String>,
    /// Handle shown as `@uniqueId`
    pub unique_id: Option<String>,
    /// Display name
    pub nickname: Option<String>,
    pub profile_picture_url: Option<String>,
    pub follow_role: i64,
    pub user_badges: Vec<UserBadge>,
    pub user_scene_types: Vec<i64>,
    pub user_details: Option<UserDetails>,
    pub follow_info: Option<FollowInfo>,
    pub is_moderator: bool,
    pub is_new_gifter: bool,
    pub is_subscriber: bool,
    pub top_gifter_rank: Option<i64>,
    pub gifter_level: i64,
    pub team_member_level: i64,
}

impl UserInfo {
    /// Best available display name: nickname, then unique id.
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.nickname.as_deref()).or_else(|| non_empty(self.unique_id.as_deref()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Nested gift detail block (snake_case on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftDetails {
    pub gift_id: i64,
    pub repeat_count: i64,
    pub repeat_end: i64,
    pub gift_type: i64,
}

/// A gift sent by a viewer.
///
/// During a combo the relay re-sends the same gift with a growing running
/// count until `repeat_end` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    pub gift_id: i64,
    #[serde(default)]
    pub repeat_count: i64,
    #[serde(default, deserialize_with = "de::bool_or_int")]
    pub repeat_end: bool,
    #[serde(default)]
    pub combo: i64,
    #[serde(default)]
    pub gift_type: i64,
    #[serde(default)]
    pub diamond_count: i64,
    #[serde(default)]
    pub gift_name: String,
    #[serde(default)]
    pub gift_picture_url: Option<String>,
    #[serde(default)]
    pub describe: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub receiver_user_id: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub gift: Option<GiftDetails>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub timestamp: Option<String>,
}

impl GiftMessage {
    /// Identity used to coalesce combo bursts.
    pub fn streak_key(&self) -> StreakKey {
        StreakKey::new(self.user.user_id.clone(), self.gift_id)
    }

    /// Running count within the streak: `combo` when set, otherwise `repeatCount`.
    pub fn streak_count(&self) -> u64 {
        let count = if self.combo > 0 {
            self.combo
        } else {
            self.repeat_count
        };
        count.max(0) as u64
    }

    /// Sender display name, falling back to the profile name.
    pub fn sender_name(&self) -> &str {
        self.user
            .display_name()
            .or_else(|| non_empty(self.profile_name.as_deref()))
            .unwrap_or("unknown")
    }
}

/// Likes sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    /// Likes in this event (delta)
    #[serde(default)]
    pub like_count: u64,
    /// Cumulative likes reported by the relay (authoritative)
    pub total_like_count: u64,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// One entry in the room's ranked viewer list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopViewer {
    pub user: Option<UserInfo>,
    pub coin_count: i64,
}

/// A ranked viewer prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedViewer {
    /// 1-based rank
    pub rank: usize,
    pub name: String,
    pub coin_count: i64,
}

/// Viewer count update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserMessage {
    pub viewer_count: u64,
    #[serde(default)]
    pub top_viewers: Vec<TopViewer>,
}

impl RoomUserMessage {
    /// The first `limit` ranked viewers with a display name fallback.
    pub fn top_viewers(&self, limit: usize) -> Vec<RankedViewer> {
        self.top_viewers
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, viewer)| RankedViewer {
                rank: i + 1,
                name: viewer
                    .user
                    .as_ref()
                    .and_then(UserInfo::display_name)
                    .unwrap_or("unknown")
                    .to_string(),
                coin_count: viewer.coin_count,
            })
            .collect()
    }
}

/// A chat comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub emotes: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
}

/// A viewer shared the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
}

/// A viewer followed the streamer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
}

/// A viewer subscribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeMessage {
    #[serde(flatten)]
    pub user: UserInfo,
    #[serde(default)]
    pub sub_month: i64,
    #[serde(default)]
    pub old_subscribe_status: i64,
    #[serde(default)]
    pub subscribing_status: i64,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub create_time: Option<String>,
}
