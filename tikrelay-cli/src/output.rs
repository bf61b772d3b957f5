#[cfg(feature = "colored-output")]
use colored::*;
use tiktok_relay::{
    ChatMessage, ConfigurationError, ConnectionError, GiftStreakEvent, LikeMilestone,
    RoomUserMessage, StateChange,
};

/// Formats relay events as terminal lines.
#[derive(Debug, Clone)]
pub struct EventPrinter {
    #[cfg_attr(not(feature = "colored-output"), allow(dead_code))]
    colored: bool,
    top_viewers: usize,
}

impl EventPrinter {
    pub fn new(colored: bool, top_viewers: usize) -> Self {
        Self {
            colored,
            top_viewers,
        }
    }

    pub fn chat(&self, chat: &ChatMessage) -> String {
        let name = chat.user.display_name().unwrap_or("unknown");
        format!(
            "{} {}: {}",
            self.colorize("[chat]", &Color::Cyan, false),
            self.colorize(name, &Color::Yellow, true),
            chat.comment
        )
    }

    /// `None` for evictions.
    pub fn gift_streak(&self, event: &GiftStreakEvent) -> Option<String> {
        let GiftStreakEvent::Upserted(entry) = event else {
            return None;
        };
        let status = if entry.open {
            self.colorize("in progress", &Color::Yellow, false)
        } else {
            self.colorize("finished", &Color::Green, true)
        };
        Some(format!(
            "{} {} sent {} x{} ({} diamonds) [{}]",
            self.colorize("[gift]", &Color::Magenta, false),
            self.colorize(&entry.sender_name, &Color::Yellow, true),
            entry.gift_name,
            entry.cumulative_combo,
            entry.total_diamonds(),
            status
        ))
    }

    pub fn like_milestone(&self, milestone: &LikeMilestone) -> String {
        let name = milestone
            .nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&milestone.user_id);
        format!(
            "{} {} reached {} likes",
            self.colorize("[likes]", &Color::Red, false),
            self.colorize(name, &Color::Yellow, true),
            milestone.achieved_count
        )
    }

    pub fn room_user(&self, room: &RoomUserMessage) -> String {
        let mut line = format!(
            "{} {} watching",
            self.colorize("[viewers]", &Color::Blue, false),
            room.viewer_count
        );
        for viewer in room.top_viewers(self.top_viewers) {
            line.push_str(&format!(
                " | #{} {} ({})",
                viewer.rank, viewer.name, viewer.coin_count
            ));
        }
        line
    }

    pub fn connection_error(&self, err: &ConnectionError) -> String {
        format!("{} {}", self.colorize("[error]", &Color::Red, true), err)
    }

    pub fn configuration_error(&self, err: &ConfigurationError) -> String {
        format!("{} {}", self.colorize("[config]", &Color::Red, true), err)
    }

    pub fn state_change(&self, change: &StateChange) -> String {
        format!(
            "{} {} -> {}",
            self.colorize("[relay]", &Color::Green, false),
            change.from,
            change.to
        )
    }

    #[cfg_attr(not(feature = "colored-output"), allow(unused_variables))]
    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Magenta => text.magenta(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Magenta,
    Red,
}
