//! Rendered notifications.
//!
//! The shape mirrors a chat "embed": title, description, accent color,
//! inline fields and a footer. Serializes directly into a Discord embed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::{node_name, title_case};
use crate::payload::{
    AllUnlocked, CycleCompleted, ExpeditionCompleted, ExpeditionStarted, ExpeditionTurn,
    GambleCompleted, JobLevelUp, NotificationPayload, VotingOption, VotingStarted,
};

pub const COLOR_GOLD: u32 = 0xFFD700;
pub const COLOR_BLURPLE: u32 = 0x5865F2;
pub const COLOR_GREEN: u32 = 0x57F287;
pub const COLOR_PURPLE: u32 = 0x9B59B6;
pub const COLOR_DARK_PURPLE: u32 = 0x8E44AD;
pub const COLOR_GREY: u32 = 0x95A5A6;
pub const COLOR_SUCCESS: u32 = 0x2ECC71;
pub const COLOR_FAILURE: u32 = 0xE74C3C;
pub const COLOR_WARNING: u32 = 0xF39C12;

/// Prefix applied to titles of notifications routed to the test channel.
pub const TEST_PREFIX: &str = "[TEST] ";

/// Expedition turns are only announced on the intro (turn 0) and every Nth turn.
pub const EXPEDITION_TURN_INTERVAL: i64 = 5;

const ALL_UNLOCKED_FALLBACK: &str =
    "Congratulations! Every single feature and upgrade has been unlocked by the community!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
    pub text: String,
}

/// A human-readable notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<NotificationField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            fields: vec![],
            footer: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(NotificationField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(Footer { text: text.into() });
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    /// Mark as test traffic.
    pub fn mark_test(&mut self) {
        if !self.title.starts_with(TEST_PREFIX) {
            self.title.insert_str(0, TEST_PREFIX);
        }
    }

    /// Render `payload`, or `None` when the event is intentionally not announced.
    pub fn render(payload: &NotificationPayload) -> Option<Self> {
        match payload {
            NotificationPayload::JobLevelUp(p) => Some(job_level_up(p)),
            NotificationPayload::VotingStarted(p) => Some(voting_started(p)),
            NotificationPayload::CycleCompleted(p) => Some(cycle_completed(p)),
            NotificationPayload::AllUnlocked(p) => Some(all_unlocked(p)),
            NotificationPayload::GambleCompleted(p) => Some(gamble_completed(p)),
            NotificationPayload::ExpeditionStarted(p) => Some(expedition_started(p)),
            NotificationPayload::ExpeditionTurn(p) => expedition_turn(p),
            NotificationPayload::ExpeditionCompleted(p) => Some(expedition_completed(p)),
        }
    }
}

fn numbered_options(options: &[VotingOption]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{}. **{}**\n", i + 1, opt.label()))
        .collect()
}

fn job_level_up(p: &JobLevelUp) -> Notification {
    let job = title_case(&p.job_key);
    let mut n = Notification::new(
        format!("Level Up! {job}"),
        format!("A user has reached **level {}** in {job}!", p.new_level),
        COLOR_GOLD,
    )
    .field("Job", job.clone(), true)
    .field("New Level", p.new_level.to_string(), true)
    .footer("Job System");

    if let Some(source) = p.source.as_deref().filter(|s| !s.is_empty()) {
        n = n.field("From", title_case(source), true);
    }
    n
}

fn voting_started(p: &VotingStarted) -> Notification {
    if p.auto_selected {
        return Notification::new(
            "Target Auto-Selected",
            format!(
                "Only one option was available. **{}** has been automatically selected as the next unlock target.",
                node_name(&p.node_key)
            ),
            COLOR_BLURPLE,
        )
        .footer("Progression System");
    }

    Notification::new(
        "New Voting Session!",
        "A new progression voting session has started! Use `/vote` to cast your vote.",
        COLOR_BLURPLE,
    )
    .field("Options", numbered_options(&p.options), false)
    .footer("Progression System")
}

fn cycle_completed(p: &CycleCompleted) -> Notification {
    let node = VotingOption {
        node_key: p.unlocked_node.node_key.clone(),
        display_name: p.unlocked_node.display_name.clone(),
    };
    let mut n = Notification::new(
        "Feature Unlocked!",
        format!("**{}** has been unlocked!", node.label()),
        COLOR_GREEN,
    )
    .footer("Progression System");

    if let Some(session) = p.voting_session.as_ref().filter(|s| !s.options.is_empty()) {
        n = n.field("Next Voting Options", numbered_options(&session.options), false);
        n.description
            .push_str("\n\nA new voting session has started! Use `/vote` to choose the next feature.");
    }
    n
}

fn all_unlocked(p: &AllUnlocked) -> Notification {
    let description = if p.message.is_empty() {
        ALL_UNLOCKED_FALLBACK
    } else {
        p.message.as_str()
    };
    Notification::new("🎉 All Features Unlocked!", description, COLOR_GOLD).footer("Progression System")
}

fn gamble_completed(p: &GambleCompleted) -> Notification {
    let n = if p.winner_id.is_empty() {
        Notification::new(
            "Gamble Ended (No Winner)",
            format!(
                "The gamble has concluded with no winner. Total value was **{}** credits from **{}** participants.",
                p.total_value, p.participant_count
            ),
            COLOR_GREY,
        )
    } else {
        Notification::new(
            "Gamble Completed!",
            format!(
                "The gamble has concluded! **{}** won a total value of **{}** credits from **{}** participants!",
                p.winner_id, p.total_value, p.participant_count
            ),
            COLOR_PURPLE,
        )
    };
    n.footer("Gamble System")
}

fn expedition_started(p: &ExpeditionStarted) -> Notification {
    Notification::new(
        "Expedition Recruiting!",
        format!(
            "A new expedition is recruiting!\n\n**Join Deadline:** `{}`\n\nUse `/explore` to join before the deadline.",
            p.join_deadline
        ),
        COLOR_PURPLE,
    )
    .footer("Expedition System")
}

fn expedition_turn(p: &ExpeditionTurn) -> Option<Notification> {
    if p.turn_number != 0 && p.turn_number % EXPEDITION_TURN_INTERVAL != 0 {
        return None;
    }
    let description = if p.turn_number == 0 {
        format!("*{}*", p.narrative)
    } else {
        format!(
            "**Turn {}** | Fatigue: {} | Purse: {}\n\n{}",
            p.turn_number, p.fatigue, p.purse, p.narrative
        )
    };
    Some(
        Notification::new("Expedition Update", description, COLOR_DARK_PURPLE)
            .footer("Expedition System")
            .without_timestamp(),
    )
}

fn expedition_completed(p: &ExpeditionCompleted) -> Notification {
    let (title, body, color) = if p.won {
        (
            "Expedition Complete!",
            format!(
                "The expedition was a success! The party survived all **{} turns**!\n\nRewards have been distributed to all participants.",
                p.total_turns
            ),
            COLOR_SUCCESS,
        )
    } else if p.all_ko {
        (
            "Expedition Failed",
            format!(
                "The entire party was knocked out after **{} turns**.\n\nPartial rewards have been distributed.",
                p.total_turns
            ),
            COLOR_FAILURE,
        )
    } else {
        (
            "Expedition Complete!",
            format!(
                "The expedition ended after **{} turns** due to exhaustion.\n\nPartial rewards have been distributed.",
                p.total_turns
            ),
            COLOR_WARNING,
        )
    };
    let description = format!(
        "{body}\n\nUse `/expedition-journal {}` to view the full journal.",
        p.expedition_id
    );
    Notification::new(title, description, color).footer("Expedition System")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{NodeInfo, VotingSessionInfo};

    fn opt(key: &str, name: &str) -> VotingOption {
        VotingOption { node_key: key.into(), display_name: name.into() }
    }

    #[test]
    fn level_up_fields() {
        let n = job_level_up(&JobLevelUp {
            job_key: "miner".into(),
            new_level: 5,
            source: Some("deep_search".into()),
            ..Default::default()
        });
        assert_eq!(n.title, "Level Up! Miner");
        assert!(n.description.contains("**level 5**"));
        assert_eq!(n.color, COLOR_GOLD);
        let names: Vec<_> = n.fields.iter().map(|f| (f.name.as_str(), f.value.as_str())).collect();
        assert_eq!(names, vec![("Job", "Miner"), ("New Level", "5"), ("From", "Deep Search")]);
    }

    #[test]
    fn auto_selected_vote_has_no_options() {
        let n = voting_started(&VotingStarted {
            node_key: "feature_gamble_mode".into(),
            auto_selected: true,
            options: vec![opt("feature_gamble_mode", "")],
            ..Default::default()
        });
        assert_eq!(n.title, "Target Auto-Selected");
        assert!(n.description.contains("**Gamble Mode**"));
        assert!(n.fields.is_empty());
    }

    #[test]
    fn voting_options_are_numbered() {
        let n = voting_started(&VotingStarted {
            options: vec![opt("feature_a", "Alpha"), opt("upgrade_beta_max", "")],
            ..Default::default()
        });
        assert_eq!(n.fields[0].value, "1. **Alpha**\n2. **Beta Max**\n");
    }

    #[test]
    fn cycle_completed_mentions_next_vote() {
        let n = cycle_completed(&CycleCompleted {
            unlocked_node: NodeInfo { node_key: "feature_shop".into(), display_name: String::new() },
            voting_session: Some(VotingSessionInfo { session_id: 2, options: vec![opt("x", "X")] }),
            is_test: false,
        });
        assert_eq!(n.description.lines().next(), Some("**Shop** has been unlocked!"));
        assert!(n.description.contains("/vote"));
        assert_eq!(n.fields[0].name, "Next Voting Options");
    }

    #[test]
    fn all_unlocked_falls_back_to_default_message() {
        let n = all_unlocked(&AllUnlocked::default());
        assert_eq!(n.description, ALL_UNLOCKED_FALLBACK);
    }

    #[test]
    fn gamble_without_winner_is_grey() {
        let n = gamble_completed(&GambleCompleted { gamble_id: "g".into(), total_value: 10, ..Default::default() });
        assert_eq!(n.title, "Gamble Ended (No Winner)");
        assert_eq!(n.color, COLOR_GREY);
    }

    #[test]
    fn only_intro_and_every_fifth_turn_render() {
        let turn = |n| ExpeditionTurn { expedition_id: "e".into(), turn_number: n, ..Default::default() };
        assert!(expedition_turn(&turn(0)).is_some());
        assert!(expedition_turn(&turn(3)).is_none());
        let n = expedition_turn(&turn(10)).unwrap();
        assert!(n.description.starts_with("**Turn 10**"));
        assert!(n.timestamp.is_none());
    }

    #[test]
    fn expedition_outcomes() {
        let done = |won, all_ko| ExpeditionCompleted {
            expedition_id: "exp-1".into(),
            total_turns: 12,
            won,
            all_ko,
            is_test: false,
        };
        assert_eq!(expedition_completed(&done(true, false)).color, COLOR_SUCCESS);
        let failed = expedition_completed(&done(false, true));
        assert_eq!(failed.title, "Expedition Failed");
        assert!(failed.description.ends_with("`/expedition-journal exp-1` to view the full journal."));
        assert_eq!(expedition_completed(&done(false, false)).color, COLOR_WARNING);
    }

    #[test]
    fn mark_test_prefixes_once() {
        let mut n = Notification::new("Hi", "", 0);
        n.mark_test();
        n.mark_test();
        assert_eq!(n.title, "[TEST] Hi");
    }

    #[test]
    fn serializes_as_embed() {
        let n = Notification::new("T", "D", 1).footer("F").without_timestamp();
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v, serde_json::json!({"title":"T","description":"D","color":1,"footer":{"text":"F"}}));
    }
}
