use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::A, Team::B];

    pub fn label(self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
        }
    }

    /// Accepts `A`, `b`, `Team A`, `Group B` and similar spellings.
    pub fn parse(raw: &str) -> Option<Team> {
        let upper = raw.trim().to_ascii_uppercase();
        let token = upper
            .strip_prefix("TEAM")
            .or_else(|| upper.strip_prefix("GROUP"))
            .unwrap_or(&upper)
            .trim();
        match token {
            "A" => Some(Team::A),
            "B" => Some(Team::B),
            _ => None,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Role {
    Start,
    Sub,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Start, Role::Sub];

    pub fn label(self) -> &'static str {
        match self {
            Role::Start => "Start",
            Role::Sub => "Sub",
        }
    }

    fn stage_token(self) -> &'static str {
        match self {
            Role::Start => "start",
            Role::Sub => "sub",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" | "starter" => Some(Role::Start),
            "sub" | "ersatz" | "bench" | "substitute" => Some(Role::Sub),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Slots are filled strictly in this order.
pub const SLOT_ORDER: [(Team, Role); 4] = [
    (Team::A, Role::Start),
    (Team::B, Role::Start),
    (Team::A, Role::Sub),
    (Team::B, Role::Sub),
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerTeam<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerTeam<T> {
    pub fn from_fn(mut f: impl FnMut(Team) -> T) -> Self {
        Self {
            a: f(Team::A),
            b: f(Team::B),
        }
    }

    pub fn get(&self, team: Team) -> &T {
        match team {
            Team::A => &self.a,
            Team::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::A => &mut self.a,
            Team::B => &mut self.b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SlotMap<T> {
    pub a_start: T,
    pub a_sub: T,
    pub b_start: T,
    pub b_sub: T,
}

impl<T> SlotMap<T> {
    pub fn from_fn(mut f: impl FnMut(Team, Role) -> T) -> Self {
        Self {
            a_start: f(Team::A, Role::Start),
            a_sub: f(Team::A, Role::Sub),
            b_start: f(Team::B, Role::Start),
            b_sub: f(Team::B, Role::Sub),
        }
    }

    pub fn get(&self, team: Team, role: Role) -> &T {
        match (team, role) {
            (Team::A, Role::Start) => &self.a_start,
            (Team::A, Role::Sub) => &self.a_sub,
            (Team::B, Role::Start) => &self.b_start,
            (Team::B, Role::Sub) => &self.b_sub,
        }
    }

    pub fn get_mut(&mut self, team: Team, role: Role) -> &mut T {
        match (team, role) {
            (Team::A, Role::Start) => &mut self.a_start,
            (Team::A, Role::Sub) => &mut self.a_sub,
            (Team::B, Role::Start) => &mut self.b_start,
            (Team::B, Role::Sub) => &mut self.b_sub,
        }
    }
}

/// One historical (event, player) pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub event_id: String,
    pub player_key: String,
    pub role: Role,
    pub attended: bool,
    pub event_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PrefMode {
    Hard,
    Soft,
    #[default]
    None,
}

impl PrefMode {
    pub fn parse(raw: &str) -> PrefMode {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hard" => PrefMode::Hard,
            "soft" => PrefMode::Soft,
            _ => PrefMode::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrefMode::Hard => "hard",
            PrefMode::Soft => "soft",
            PrefMode::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Preference {
    pub team: Option<Team>,
    pub mode: PrefMode,
    pub boost: Option<f64>,
}

/// Priority buckets of the allocator, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Category {
    HardMatch,
    SoftMatch,
    Neutral,
    CrossSoft,
    CrossHard,
}

impl Category {
    pub fn of(pref: &Preference, team: Team) -> Category {
        match (pref.team, pref.mode) {
            (None, _) => Category::Neutral,
            (Some(t), PrefMode::Hard) if t == team => Category::HardMatch,
            (Some(t), PrefMode::Soft) if t == team => Category::SoftMatch,
            (Some(t), PrefMode::None) if t == team => Category::Neutral,
            (Some(_), PrefMode::Hard) => Category::CrossHard,
            (Some(_), _) => Category::CrossSoft,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Category::HardMatch => 1,
            Category::SoftMatch => 2,
            Category::Neutral => 3,
            Category::CrossSoft => 4,
            Category::CrossHard => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::HardMatch => "hard-match",
            Category::SoftMatch => "soft-match",
            Category::Neutral => "neutral",
            Category::CrossSoft => "cross-soft",
            Category::CrossHard => "cross-hard",
        }
    }
}

/// A scored player ready for allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub player_key: String,
    pub display_name: String,
    pub attend_prob: f64,
    pub start_prob: f64,
    pub sub_prob: f64,
    pub preference: Preference,
    pub events_seen: u32,
    pub risk_penalty: f64,
}

impl Candidate {
    pub fn role_prob(&self, role: Role) -> f64 {
        match role {
            Role::Start => self.start_prob,
            Role::Sub => self.sub_prob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForcedAssignment {
    pub player_key: String,
    pub team: Team,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionStage {
    Forced,
    Main,
    Fallback,
}

/// `forced`, or `<team>-<role>-<main|fallback>` such as `B-start-fallback`.
pub fn stage_label(stage: SelectionStage, team: Team, role: Role) -> String {
    match stage {
        SelectionStage::Forced => "forced".to_string(),
        SelectionStage::Main => format!("{}-{}-main", team.label(), role.stage_token()),
        SelectionStage::Fallback => format!("{}-{}-fallback", team.label(), role.stage_token()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterAssignment {
    pub player_key: String,
    pub team: Team,
    pub role: Role,
    pub stage: SelectionStage,
}

impl RosterAssignment {
    pub fn stage_label(&self) -> String {
        stage_label(self.stage, self.team, self.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CutoffReason {
    BelowThreshold { threshold: f64 },
    NoSlotsLeft,
    LowDataCapReached,
    MinimumReached,
}

impl CutoffReason {
    pub fn label(self) -> String {
        match self {
            CutoffReason::BelowThreshold { threshold } => {
                format!("attend_prob below {threshold:.2}")
            }
            CutoffReason::NoSlotsLeft => "no slots left".to_string(),
            CutoffReason::LowDataCapReached => "low-data start cap reached".to_string(),
            CutoffReason::MinimumReached => "minimum starters reached".to_string(),
        }
    }
}

/// Why a candidate ended where it did. The allocator keeps the most recent
/// evaluation per player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionTrace {
    pub player_key: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub stage: Option<SelectionStage>,
    pub category: Option<Category>,
    pub slot_score: Option<f64>,
    pub attend_prob: f64,
    pub events_seen: u32,
    pub selected: bool,
    pub cutoff_reason: Option<CutoffReason>,
}

impl SelectionTrace {
    pub fn stage_label(&self) -> String {
        match (self.stage, self.team, self.role) {
            (Some(stage), Some(team), Some(role)) => stage_label(stage, team, role),
            (Some(SelectionStage::Forced), _, _) => "forced".to_string(),
            _ => "unconsidered".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_and_role_parse_common_spellings() {
        assert_eq!(Team::parse(" b "), Some(Team::B));
        assert_eq!(Team::parse("Team A"), Some(Team::A));
        assert_eq!(Team::parse("group b"), Some(Team::B));
        assert_eq!(Team::parse("C"), None);
        assert_eq!(Role::parse("Ersatz"), Some(Role::Sub));
        assert_eq!(Role::parse("START"), Some(Role::Start));
        assert_eq!(Role::parse("captain"), None);
    }

    #[test]
    fn categories_follow_preference_precedence() {
        let hard_b = Preference {
            team: Some(Team::B),
            mode: PrefMode::Hard,
            boost: None,
        };
        let plain_b = Preference {
            team: Some(Team::B),
            mode: PrefMode::None,
            boost: None,
        };
        assert_eq!(Category::of(&hard_b, Team::B), Category::HardMatch);
        assert_eq!(Category::of(&hard_b, Team::A), Category::CrossHard);
        assert_eq!(Category::of(&plain_b, Team::B), Category::Neutral);
        assert_eq!(Category::of(&plain_b, Team::A), Category::CrossSoft);
        assert_eq!(Category::of(&Preference::default(), Team::A), Category::Neutral);
    }

    #[test]
    fn stage_labels_name_team_and_role() {
        assert_eq!(stage_label(SelectionStage::Main, Team::B, Role::Start), "B-start-main");
        assert_eq!(stage_label(SelectionStage::Fallback, Team::A, Role::Sub), "A-sub-fallback");
        assert_eq!(stage_label(SelectionStage::Forced, Team::A, Role::Start), "forced");
    }
}
