//! Achievement catalog and awarding.

use super::account::AccountTotals;

/// What an achievement threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementKind {
    Scans,
    Points,
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: AchievementKind,
    pub requirement: u64,
}

impl Achievement {
    pub const fn is_met(&self, totals: &AccountTotals) -> bool {
        let value = match self.kind {
            AchievementKind::Scans => totals.total_scans,
            AchievementKind::Points => totals.points,
            AchievementKind::Level => totals.level,
        };
        value >= self.requirement
    }
}

const fn achievement(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    kind: AchievementKind,
    requirement: u64,
) -> Achievement {
    Achievement {
        id,
        name,
        description,
        kind,
        requirement,
    }
}

pub const CATALOG: [Achievement; 8] = [
    achievement("first_scan", "First Step", "Complete your first recycling scan", AchievementKind::Scans, 1),
    achievement("ten_scans", "Getting Started", "Recycle 10 items", AchievementKind::Scans, 10),
    achievement("fifty_scans", "Eco Warrior", "Recycle 50 items", AchievementKind::Scans, 50),
    achievement("hundred_scans", "Century Club", "Recycle 100 items", AchievementKind::Scans, 100),
    achievement("five_hundred_points", "Point Collector", "Earn 500 points", AchievementKind::Points, 500),
    achievement("thousand_points", "Point Master", "Earn 1000 points", AchievementKind::Points, 1000),
    achievement("level_five", "Rising Star", "Reach Level 5", AchievementKind::Level, 5),
    achievement("level_ten", "Eco Champion", "Reach Level 10", AchievementKind::Level, 10),
];

/// Look up a catalog entry by id.
pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Catalog entries met by `totals` that are not in `earned`.
pub fn newly_earned(totals: &AccountTotals, earned: &[String]) -> Vec<&'static Achievement> {
    CATALOG
        .iter()
        .filter(|a| a.is_met(totals) && !earned.iter().any(|e| e == a.id))
        .collect()
}

/// Ids newly met by `totals`, and `earned` with them appended.
pub fn award(earned: &[String], totals: &AccountTotals) -> (Vec<String>, Vec<String>) {
    let new: Vec<String> = newly_earned(totals, earned)
        .into_iter()
        .map(|a| a.id.to_string())
        .collect();
    let all = earned.iter().chain(new.iter()).cloned().collect();
    (new, all)
}
