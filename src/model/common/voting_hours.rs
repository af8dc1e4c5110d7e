use serde::{Deserialize, Serialize};

/// A daily voting window, as whole hours of the day: voting is open from
/// `start_hour:00` up to but not including `end_hour:00`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl VotingHours {
    /// Voting all day; equivalent to no daily restriction.
    pub const ALL_DAY: Self = Self {
        start_hour: 0,
        end_hour: 24,
    };

    /// Check that the hours describe a non-empty window within one day.
    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24
    }

    /// Does the given hour of the day (0-23) fall within the window?
    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

impl Default for VotingHours {
    fn default() -> Self {
        Self::ALL_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds() {
        let hours = VotingHours {
            start_hour: 8,
            end_hour: 17,
        };
        assert!(!hours.contains(7));
        assert!(hours.contains(8));
        assert!(hours.contains(16));
        assert!(!hours.contains(17));
        assert!((0..24).all(|h| VotingHours::ALL_DAY.contains(h)));
    }

    #[test]
    fn validity() {
        assert!(VotingHours::ALL_DAY.is_valid());
        assert!(!VotingHours {
            start_hour: 9,
            end_hour: 9
        }
        .is_valid());
        assert!(!VotingHours {
            start_hour: 20,
            end_hour: 25
        }
        .is_valid());
    }
}
