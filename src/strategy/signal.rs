//! Trading signals - output of the strategy selector

use serde::{Deserialize, Serialize};

/// Trading signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Enter or add to a long position
    Buy,
    /// Reduce or exit
    Sell,
    /// No action
    Hold,
}

/// Signal strength bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    /// Representative confidence (0-100) of the bucket
    pub fn to_confidence(&self) -> f64 {
        match self {
            SignalStrength::Weak => 40.0,
            SignalStrength::Moderate => 60.0,
            SignalStrength::Strong => 80.0,
            SignalStrength::VeryStrong => 95.0,
        }
    }

    /// Bucket a 0-100 confidence
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 90.0 {
            SignalStrength::VeryStrong
        } else if confidence >= 70.0 {
            SignalStrength::Strong
        } else if confidence >= 50.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

/// Strategy family chosen by the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    Defensive,
    TakeProfit,
    EventDriven,
    Breakout,
    TrendFollowing,
    ShortTermSwing,
    Wait,
}

impl StrategyMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyMode::Defensive => "Defensive",
            StrategyMode::TakeProfit => "Take Profit",
            StrategyMode::EventDriven => "Event Driven",
            StrategyMode::Breakout => "Breakout",
            StrategyMode::TrendFollowing => "Trend Following",
            StrategyMode::ShortTermSwing => "Short-Term Swing",
            StrategyMode::Wait => "Wait",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_buckets() {
        assert_eq!(SignalStrength::from_confidence(95.0), SignalStrength::VeryStrong);
        assert_eq!(SignalStrength::from_confidence(70.0), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(50.0), SignalStrength::Moderate);
        assert_eq!(SignalStrength::from_confidence(12.0), SignalStrength::Weak);
        for s in [SignalStrength::Weak, SignalStrength::Moderate, SignalStrength::Strong, SignalStrength::VeryStrong] {
            assert_eq!(SignalStrength::from_confidence(s.to_confidence()), s);
        }
    }
}
