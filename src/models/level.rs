use serde::{Deserialize, Serialize};

/// 难度等级（有序：하 < 중하 < 중 < 중상 < 상）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// 하
    Low,
    /// 중하
    MidLow,
    /// 중
    Mid,
    /// 중상
    MidHigh,
    /// 상
    High,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Low,
        Level::MidLow,
        Level::Mid,
        Level::MidHigh,
        Level::High,
    ];

    /// 获取标准标签
    pub fn label(self) -> &'static str {
        match self {
            Level::Low => "하",
            Level::MidLow => "중하",
            Level::Mid => "중",
            Level::MidHigh => "중상",
            Level::High => "상",
        }
    }

    /// 从标签解析难度（精确匹配，兼容英文写法）
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "하" | "low" => Some(Level::Low),
            "중하" | "mid-low" => Some(Level::MidLow),
            "중" | "mid" => Some(Level::Mid),
            "중상" | "mid-high" => Some(Level::MidHigh),
            "상" | "high" => Some(Level::High),
            _ => None,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Mid
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Level {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Level::from_label(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("未知难度等级: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order_and_labels() {
        assert!(Level::Low < Level::MidLow);
        assert!(Level::MidHigh < Level::High);
        for level in Level::ALL {
            assert_eq!(Level::from_label(level.label()), Some(level));
        }
        assert_eq!(Level::from_label("최상"), None);
    }
}
