use serde::{Deserialize, Serialize};

/// A named, bounded single-byte controller setting.
///
/// `min <= current <= max` holds after every successful registry update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    pub min: u8,
    pub max: u8,
    #[serde(rename = "default")]
    pub current: u8,
    #[serde(default)]
    pub description: String,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, min: u8, max: u8, current: u8) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            current,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn contains(&self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let p = Parameter::new("StartT", 5, 100, 25).with_description("start period (ms)");
        assert!(p.contains(5));
        assert!(p.contains(100));
        assert!(!p.contains(4));
        assert!(!p.contains(101));
        assert_eq!(p.description, "start period (ms)");
    }
}
