//! Urgency tags: look-ahead windows and display labels
//!
//! One table drives both the free-day search and the label prefixed to
//! booked events. Lookups are case-insensitive. Aliases only affect labels;
//! the free-day search accepts the primary tags.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Inclusive day offsets from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrgencyWindow {
    pub start_days: u32,
    pub end_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgencyLevel {
    pub window: UrgencyWindow,
    pub label: String,
    pub aliases: Vec<String>,
}

impl UrgencyLevel {
    pub fn new(start_days: u32, end_days: u32, label: &str, aliases: &[&str]) -> Self {
        Self {
            window: UrgencyWindow {
                start_days,
                end_days,
            },
            label: label.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrgencyPolicy {
    levels: BTreeMap<String, UrgencyLevel>,
    labels: BTreeMap<String, String>,
    default_label: String,
    override_label: String,
}

impl UrgencyPolicy {
    /// Build and validate the table.
    ///
    /// Rejects an empty table, blank tags or labels, windows whose start lies
    /// after their end, and a tag or alias claimed twice.
    pub fn new(
        levels: BTreeMap<String, UrgencyLevel>,
        default_label: String,
        override_label: String,
    ) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::InvalidSchedule(
                "at least one urgency level is required".into(),
            ));
        }
        if default_label.trim().is_empty() || override_label.trim().is_empty() {
            return Err(Error::InvalidSchedule(
                "default and override labels must not be blank".into(),
            ));
        }

        let mut normalized = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for (tag, level) in levels {
            let tag = normalize(&tag);
            if tag.is_empty() {
                return Err(Error::InvalidSchedule("urgency tag must not be blank".into()));
            }
            if level.window.start_days > level.window.end_days {
                return Err(Error::InvalidSchedule(format!(
                    "urgency {tag}: start_days {} is after end_days {}",
                    level.window.start_days, level.window.end_days
                )));
            }
            if level.label.trim().is_empty() {
                return Err(Error::InvalidSchedule(format!(
                    "urgency {tag}: label must not be blank"
                )));
            }
            for name in std::iter::once(tag.clone()).chain(level.aliases.iter().map(|a| normalize(a))) {
                if labels.insert(name.clone(), level.label.clone()).is_some() {
                    return Err(Error::InvalidSchedule(format!(
                        "urgency name {name} is defined twice"
                    )));
                }
            }
            normalized.insert(tag, level);
        }

        Ok(Self {
            levels: normalized,
            labels,
            default_label,
            override_label,
        })
    }

    /// Look-ahead window for a primary tag.
    pub fn window(&self, tag: &str) -> Result<UrgencyWindow> {
        self.levels
            .get(&normalize(tag))
            .map(|level| level.window)
            .ok_or_else(|| Error::UnknownUrgency(tag.to_string()))
    }

    /// Display label for a booking. The override flag wins over any urgency;
    /// unknown urgencies fall back to the default label.
    pub fn label(&self, urgency: &str, override_now: bool) -> &str {
        if override_now {
            return &self.override_label;
        }
        self.labels
            .get(&normalize(urgency))
            .map(String::as_str)
            .unwrap_or(&self.default_label)
    }

    /// Primary tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

/// Built-in urgency table, with the Polish names accepted as aliases.
pub fn default_levels() -> BTreeMap<String, UrgencyLevel> {
    BTreeMap::from([
        ("standard".to_string(), UrgencyLevel::new(7, 14, "🟢", &["standardowa"])),
        ("urgent".to_string(), UrgencyLevel::new(1, 6, "🟠", &["pilna"])),
        ("now".to_string(), UrgencyLevel::new(0, 1, "🔴", &["natychmiastowa"])),
        ("plan".to_string(), UrgencyLevel::new(15, 30, "🔵", &["planowa"])),
    ])
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self::new(default_levels(), "🟢".into(), "🔺".into())
            .expect("built-in urgency table is valid")
    }
}

fn normalize(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows() {
        let policy = UrgencyPolicy::default();
        let w = |tag| {
            let w = policy.window(tag).unwrap();
            (w.start_days, w.end_days)
        };
        assert_eq!(w("standard"), (7, 14));
        assert_eq!(w("urgent"), (1, 6));
        assert_eq!(w("now"), (0, 1));
        assert_eq!(w("plan"), (15, 30));
        assert_eq!(w(" Urgent "), (1, 6));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let policy = UrgencyPolicy::default();
        assert!(matches!(
            policy.window("someday"),
            Err(Error::UnknownUrgency(t)) if t == "someday"
        ));
        // Aliases label bookings but do not select a window
        assert!(policy.window("pilna").is_err());
    }

    #[test]
    fn labels_with_aliases_fallback_and_override() {
        let policy = UrgencyPolicy::default();
        assert_eq!(policy.label("urgent", false), "🟠");
        assert_eq!(policy.label("PILNA", false), "🟠");
        assert_eq!(policy.label("plan", false), "🔵");
        assert_eq!(policy.label("whenever", false), "🟢");
        assert_eq!(policy.label("plan", true), "🔺");
        assert_eq!(policy.label("now", true), "🔺");
    }

    #[test]
    fn inverted_window_is_rejected() {
        let levels = BTreeMap::from([("soon".to_string(), UrgencyLevel::new(5, 2, "x", &[]))]);
        let err = UrgencyPolicy::new(levels, "d".into(), "o".into()).unwrap_err();
        assert!(err.to_string().contains("start_days 5 is after end_days 2"));
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let levels = BTreeMap::from([
            ("a".to_string(), UrgencyLevel::new(0, 1, "x", &["dup"])),
            ("b".to_string(), UrgencyLevel::new(0, 1, "y", &["dup"])),
        ]);
        assert!(UrgencyPolicy::new(levels, "d".into(), "o".into()).is_err());
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(UrgencyPolicy::new(BTreeMap::new(), "d".into(), "o".into()).is_err());
    }

    #[test]
    fn tags_are_sorted() {
        let policy = UrgencyPolicy::default();
        let tags: Vec<_> = policy.tags().collect();
        assert_eq!(tags, vec!["now", "plan", "standard", "urgent"]);
    }
}
