//! Change Detector Service
//!
//! Decides whether a freshly built routing model warrants a config reload.

use crate::domain::entities::RoutingModel;

/// Base-domain differences between two models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainDiff {
    /// Domains in the current model only
    pub added: Vec<String>,
    /// Domains in the previous model only
    pub removed: Vec<String>,
}

impl DomainDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Gate in front of rendering and applying a configuration.
///
/// A model's identity is its set of base domains. Port or target changes
/// inside an unchanged domain set are reported as unchanged, trading
/// freshness for fewer reloads.
pub struct ChangeDetector;

impl ChangeDetector {
    /// True on the first pass or when the base-domain sets differ.
    pub fn has_changed(previous: Option<&RoutingModel>, current: &RoutingModel) -> bool {
        match previous {
            None => true,
            Some(previous) => !Self::diff(previous, current).is_empty(),
        }
    }

    /// Compute which base domains appeared and disappeared.
    pub fn diff(previous: &RoutingModel, current: &RoutingModel) -> DomainDiff {
        let before = previous.base_domains();
        let after = current.base_domains();

        DomainDiff {
            added: after.difference(&before).map(|d| d.to_string()).collect(),
            removed: before.difference(&after).map(|d| d.to_string()).collect(),
        }
    }
}
