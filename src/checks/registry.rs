//! Static check registry

use crate::checks::types::{CheckDefinition, Scope};
use crate::checks::{ai, seo, technical};
use std::collections::HashSet;
use thiserror::Error;

/// Two definitions share a name
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Duplicate check name: {0}")]
pub struct DuplicateCheck(pub &'static str);

/// Ordered collection of check definitions with unique names
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    checks: Vec<CheckDefinition>,
}

impl CheckRegistry {
    /// Every built-in check: SEO, then AI readiness, then technical
    pub fn builtin() -> Self {
        let checks = seo::CHECKS
            .iter()
            .chain(ai::CHECKS)
            .chain(technical::CHECKS)
            .copied()
            .collect();
        Self { checks }
    }

    /// Builds a registry from custom definitions, rejecting duplicate names
    pub fn with_checks(checks: Vec<CheckDefinition>) -> Result<Self, DuplicateCheck> {
        let mut seen = HashSet::new();
        for check in &checks {
            if !seen.insert(check.name) {
                return Err(DuplicateCheck(check.name));
            }
        }
        Ok(Self { checks })
    }

    /// Looks up a definition by name
    pub fn get(&self, name: &str) -> Option<&CheckDefinition> {
        self.checks.iter().find(|check| check.name == name)
    }

    /// All definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CheckDefinition> {
        self.checks.iter()
    }

    /// Definitions evaluated once per audit
    pub fn site_checks(&self) -> impl Iterator<Item = &CheckDefinition> {
        self.checks.iter().filter(|c| c.scope == Scope::SiteWide)
    }

    /// Definitions evaluated once per page
    pub fn page_checks(&self) -> impl Iterator<Item = &CheckDefinition> {
        self.checks.iter().filter(|c| c.scope == Scope::Page)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
