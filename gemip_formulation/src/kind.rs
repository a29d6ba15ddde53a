use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use gemip_common::FormulationConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formulation::Formulation;
use crate::ged::{BipartiteGraphMatching, LinearGraphEditDistance, QuadraticGraphEditDistance};
use crate::subgraph::{
    ErrorTolerantSubgraphIsomorphism, ExactSubgraphIsomorphism, SubgraphIsomorphism,
    SubstitutionTolerantSubgraphIsomorphism,
};

/// Every available formulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormulationKind {
    /// Vertex assignment only.
    BipartiteGraphMatching,
    /// Edit distance with linearized edge terms.
    LinearGraphEditDistance,
    /// Edit distance with product edge terms.
    QuadraticGraphEditDistance,
    /// Identity preserving subgraph isomorphism.
    SubgraphIsomorphism,
    /// Subgraph isomorphism with substitution costs.
    SubstitutionTolerant,
    /// Subgraph isomorphism with penalized missing edges.
    ErrorTolerant,
    /// Subgraph isomorphism with pairwise exclusion rows.
    Exact,
}

/// A string naming no formulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown formulation '{0}' (expected one of: {names})", names = FormulationKind::names().join(", "))]
pub struct UnknownFormulation(pub String);

impl FormulationKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::BipartiteGraphMatching,
        Self::LinearGraphEditDistance,
        Self::QuadraticGraphEditDistance,
        Self::SubgraphIsomorphism,
        Self::SubstitutionTolerant,
        Self::ErrorTolerant,
        Self::Exact,
    ];

    /// Short command-line name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BipartiteGraphMatching => "bipartite",
            Self::LinearGraphEditDistance => "linear-ged",
            Self::QuadraticGraphEditDistance => "quadratic-ged",
            Self::SubgraphIsomorphism => "subiso",
            Self::SubstitutionTolerant => "subtol",
            Self::ErrorTolerant => "errortol",
            Self::Exact => "exact",
        }
    }

    /// Every short name.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }

    /// Whether the kind maps the whole pattern injectively into the world.
    #[must_use]
    pub const fn is_subgraph(self) -> bool {
        matches!(
            self,
            Self::SubgraphIsomorphism
                | Self::SubstitutionTolerant
                | Self::ErrorTolerant
                | Self::Exact
        )
    }

    /// Builds the formulation with `config`.
    #[must_use]
    pub fn instantiate(self, config: &FormulationConfig) -> Arc<dyn Formulation> {
        let config = config.clone();
        match self {
            Self::BipartiteGraphMatching => Arc::new(BipartiteGraphMatching::new(config)),
            Self::LinearGraphEditDistance => Arc::new(LinearGraphEditDistance::new(config)),
            Self::QuadraticGraphEditDistance => Arc::new(QuadraticGraphEditDistance::new(config)),
            Self::SubgraphIsomorphism => Arc::new(SubgraphIsomorphism::new(config)),
            Self::SubstitutionTolerant => {
                Arc::new(SubstitutionTolerantSubgraphIsomorphism::new(config))
            }
            Self::ErrorTolerant => Arc::new(ErrorTolerantSubgraphIsomorphism::new(config)),
            Self::Exact => Arc::new(ExactSubgraphIsomorphism::new(config)),
        }
    }
}

impl fmt::Display for FormulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormulationKind {
    type Err = UnknownFormulation;

    /// Accepts a full name or an unambiguous prefix, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return Err(UnknownFormulation(s.to_string()));
        }
        if let Some(kind) = Self::ALL.into_iter().find(|k| k.name() == wanted) {
            return Ok(kind);
        }
        let mut candidates = Self::ALL
            .into_iter()
            .filter(|k| k.name().starts_with(&wanted));
        match (candidates.next(), candidates.next()) {
            (Some(kind), None) => Ok(kind),
            _ => Err(UnknownFormulation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::full("exact", FormulationKind::Exact)]
    #[case::upper("BIPARTITE", FormulationKind::BipartiteGraphMatching)]
    #[case::prefix("err", FormulationKind::ErrorTolerant)]
    #[case::dashed("linear-ged", FormulationKind::LinearGraphEditDistance)]
    #[case::padded(" subiso ", FormulationKind::SubgraphIsomorphism)]
    fn test_parse(#[case] input: &str, #[case] expected: FormulationKind) {
        assert_eq!(input.parse::<FormulationKind>(), Ok(expected));
    }

    #[rstest]
    #[case::ambiguous("sub")]
    #[case::empty("")]
    #[case::unknown("hungarian")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<FormulationKind>().is_err());
    }

    #[test]
    fn test_instantiated_kind_round_trips() {
        let config = FormulationConfig::default();
        for kind in FormulationKind::ALL {
            assert_eq!(kind.instantiate(&config).kind(), kind);
            assert_eq!(kind.to_string().parse::<FormulationKind>(), Ok(kind));
        }
    }
}
