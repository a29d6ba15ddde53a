use std::cmp::Ordering;
use std::fmt;

use contracts::*;
use gemip_graph::{Graph, GraphElement};
use gemip_solver::SolveStatus;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::kind::FormulationKind;

/// Where a source element ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Image {
    /// Substituted by the target element at this index.
    Mapped(usize),
    /// Deleted, or left without counterpart.
    Unmapped,
}

impl Image {
    /// Target index, if mapped.
    #[must_use]
    pub const fn target(self) -> Option<usize> {
        match self {
            Self::Mapped(k) => Some(k),
            Self::Unmapped => None,
        }
    }

    /// Whether the element has a counterpart.
    #[must_use]
    pub const fn is_mapped(self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

/// A decoded correspondence between a source and a target graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    formulation: FormulationKind,
    status: SolveStatus,
    cost: f64,
    vertex_map: Vec<Image>,
    edge_map: Vec<Image>,
    inserted_vertices: Vec<usize>,
    inserted_edges: Vec<usize>,
}

impl Solution {
    /// A correspondence with nothing inserted.
    #[must_use]
    pub const fn new(
        formulation: FormulationKind,
        status: SolveStatus,
        cost: f64,
        vertex_map: Vec<Image>,
        edge_map: Vec<Image>,
    ) -> Self {
        Self {
            formulation,
            status,
            cost,
            vertex_map,
            edge_map,
            inserted_vertices: Vec::new(),
            inserted_edges: Vec::new(),
        }
    }

    /// Records the target elements created by the correspondence.
    #[must_use]
    pub fn with_insertions(mut self, vertices: Vec<usize>, edges: Vec<usize>) -> Self {
        self.inserted_vertices = vertices;
        self.inserted_edges = edges;
        self
    }

    /// Formulation that produced the correspondence.
    #[must_use]
    pub const fn formulation(&self) -> FormulationKind {
        self.formulation
    }

    /// Solver status of the solve that produced it.
    #[must_use]
    pub const fn status(&self) -> SolveStatus {
        self.status
    }

    /// Whether optimality was proven.
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Total cost.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Image of every source vertex, by index.
    #[must_use]
    pub fn vertex_map(&self) -> &[Image] {
        &self.vertex_map
    }

    /// Image of every source edge, by index.
    #[must_use]
    pub fn edge_map(&self) -> &[Image] {
        &self.edge_map
    }

    /// Image of source vertex `i`.
    #[must_use]
    pub fn vertex_image(&self, i: usize) -> Image {
        self.vertex_map.get(i).copied().unwrap_or(Image::Unmapped)
    }

    /// Image of source edge `e`.
    #[must_use]
    pub fn edge_image(&self, e: usize) -> Image {
        self.edge_map.get(e).copied().unwrap_or(Image::Unmapped)
    }

    /// Mapped vertex pairs `(source, target)`.
    pub fn vertex_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.vertex_map
            .iter()
            .enumerate()
            .filter_map(|(i, image)| image.target().map(|k| (i, k)))
    }

    /// Source vertices without image.
    pub fn deleted_vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.vertex_map
            .iter()
            .positions(|image| !image.is_mapped())
    }

    /// Target vertices created by the correspondence.
    #[must_use]
    pub fn inserted_vertices(&self) -> &[usize] {
        &self.inserted_vertices
    }

    /// Target edges created by the correspondence.
    #[must_use]
    pub fn inserted_edges(&self) -> &[usize] {
        &self.inserted_edges
    }

    /// Renders the correspondence with element identifiers.
    #[must_use]
    pub fn describe(&self, source: &Graph, target: &Graph) -> String {
        let vertex = |g: &Graph, i: usize| g.vertex(i).map_or("?", GraphElement::id).to_string();
        let pairs = self
            .vertex_map
            .iter()
            .enumerate()
            .map(|(i, image)| match image {
                Image::Mapped(k) => format!("{}->{}", vertex(source, i), vertex(target, *k)),
                Image::Unmapped => format!("{}->_", vertex(source, i)),
            })
            .join(", ");
        format!("{} [{}] cost {:.6}: {pairs}", self.formulation, self.status, self.cost)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] cost {}: ", self.formulation, self.status, self.cost)?;
        let pairs = self
            .vertex_map
            .iter()
            .enumerate()
            .map(|(i, image)| match image {
                Image::Mapped(k) => format!("{i}->{k}"),
                Image::Unmapped => format!("{i}->_"),
            })
            .join(", ");
        f.write_str(&pairs)
    }
}

/// Solutions ordered by ascending cost; equal costs keep arrival order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SolutionList {
    solutions: Vec<Solution>,
}

impl SolutionList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts after every solution of lower or equal cost and returns the
    /// position.
    #[ensures(self.is_sorted())]
    pub fn push(&mut self, solution: Solution) -> usize {
        let position = self
            .solutions
            .partition_point(|s| s.cost.total_cmp(&solution.cost) != Ordering::Greater);
        self.solutions.insert(position, solution);
        position
    }

    /// Whether costs are non-decreasing.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.solutions
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.cost.total_cmp(&b.cost) != Ordering::Greater)
    }

    /// Cheapest solution.
    #[must_use]
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    /// Solution at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Solution> {
        self.solutions.get(index)
    }

    /// Number of solutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether the list holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Solutions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Solution> {
        self.solutions.iter()
    }

    /// Solutions in order.
    #[must_use]
    pub fn as_slice(&self) -> &[Solution] {
        &self.solutions
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Solution> {
        self.solutions
    }
}

impl Extend<Solution> for SolutionList {
    fn extend<I: IntoIterator<Item = Solution>>(&mut self, iter: I) {
        for solution in iter {
            self.push(solution);
        }
    }
}

impl FromIterator<Solution> for SolutionList {
    fn from_iter<I: IntoIterator<Item = Solution>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<'a> IntoIterator for &'a SolutionList {
    type Item = &'a Solution;
    type IntoIter = std::slice::Iter<'a, Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.iter()
    }
}

impl IntoIterator for SolutionList {
    type Item = Solution;
    type IntoIter = std::vec::IntoIter<Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(cost: f64, tag: usize) -> Solution {
        Solution::new(
            FormulationKind::Exact,
            SolveStatus::Optimal,
            cost,
            vec![Image::Mapped(tag)],
            Vec::new(),
        )
    }

    #[test]
    fn test_push_orders_by_cost_then_arrival() {
        let mut list = SolutionList::new();
        assert_eq!(list.push(solution(2.0, 0)), 0);
        assert_eq!(list.push(solution(1.0, 1)), 0);
        assert_eq!(list.push(solution(2.0, 2)), 2);
        assert_eq!(list.push(solution(1.0, 3)), 1);
        let tags: Vec<_> = list.iter().map(|s| s.vertex_image(0)).collect();
        assert_eq!(
            tags,
            vec![
                Image::Mapped(1),
                Image::Mapped(3),
                Image::Mapped(0),
                Image::Mapped(2)
            ]
        );
        assert_eq!(list.best().map(Solution::cost), Some(1.0));
    }

    #[test]
    fn test_display_and_accessors() {
        let s = Solution::new(
            FormulationKind::BipartiteGraphMatching,
            SolveStatus::Feasible,
            1.5,
            vec![Image::Mapped(2), Image::Unmapped],
            vec![Image::Unmapped],
        )
        .with_insertions(vec![0, 1], Vec::new());
        assert_eq!(s.to_string(), "bipartite [feasible] cost 1.5: 0->2, 1->_");
        assert!(!s.is_optimal());
        assert_eq!(s.vertex_pairs().collect::<Vec<_>>(), vec![(0, 2)]);
        assert_eq!(s.deleted_vertices().collect::<Vec<_>>(), vec![1]);
        assert_eq!(s.inserted_vertices(), &[0, 1]);
        assert_eq!(s.vertex_image(7), Image::Unmapped);
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_string(&solution(0.0, 4)).expect("serializable");
        assert!(json.contains("\"formulation\":\"exact\""));
        assert!(json.contains("{\"Mapped\":4}"));
    }
}
