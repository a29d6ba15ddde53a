use std::collections::BTreeSet;
use std::sync::OnceLock;

use gemip_common::{CutMethod, DecodeConfig, FormulationConfig};
use gemip_formulation::{
    ExactSubgraphIsomorphism, Formulation, FormulationKind, Image, Solution,
};
use gemip_graph::{Graph, GraphElement, GraphKind, Weight, Weights};
use gemip_program::Program;
use gemip_solver::{ExhaustiveSolver, SolveOptions, SolveStatus, Solver};
use itertools::Itertools;

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn labeled(id: &str, kind: GraphKind, labels: &[&str], edges: &[(usize, usize)]) -> Graph {
    let mut b = Graph::builder(id, kind);
    for label in labels {
        b.add_vertex(*label, Weight::labeled(*label).with_cost(1.0))
            .expect("fresh vertex");
    }
    for (n, &(u, v)) in edges.iter().enumerate() {
        b.connect(format!("e{n}"), u, v, Weight::default().with_cost(1.0))
            .expect("fresh edge");
    }
    b.build()
}

fn references_are_declared(program: &Program) -> bool {
    program.objective().variables().all(|v| program.declares(v))
        && program
            .constraints()
            .iter()
            .all(|c| c.expression().variables().all(|v| program.declares(v)))
}

/// Solves and decodes; `Ok(None)` when the program is infeasible.
fn solve(
    formulation: &dyn Formulation,
    source: &Graph,
    target: &Graph,
    weights: &Weights,
) -> Result<Option<Solution>, String> {
    let (program, decoder) = formulation
        .build_program(source, target, weights)
        .map_err(|e| e.to_string())?;
    let result = ExhaustiveSolver::new().solve(&program, &SolveOptions::default());
    match result.status {
        SolveStatus::Infeasible => Ok(None),
        SolveStatus::Optimal => decoder
            .decode(source, target, weights, &result, &DecodeConfig::default())
            .map(Some)
            .map_err(|e| e.to_string()),
        other => Err(format!("unexpected status {other}")),
    }
}

#[test]
fn test_every_formulation_declares_its_references() {
    init_test_logger();
    for kind in [GraphKind::Directed, GraphKind::Undirected] {
        let source = labeled("s", kind, &["a", "b", "c"], &[(0, 1), (1, 2)]);
        let target = labeled("t", kind, &["a", "b", "c", "d"], &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let weights = Weights::label_distance(&source, &target, 1.0);
        for induced in [false, true] {
            let config = FormulationConfig {
                induced,
                ..FormulationConfig::default()
            };
            for formulation in FormulationKind::ALL {
                let (program, decoder) = formulation
                    .instantiate(&config)
                    .build_program(&source, &target, &weights)
                    .expect("valid formulation");
                assert!(references_are_declared(&program), "{formulation}");
                assert_eq!(decoder.variable_count(), program.variable_count());
                assert_eq!(decoder.kind(), formulation);
            }
        }
    }
}

#[test]
fn test_exact_scenario_never_maps_onto_a_missing_edge() {
    init_test_logger();
    let pattern = labeled("p", GraphKind::Directed, &["v1", "v2"], &[(0, 1)]);
    let world = labeled("w", GraphKind::Directed, &["a", "b", "c"], &[(0, 1), (1, 2)]);
    let weights = Weights::zero(&pattern, &world);
    let formulation = ExactSubgraphIsomorphism::default();
    let (mut program, decoder) = formulation
        .build_program(&pattern, &world, &weights)
        .expect("valid formulation");

    let mut found = BTreeSet::new();
    let solver = ExhaustiveSolver::new();
    loop {
        let result = solver.solve(&program, &SolveOptions::default());
        if result.status == SolveStatus::Infeasible {
            break;
        }
        let solution = decoder
            .decode(&pattern, &world, &weights, &result, &DecodeConfig::default())
            .expect("consistent solution");
        assert_eq!(solution.cost(), 0.0);
        found.insert(solution.vertex_map().to_vec());
        let cut = decoder
            .cut(&solution, CutMethod::Solution)
            .expect("non-empty mapping");
        program = program.with_constraint(cut).expect("valid cut");
        assert!(found.len() <= 2, "too many solutions: {found:?}");
    }
    let expected: BTreeSet<Vec<Image>> = [
        vec![Image::Mapped(0), Image::Mapped(1)],
        vec![Image::Mapped(1), Image::Mapped(2)],
    ]
    .into_iter()
    .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_identity_match_is_free() {
    init_test_logger();
    let g = labeled(
        "g",
        GraphKind::Directed,
        &["a", "b", "c", "d"],
        &[(0, 1), (1, 2), (2, 0), (2, 3)],
    );
    let weights = Weights::label_distance(&g, &g, 1.0);
    let identity: Vec<Image> = (0..4).map(Image::Mapped).collect();
    for kind in [FormulationKind::BipartiteGraphMatching, FormulationKind::Exact] {
        let formulation = kind.instantiate(&FormulationConfig::default());
        let solution = solve(formulation.as_ref(), &g, &g, &weights)
            .expect("solvable")
            .expect("feasible");
        assert_eq!(solution.cost(), 0.0, "{kind}");
        assert_eq!(solution.vertex_map(), identity.as_slice(), "{kind}");
    }
}

#[test]
fn test_edit_distance_family_agrees() {
    init_test_logger();
    let source = labeled("s", GraphKind::Directed, &["a", "b", "c"], &[(0, 1), (1, 2)]);
    let target = labeled("t", GraphKind::Directed, &["a", "b", "d"], &[(0, 1), (2, 1)]);
    let weights = Weights::label_distance(&source, &target, 1.5);
    let linear = solve(
        FormulationKind::LinearGraphEditDistance
            .instantiate(&FormulationConfig::default())
            .as_ref(),
        &source,
        &target,
        &weights,
    )
    .expect("solvable")
    .expect("feasible");
    let quadratic = solve(
        FormulationKind::QuadraticGraphEditDistance
            .instantiate(&FormulationConfig::default())
            .as_ref(),
        &source,
        &target,
        &weights,
    )
    .expect("solvable")
    .expect("feasible");
    let bipartite = solve(
        FormulationKind::BipartiteGraphMatching
            .instantiate(&FormulationConfig::default())
            .as_ref(),
        &source,
        &target,
        &weights,
    )
    .expect("solvable")
    .expect("feasible");
    // c -> d costs 1.5, b->c is deleted and d->b inserted
    assert_eq!(linear.cost(), 3.5);
    assert_eq!(quadratic.cost(), linear.cost());
    assert!(bipartite.cost() <= linear.cost());
}

mod monotonicity {
    use super::*;
    use quickcheck::{Arbitrary, Gen, QuickCheck};

    /// A random pattern of at most 4 vertices and a world of at most 6.
    #[derive(Clone, Debug)]
    struct Instance {
        pattern: Graph,
        world: Graph,
        weights: Weights,
    }

    fn random_graph(g: &mut Gen, id: &str, kind: GraphKind, n: usize) -> Graph {
        let mut b = Graph::builder(id, kind);
        for i in 0..n {
            let cost = f64::from(1 + u8::arbitrary(g) % 3);
            b.add_vertex(format!("{id}{i}"), Weight::default().with_cost(cost))
                .expect("fresh vertex");
        }
        let candidates: Vec<(usize, usize)> = match kind {
            GraphKind::Directed => (0..n)
                .cartesian_product(0..n)
                .filter(|(u, v)| u != v)
                .collect(),
            GraphKind::Undirected => (0..n).tuple_combinations().collect(),
        };
        for (n, (u, v)) in candidates.into_iter().enumerate() {
            if u8::arbitrary(g) % 3 == 0 {
                let cost = f64::from(1 + u8::arbitrary(g) % 3);
                b.connect(format!("{id}e{n}"), u, v, Weight::default().with_cost(cost))
                    .expect("fresh edge");
            }
        }
        b.build()
    }

    impl Arbitrary for Instance {
        fn arbitrary(g: &mut Gen) -> Self {
            let kind = if bool::arbitrary(g) {
                GraphKind::Directed
            } else {
                GraphKind::Undirected
            };
            let n = 1 + usize::arbitrary(g) % 4;
            let m = n + usize::arbitrary(g) % (7 - n);
            let pattern = random_graph(g, "p", kind, n);
            let world = random_graph(g, "w", kind, m);
            let mut cost = |len: usize| -> Vec<f64> {
                (0..len).map(|_| f64::from(u8::arbitrary(g) % 4)).collect()
            };
            let (m, wm) = (world.vertex_count(), world.edge_count());
            let vertex = cost(pattern.vertex_count() * m);
            let edge = cost(pattern.edge_count() * wm);
            let weights = Weights::from_fn(
                &pattern,
                &world,
                |a, b| vertex[a.index() * m + b.index()],
                |e, f| edge[e.index() * wm + f.index()],
            );
            Self {
                pattern,
                world,
                weights,
            }
        }
    }

    /// Cheapest injective mapping, trying every one.
    fn brute_force(inst: &Instance, tolerant: bool) -> Option<f64> {
        let w = &inst.weights;
        (0..inst.world.vertex_count())
            .permutations(inst.pattern.vertex_count())
            .filter_map(|map| {
                let mut cost: f64 = map
                    .iter()
                    .enumerate()
                    .map(|(i, &k)| w.vertex_substitution(i, k))
                    .sum();
                for (e, edge) in inst.pattern.edges().iter().enumerate() {
                    let (i, j) = edge.endpoints();
                    match inst.world.edge_between(map[i], map[j]) {
                        Some(f) if tolerant => {
                            cost += w.edge_substitution(e, f.index()).min(w.edge_deletion(e));
                        }
                        Some(f) => cost += w.edge_substitution(e, f.index()),
                        None if tolerant => cost += w.edge_deletion(e),
                        None => return None,
                    }
                }
                Some(cost)
            })
            .min_by(f64::total_cmp)
    }

    fn optimum(kind: FormulationKind, inst: &Instance) -> Result<Option<f64>, String> {
        let formulation = kind.instantiate(&FormulationConfig::default());
        solve(formulation.as_ref(), &inst.pattern, &inst.world, &inst.weights)
            .map(|s| s.map(|s| s.cost()))
    }

    fn close(a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => (a - b).abs() < 1e-6,
            (None, None) => true,
            _ => false,
        }
    }

    fn prop_error_tolerant_never_costs_more(inst: Instance) -> bool {
        let (Ok(exact), Ok(tolerant)) = (
            optimum(FormulationKind::Exact, &inst),
            optimum(FormulationKind::ErrorTolerant, &inst),
        ) else {
            return false;
        };
        close(exact, brute_force(&inst, false))
            && close(tolerant, brute_force(&inst, true))
            && tolerant.is_some()
            && exact.is_none_or(|e| tolerant.is_some_and(|t| t <= e + 1e-6))
    }

    fn prop_substitution_tolerant_matches_exact(inst: Instance) -> bool {
        let (Ok(exact), Ok(flow)) = (
            optimum(FormulationKind::Exact, &inst),
            optimum(FormulationKind::SubstitutionTolerant, &inst),
        ) else {
            return false;
        };
        close(exact, flow)
    }

    #[test]
    fn test_error_tolerant_never_costs_more() {
        init_test_logger();
        QuickCheck::new()
            .tests(40)
            .quickcheck(prop_error_tolerant_never_costs_more as fn(Instance) -> bool);
    }

    #[test]
    fn test_substitution_tolerant_matches_exact() {
        init_test_logger();
        QuickCheck::new()
            .tests(25)
            .quickcheck(prop_substitution_tolerant_matches_exact as fn(Instance) -> bool);
    }
}
