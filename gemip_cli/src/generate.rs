//! Seeded random graph pairs.
//!
//! The pattern is sampled from the world: pick `pattern_size` world vertices,
//! keep the edges among them, then relabel each pattern vertex with
//! probability `noise`. With zero noise an exact embedding always exists.

use gemip_graph::{Graph, GraphError, GraphKind};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Shape of a generated pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PairShape {
    pub pattern_size: usize,
    pub world_size: usize,
    pub density: f64,
    pub labels: usize,
    pub noise: f64,
    pub directed: bool,
    pub seed: u64,
}

/// A pattern, the world and the world vertices the pattern was sampled from.
#[derive(Debug)]
pub struct Pair {
    pub pattern: Graph,
    pub world: Graph,
    pub planted: Vec<usize>,
}

fn label(n: usize) -> String {
    // a, b, ..., z, l26, l27, ...
    match u8::try_from(n) {
        Ok(n) if n < 26 => char::from(b'a' + n).to_string(),
        _ => format!("l{n}"),
    }
}

fn as_str(labels: &[String]) -> Vec<&str> {
    labels.iter().map(String::as_str).collect()
}

/// Generates a pair; a pattern larger than the world is truncated to the world.
pub fn pair(shape: &PairShape) -> Result<Pair, GraphError> {
    let mut rng = StdRng::seed_from_u64(shape.seed);
    let kind = if shape.directed {
        GraphKind::Directed
    } else {
        GraphKind::Undirected
    };
    let alphabet = shape.labels.max(1);
    let density = shape.density.clamp(0.0, 1.0);
    let noise = shape.noise.clamp(0.0, 1.0);

    let n = shape.world_size;
    let world_labels: Vec<String> = (0..n).map(|_| label(rng.gen_range(0..alphabet))).collect();
    let mut world_edges = Vec::new();
    for u in 0..n {
        let first = if shape.directed { 0 } else { u + 1 };
        for v in first..n {
            if u != v && rng.gen_bool(density) {
                world_edges.push((u, v));
            }
        }
    }

    let planted = index::sample(&mut rng, n, shape.pattern_size.min(n)).into_vec();
    let position = |k: usize| planted.iter().position(|&p| p == k);
    let pattern_labels: Vec<String> = planted
        .iter()
        .map(|&k| {
            if rng.gen_bool(noise) {
                label(rng.gen_range(0..alphabet))
            } else {
                world_labels[k].clone()
            }
        })
        .collect();
    let pattern_edges: Vec<(usize, usize)> = world_edges
        .iter()
        .filter_map(|&(k, l)| Some((position(k)?, position(l)?)))
        .collect();
    tracing::debug!(
        "generated world with {} edges, pattern with {} edges (seed {})",
        world_edges.len(),
        pattern_edges.len(),
        shape.seed
    );

    Ok(Pair {
        pattern: Graph::from_labels("pattern", kind, &as_str(&pattern_labels), &pattern_edges)?,
        world: Graph::from_labels("world", kind, &as_str(&world_labels), &world_edges)?,
        planted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemip_graph::GraphElement;

    fn shape(seed: u64, directed: bool) -> PairShape {
        PairShape {
            pattern_size: 3,
            world_size: 7,
            density: 0.5,
            labels: 3,
            noise: 0.0,
            directed,
            seed,
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = pair(&shape(11, true)).expect("pair");
        let b = pair(&shape(11, true)).expect("pair");
        assert_eq!(a.planted, b.planted);
        assert_eq!(a.world.edges(), b.world.edges());
        assert_eq!(a.pattern.edges(), b.pattern.edges());
    }

    #[test]
    fn test_planted_embedding_preserves_edges() {
        for seed in 0..20 {
            for directed in [false, true] {
                let p = pair(&shape(seed, directed)).expect("pair");
                assert_eq!(p.pattern.vertex_count(), 3);
                for edge in p.pattern.edges() {
                    let (i, j) = edge.endpoints();
                    assert!(p.world.has_edge(p.planted[i], p.planted[j]), "seed {seed}");
                }
                for (i, &k) in p.planted.iter().enumerate() {
                    assert!(p.pattern.vertices()[i]
                        .weight()
                        .same_label(p.world.vertices()[k].weight()));
                }
            }
        }
    }

    #[test]
    fn test_oversized_pattern_is_truncated() {
        let p = pair(&PairShape {
            pattern_size: 10,
            ..shape(1, false)
        })
        .expect("pair");
        assert_eq!(p.pattern.vertex_count(), p.world.vertex_count());
    }
}
