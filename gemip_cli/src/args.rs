use std::path::PathBuf;

use clap::Parser;
use gemip_common::{Config, ConfigError, CutMethod};
use gemip_formulation::FormulationKind;

use crate::generate::PairShape;

/// GEMIP graph matcher - match a random pattern into a random world graph
#[derive(Parser, Debug)]
#[command(name = "gemip")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Formulations to run, comma separated (names or unique prefixes)
    #[arg(
        short = 'F',
        long = "formulation",
        value_delimiter = ',',
        default_value = "exact,errortol,bipartite"
    )]
    pub formulations: Vec<FormulationKind>,

    /// JSON configuration file; flags below override its values
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print the known formulations and backends, then exit
    #[arg(long, default_value_t = false)]
    pub list: bool,

    /// Print the solutions as JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Number of pattern vertices
    #[arg(short = 'p', long, default_value_t = 3)]
    pub pattern_size: usize,
    /// Number of world vertices
    #[arg(short = 'w', long, default_value_t = 6)]
    pub world_size: usize,
    /// Probability of each possible world edge
    #[arg(long, default_value_t = 0.4)]
    pub density: f64,
    /// Size of the label alphabet
    #[arg(long, default_value_t = 2)]
    pub labels: usize,
    /// Probability of relabeling a pattern vertex after sampling it
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,
    /// Generate directed graphs
    #[arg(short = 'd', long, default_value_t = false)]
    pub directed: bool,
    /// Random seed
    #[arg(short = 's', long, default_value_t = 7)]
    pub seed: u64,

    /// Substitution cost between differently labeled elements
    #[arg(long, default_value_t = 1.0)]
    pub mismatch: f64,
    /// Deletion and insertion cost of every element
    #[arg(long, default_value_t = 1.0)]
    pub creation_cost: f64,

    /// Solver backend
    #[arg(short = 'b', long)]
    pub backend: Option<String>,
    /// Time limit per solve, in seconds
    #[arg(short = 't', long)]
    pub time_limit: Option<f64>,
    /// Ranked solutions per formulation
    #[arg(short = 'n', long)]
    pub solutions: Option<usize>,
    /// Cut used between ranked solutions
    #[arg(long, value_enum)]
    pub cut: Option<CutArg>,
    /// Require induced matchings
    #[arg(long, default_value_t = false)]
    pub induced: bool,
    /// Share of cheapest vertex candidates kept
    #[arg(long)]
    pub upper_bound: Option<f64>,
    /// Matcher pool threads, 0 for one per core
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl Args {
    /// Convert command-line arguments into internal configuration
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };
        if let Some(backend) = &self.backend {
            config.solver.backend.clone_from(backend);
        }
        if let Some(secs) = self.time_limit {
            config.solver.time_limit_secs = Some(secs);
        }
        if let Some(count) = self.solutions {
            config.enumeration.solutions = count;
        }
        if let Some(cut) = self.cut {
            config.enumeration.cut = cut.into();
        }
        if self.induced {
            config.formulation.induced = true;
        }
        if let Some(up) = self.upper_bound {
            config.formulation.upper_bound = up;
        }
        if let Some(threads) = self.threads {
            config.pool.threads = threads;
        }
        config.validate()?;
        Ok(config)
    }

    pub const fn pair_shape(&self) -> PairShape {
        PairShape {
            pattern_size: self.pattern_size,
            world_size: self.world_size,
            density: self.density,
            labels: self.labels,
            noise: self.noise,
            directed: self.directed,
            seed: self.seed,
        }
    }
}

/// Command-line argument wrapper for CutMethod
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CutArg {
    /// Exclude the exact mapping
    #[value(name = "solution")]
    Solution,
    /// Exclude every chosen vertex pair
    #[value(name = "matchings")]
    Matchings,
    /// Exclude every used world vertex
    #[value(name = "elements")]
    Elements,
}

impl From<CutArg> for CutMethod {
    fn from(arg: CutArg) -> Self {
        match arg {
            CutArg::Solution => CutMethod::Solution,
            CutArg::Matchings => CutMethod::Matchings,
            CutArg::Elements => CutMethod::Elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["gemip"]).expect("defaults parse");
        assert_eq!(
            args.formulations,
            vec![
                FormulationKind::Exact,
                FormulationKind::ErrorTolerant,
                FormulationKind::BipartiteGraphMatching
            ]
        );
        assert_eq!(args.to_config().expect("valid"), Config::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "gemip", "-F", "linear,quad", "-n", "3", "--cut", "elements", "--induced", "-j", "2",
        ])
        .expect("parse");
        assert_eq!(
            args.formulations,
            vec![
                FormulationKind::LinearGraphEditDistance,
                FormulationKind::QuadraticGraphEditDistance
            ]
        );
        let config = args.to_config().expect("valid");
        assert_eq!(config.enumeration.solutions, 3);
        assert_eq!(config.enumeration.cut, CutMethod::Elements);
        assert!(config.formulation.induced);
        assert_eq!(config.pool.threads, 2);
    }

    #[rstest]
    #[case::unknown_formulation(&["gemip", "-F", "nope"])]
    #[case::ambiguous_prefix(&["gemip", "-F", "sub"])]
    #[case::bad_cut(&["gemip", "--cut", "all"])]
    fn test_rejects_arguments(#[case] argv: &[&str]) {
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[rstest]
    #[case::zero_solutions(&["gemip", "-n", "0"])]
    #[case::upper_bound(&["gemip", "--upper-bound", "1.5"])]
    fn test_rejects_config(#[case] argv: &[&str]) {
        let args = Args::try_parse_from(argv).expect("parse");
        assert!(matches!(args.to_config(), Err(ConfigError::Invalid { .. })));
    }
}
