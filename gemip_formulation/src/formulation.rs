use gemip_graph::{Graph, Weights};
use gemip_program::{Program, ProgramBuilder};

use crate::decoder::{CostModel, Decoder};
use crate::error::FormulationError;
use crate::kind::FormulationKind;
use crate::substrate::BipartiteEdges;

/// Turns a graph pair and its weights into a program plus the decoder that
/// reads the program's solutions back.
///
/// The decoder is only valid for the program built alongside it.
pub trait Formulation: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> FormulationKind;

    /// Builds the program for matching `source` into `target`.
    ///
    /// # Errors
    /// [`FormulationError`] when the request is structurally impossible or
    /// the generated program fails validation.
    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError>;
}

impl std::fmt::Debug for dyn Formulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formulation")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Checks shared by every formulation: matching orientation and weights that
/// fit the pair.
pub(crate) fn check_pair(
    source: &Graph,
    target: &Graph,
    weights: &Weights,
) -> Result<(), FormulationError> {
    if source.kind() != target.kind() {
        return Err(FormulationError::KindMismatch {
            pattern: source.kind(),
            world: target.kind(),
        });
    }
    weights.check_dimensions(source, target)?;
    Ok(())
}

/// Validates the program and pairs it with its decoder.
pub(crate) fn assemble(
    builder: ProgramBuilder,
    kind: FormulationKind,
    model: CostModel,
    x: &BipartiteEdges,
) -> Result<(Program, Decoder), FormulationError> {
    let program = builder.build()?;
    tracing::debug!(
        "{kind}: {} variables, {} constraints",
        program.variable_count(),
        program.constraint_count()
    );
    let decoder = Decoder::new(kind, model, program.variable_count(), x);
    Ok((program, decoder))
}
