//! Graph colouring with a soft criterion.
//!
//! Adjacent nodes must differ in colour (hard). The [`ColorIndex`]
//! criterion charges each node its colour index, so optimising moves the
//! colouring towards low colours.

use ifs_core::{
    Assignment, BinaryConstraint, ConflictSet, Criterion, Model, ModelBuilder, ValueId, VariableId,
};

/// Charges every assigned node its colour index.
#[derive(Debug, Default)]
pub struct ColorIndex;

impl Criterion<u32> for ColorIndex {
    fn name(&self) -> &str {
        "Color index"
    }

    fn value(
        &self,
        model: &Model<u32>,
        _assignment: &Assignment,
        value: ValueId,
        _conflicts: Option<&ConflictSet>,
    ) -> f64 {
        f64::from(*model.value(value).data())
    }
}

/// Builds a colouring model over `nodes` nodes, `colors` colours and the
/// given undirected `edges`.
///
/// # Panics
///
/// Panics if an edge references a node outside `0..nodes`.
pub fn coloring_model(nodes: usize, colors: u32, edges: &[(usize, usize)]) -> Model<u32> {
    let mut builder = ModelBuilder::new();
    let vars: Vec<VariableId> = (0..nodes)
        .map(|n| builder.add_variable(format!("N{n}"), 0..colors))
        .collect();
    for &(u, v) in edges {
        builder.add_constraint(BinaryConstraint::new(
            format!("N{u}-N{v}"),
            vars[u],
            vars[v],
            |a: &u32, b: &u32| a != b,
        ));
    }
    builder.add_criterion(ColorIndex);
    builder.build().expect("coloring model is valid")
}

/// A cycle over `n` nodes: `0-1, 1-2, ..., (n-1)-0`.
pub fn cycle_edges(n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (i, (i + 1) % n)).collect()
}
