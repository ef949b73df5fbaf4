// Pipeline processing: schema normalization, wage annualization, filtering,
// duplicate resolution and the reconciling join.

pub mod filter;
pub mod normalize;
pub mod reconcile;
pub mod resolve;
pub mod wage_unit;
