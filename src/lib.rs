pub mod accumulator;
pub mod aggregate;
pub mod brain;
pub mod config;
pub mod error;
pub mod locations;
pub mod model;
pub mod profiling;
pub mod stats;

pub use accumulator::AccumulatorPair;
pub use aggregate::{aggregate, Aggregator};
pub use brain::{BrainInfo, BrainObject, Selector};
pub use config::{DiagonalPolicy, MatrixSpace, ModelConfig};
pub use error::{Result, SupereegError};
pub use locations::{Alignment, Location, LocationRegistry};
pub use model::{combine, CombineKind, Model, ModelInfo};
