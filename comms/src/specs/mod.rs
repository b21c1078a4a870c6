pub mod graph;

pub use graph::{
    CompileSpec, ConvSpec, GraphSpec, InitializerSpec, LayerSpec, NameOr, OptimizerSpec,
    PoolingSpec,
};
