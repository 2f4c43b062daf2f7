pub mod compose;
pub mod filter_graph;
pub mod normalize;
pub mod page;
pub mod process;
