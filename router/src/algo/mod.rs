pub mod astar;
pub mod simplify;
