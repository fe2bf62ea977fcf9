pub mod core;
pub mod indices;
pub mod layer;
pub mod port;
pub mod route;
pub mod via;
