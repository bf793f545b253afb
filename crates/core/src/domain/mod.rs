pub mod contract;
pub mod history;
pub mod market;
pub mod recommendation;
