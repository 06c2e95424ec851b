pub mod chart;
pub mod strategy;
