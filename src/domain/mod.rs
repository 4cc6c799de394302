// Domain layer: question bank models and the store ports.

pub mod model;
pub mod ports;
