// Domain layer: tender models and ports (interfaces).

pub mod model;
pub mod ports;
