// Domain layer: expense models, CNPJ rules and ports. No I/O here.

pub mod cnpj;
pub mod model;
pub mod ports;
