pub mod genome;
pub mod network;
pub mod organism;
pub mod population;
pub mod settings;

pub use genome::Genome;
pub use network::Network;
pub use organism::Organism;
pub use population::Population;
pub use settings::{Activation, Settings};
