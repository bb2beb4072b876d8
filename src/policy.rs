use crate::evaluation::{Candidate, ControllerFactory};
use crate::neat::{Activation, Genome, Network, Organism};
use crate::snake::episode::Controller;
use crate::snake::geometry::Direction;

/// Index of the largest output. NaN and infinities never win; ties go to the lower index.
pub fn argmax(outputs: &[f64]) -> Option<usize> {
    outputs
        .iter()
        .enumerate()
        .map(|(i, &v)| (i, if v.is_finite() { v } else { f64::NEG_INFINITY }))
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Plays with a network: one output per direction in `Direction::ALL` order, highest wins.
pub struct NetworkPolicy {
    network: Network,
    forbid_reverse: bool,
}

impl NetworkPolicy {
    pub fn new(network: Network, forbid_reverse: bool) -> NetworkPolicy {
        NetworkPolicy { network, forbid_reverse }
    }
}

impl Controller for NetworkPolicy {
    fn choose(&mut self, observation: &[f64], heading: Direction) -> Direction {
        let mut outputs = self.network.activate(observation);
        if self.forbid_reverse {
            if let Some(i) = Direction::ALL.iter().position(|&d| d == heading.opposite()) {
                if let Some(v) = outputs.get_mut(i) {
                    *v = f64::NEG_INFINITY;
                }
            }
        }
        argmax(&outputs).and_then(Direction::from_usize).unwrap_or(heading)
    }

    fn reset(&mut self) {
        self.network.clear_values();
    }
}

#[derive(Clone, Debug)]
pub struct NetworkFactory {
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
    pub activation: Activation,
    pub forbid_reverse: bool,
}

impl ControllerFactory for NetworkFactory {
    type Genotype = Genome;
    type Controller = NetworkPolicy;

    fn input_count(&self) -> usize {
        self.n_sensor_nodes
    }

    fn output_count(&self) -> usize {
        self.n_output_nodes
    }

    fn build(&self, genotype: &Genome) -> NetworkPolicy {
        NetworkPolicy::new(Network::create_from_genome(genotype, self.activation), self.forbid_reverse)
    }
}

impl Candidate for Organism {
    type Genotype = Genome;

    fn id(&self) -> usize {
        self.id
    }

    fn genotype(&self) -> &Genome {
        &self.genome
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }
}
