use std::ops::{Index, IndexMut};

use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};

use super::genome::Genome;
use super::network::Network;
use super::settings::Activation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganismIndex(pub usize);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organism {
    pub id: usize,
    pub genome: Genome,
    pub fitness: f64,
}

impl Organism {
    pub fn create_from_genome(id: usize, genome: Genome) -> Organism {
        Organism { id, genome, fitness: 0.0 }
    }

    pub fn init<R: RngCore>(rng: &mut R, id: usize, n_sensor_nodes: usize, n_output_nodes: usize) -> Organism {
        Self::create_from_genome(id, Genome::init(rng, n_sensor_nodes, n_output_nodes))
    }

    pub fn network(&self, activation: Activation) -> Network {
        Network::create_from_genome(&self.genome, activation)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Organisms(Vec<Organism>);

impl Organisms {
    pub fn new(data: Vec<Organism>) -> Organisms {
        Organisms(data)
    }

    pub fn push(&mut self, organism: Organism) {
        self.0.push(organism);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Organism> {
        self.0.iter()
    }

    pub fn as_mut_slice(&mut self) -> &mut [Organism] {
        &mut self.0
    }

    pub fn shuffle<R: RngCore>(&mut self, rng: &mut R) {
        self.0.shuffle(rng);
    }
}

impl Index<OrganismIndex> for Organisms {
    type Output = Organism;
    fn index(&self, index: OrganismIndex) -> &Self::Output {
        &self.0[index.0]
    }
}

impl IndexMut<OrganismIndex> for Organisms {
    fn index_mut(&mut self, index: OrganismIndex) -> &mut Self::Output {
        &mut self.0[index.0]
    }
}
