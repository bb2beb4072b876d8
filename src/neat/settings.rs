use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Steepened sigmoid, `1 / (1 + e^(-4.9x))`.
    #[default]
    Sigmoid,
    Relu,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-4.9 * x).exp()),
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub n_organisms: usize,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    pub mutate_weight_rate: f64,
    pub mutate_weight_scale: f64,
    pub mutate_add_connection_rate: f64,
    pub mutate_add_node_rate: f64,
    pub mutate_toggle_connection_rate: f64,
    pub n_species_min: usize,
    pub n_species_max: usize,
    /// Share of each species (best first) allowed to breed.
    pub breeding_fraction: f64,
    pub initial_distance_threshold: f64,
    #[serde(default)]
    pub activation: Activation,
}

impl Settings {
    pub fn standard(n_sensor_nodes: usize, n_output_nodes: usize) -> Settings {
        Settings {
            n_organisms: 150,
            n_sensor_nodes,
            n_output_nodes,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
            mutate_weight_rate: 0.8,
            mutate_weight_scale: 0.1,
            mutate_add_connection_rate: 0.05,
            mutate_add_node_rate: 0.03,
            mutate_toggle_connection_rate: 0.01,
            n_species_min: 5,
            n_species_max: 15,
            breeding_fraction: 0.3,
            initial_distance_threshold: 1.5,
            activation: Activation::Sigmoid,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.n_organisms > 0, "population size must be positive");
        ensure!(self.n_sensor_nodes > 0, "a network needs at least one sensor");
        ensure!(self.n_species_min <= self.n_species_max, "n_species_min ({}) is above n_species_max ({})", self.n_species_min, self.n_species_max);
        ensure!(
            self.breeding_fraction > 0.0 && self.breeding_fraction <= 1.0,
            "breeding_fraction must be in (0, 1], got {}",
            self.breeding_fraction
        );
        ensure!(
            self.mutate_weight_scale.is_finite() && self.mutate_weight_scale >= 0.0,
            "mutate_weight_scale must be a non-negative number"
        );
        ensure!(self.initial_distance_threshold > 0.0, "initial_distance_threshold must be positive");
        Ok(())
    }
}
