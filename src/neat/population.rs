use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::genome::{self, Genome};
use super::organism::{Organism, OrganismIndex, Organisms};
use super::settings::Settings;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Species {
    pub id: usize,
    pub members: Vec<OrganismIndex>,
    pub representative: Genome,
    pub champion: OrganismIndex,
    pub avg_fitness: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Population {
    pub species: Vec<Species>,
    pub organisms: Organisms,
    pub species_distance_threshold: f64,
    pub generation: usize,
    pub next_species_id: usize,
    pub next_organism_id: usize,
}

impl Population {
    fn assign_species(&mut self, settings: &Settings, organism_index: OrganismIndex) {
        let organism = &self.organisms[organism_index];

        let species_index = self.species.iter().position(|species| {
            organism.genome.distance(
                &species.representative,
                settings.excess_coefficient,
                settings.disjoint_coefficient,
                settings.weight_coefficient,
            ) < self.species_distance_threshold
        });

        match species_index {
            Some(index) => {
                self.species[index].members.push(organism_index);
            }
            None => {
                let new_species = Species {
                    members: vec![organism_index],
                    representative: organism.genome.clone(),
                    champion: organism_index,
                    avg_fitness: 0.0,
                    id: self.next_species_id,
                };
                self.next_species_id += 1;
                self.species.push(new_species);
            }
        }
    }

    /// Groups organisms by compatibility distance, nudging the threshold until the species
    /// count falls within the configured bounds (or the retry budget runs out).
    fn speciate<R: RngCore>(&mut self, rng: &mut R, settings: &Settings) {
        let max_loops = 15;
        self.organisms.shuffle(rng);
        for _ in 0..max_loops {
            for s in self.species.iter_mut() {
                s.members.clear();
            }

            for i in 0..self.organisms.len() {
                self.assign_species(settings, OrganismIndex(i));
            }

            let n_non_empty_species = self.species.iter().filter(|s| !s.members.is_empty()).count();
            if n_non_empty_species < settings.n_species_min {
                self.species_distance_threshold *= 0.94;
                tracing::debug!(generation = self.generation, species = n_non_empty_species, threshold = self.species_distance_threshold, "reducing species distance threshold");
            } else if n_non_empty_species > settings.n_species_max {
                self.species_distance_threshold *= 1.05;
                tracing::debug!(generation = self.generation, species = n_non_empty_species, threshold = self.species_distance_threshold, "increasing species distance threshold");
            } else {
                break;
            }
        }

        self.species.retain(|s| !s.members.is_empty());
        for s in self.species.iter_mut() {
            s.champion = s.members[0];
            s.representative = self.organisms[s.members[0]].genome.clone();
        }
    }

    pub fn init<R: RngCore>(rng: &mut R, settings: &Settings) -> Population {
        let organisms = (0..settings.n_organisms)
            .map(|id| Organism::init(rng, id, settings.n_sensor_nodes, settings.n_output_nodes))
            .collect();

        let mut res = Population {
            species: Vec::new(),
            organisms: Organisms::new(organisms),
            species_distance_threshold: settings.initial_distance_threshold,
            generation: 0,
            next_species_id: 0,
            next_organism_id: settings.n_organisms,
        };

        res.speciate(rng, settings);
        tracing::debug!(organisms = res.organisms.len(), species = res.species.len(), "population initialized");
        res
    }

    pub fn organisms_mut(&mut self) -> &mut [Organism] {
        self.organisms.as_mut_slice()
    }

    /// Records each species' best member and mean fitness. Call after every evaluation.
    pub fn set_champions(&mut self) {
        for s in self.species.iter_mut() {
            let mut total_species_fitness = 0.0;
            let mut champion = s.members[0];
            for &org_index in &s.members {
                let org = &self.organisms[org_index];
                total_species_fitness += org.fitness;
                if org.fitness > self.organisms[champion].fitness {
                    champion = org_index;
                }
            }

            s.champion = champion;
            s.avg_fitness = total_species_fitness / (s.members.len() as f64);
        }
    }

    pub fn champion(&self) -> Option<&Organism> {
        self.organisms.iter().max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    pub fn mean_fitness(&self) -> f64 {
        if self.organisms.is_empty() {
            return 0.0;
        }
        self.organisms.iter().map(|o| o.fitness).sum::<f64>() / self.organisms.len() as f64
    }

    /// Breeds the next generation. Offspring are shared out in proportion to species mean
    /// fitness; each species breeds from its best members on its own seeded RNG and keeps
    /// its champion unchanged.
    pub fn next_generation<R: Rng>(&mut self, rng: &mut R, settings: &Settings) {
        self.generation += 1;

        let total_avg_fitness: f64 = self.species.iter().map(|s| s.avg_fitness.max(0.0)).sum();
        let offspring_per_species: Vec<usize> =
            if total_avg_fitness > 0.0 {
                self.species
                    .iter()
                    .map(|s| (s.avg_fitness.max(0.0) / total_avg_fitness * settings.n_organisms as f64).round() as usize)
                    .collect()
            } else {
                let n = (settings.n_organisms / self.species.len().max(1)).max(1);
                vec![n; self.species.len()]
            };

        let seeds: Vec<u64> = (0..self.species.len()).map(|_| rng.gen()).collect();

        let organisms = &self.organisms;
        let offspring: Vec<Vec<Genome>> = self
            .species
            .par_iter_mut()
            .zip(seeds.par_iter())
            .zip(offspring_per_species.par_iter())
            .map(|((s, &seed), &n_offspring)| {
                let mut local_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                let mut local_new_population = Vec::with_capacity(n_offspring + 1);
                if n_offspring == 0 {
                    return local_new_population;
                }

                s.members.sort_by(|&a, &b| organisms[b].fitness.total_cmp(&organisms[a].fitness));
                let n_members = s.members.len();
                let n_breeders = ((n_members as f64 * settings.breeding_fraction).ceil() as usize).clamp(1, n_members);

                local_new_population.push(organisms[s.champion].genome.clone());
                for _ in 0..n_offspring {
                    let parent_1 = &organisms[s.members[local_rng.gen_range(0..n_breeders)]];
                    let parent_2 = &organisms[s.members[local_rng.gen_range(0..n_breeders)]];
                    let mut child_genome = genome::cross_over(&mut local_rng, &parent_1.genome, parent_1.fitness, &parent_2.genome, parent_2.fitness);
                    child_genome.mutate(&mut local_rng, settings);
                    local_new_population.push(child_genome);
                }
                local_new_population
            })
            .collect();

        let mut new_population = Vec::with_capacity(settings.n_organisms + settings.n_species_max);
        for genome in offspring.into_iter().flatten() {
            new_population.push(Organism::create_from_genome(self.next_organism_id, genome));
            self.next_organism_id += 1;
        }

        self.organisms = Organisms::new(new_population);
        self.speciate(rng, settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn settings() -> Settings {
        let mut settings = Settings::standard(3, 2);
        settings.n_organisms = 40;
        settings.n_species_min = 2;
        settings.n_species_max = 6;
        settings
    }

    fn score_by_weights(population: &mut Population) {
        for organism in population.organisms_mut() {
            organism.fitness = organism.genome.iter().map(|(_, g)| g.weight.max(0.0)).sum();
        }
        population.set_champions();
    }

    #[test]
    fn test_init() {
        let settings = settings();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let population = Population::init(&mut rng, &settings);
        assert_eq!(population.organisms.len(), settings.n_organisms);
        let members: usize = population.species.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, settings.n_organisms);
    }

    #[test]
    fn champion_is_the_fittest_member() {
        let settings = settings();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut population = Population::init(&mut rng, &settings);
        score_by_weights(&mut population);
        for s in &population.species {
            let best = s.members.iter().map(|&i| population.organisms[i].fitness).fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(population.organisms[s.champion].fitness, best);
        }
    }

    #[test]
    fn next_generation_keeps_population_alive() {
        let settings = settings();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut population = Population::init(&mut rng, &settings);
        for _ in 0..3 {
            score_by_weights(&mut population);
            population.next_generation(&mut rng, &settings);
        }
        assert_eq!(population.generation, 3);
        assert!(population.organisms.len() >= settings.n_organisms / 2);
        assert!(!population.species.is_empty());
    }

    #[test]
    fn breeding_is_reproducible() {
        let settings = settings();
        let run = || {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
            let mut population = Population::init(&mut rng, &settings);
            score_by_weights(&mut population);
            population.next_generation(&mut rng, &settings);
            serde_json::to_string(&population.organisms).unwrap()
        };
        assert_eq!(run(), run());
    }
}
