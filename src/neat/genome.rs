use indexmap::IndexMap;
use itertools::{EitherOrBoth, Itertools};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal, Uniform};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use super::settings::Settings;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

#[derive(PartialEq, PartialOrd, Clone, Copy, Debug)]
pub struct GeneIndex(pub usize);

#[derive(PartialEq, PartialOrd, Ord, Clone, Copy, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn inc(self) -> NodeId {
        NodeId(self.0 + 1)
    }
}

/// Genes are identified by the pair of nodes they connect, ordered by input node first.
#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug)]
pub struct GeneKey {
    pub in_node_id: NodeId,
    pub out_node_id: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneValue {
    pub weight: f64,
    pub enabled: bool,
}

impl GeneValue {
    pub fn create(weight: f64, enabled: bool) -> GeneValue {
        GeneValue { weight, enabled }
    }
}

pub type Gene = (GeneKey, GeneValue);

pub trait GeneExt {
    fn create(in_node_id: usize, out_node_id: usize, weight: f64, enabled: bool) -> Self;
}

impl GeneExt for Gene {
    fn create(in_node_id: usize, out_node_id: usize, weight: f64, enabled: bool) -> Gene {
        (
            GeneKey { in_node_id: NodeId(in_node_id), out_node_id: NodeId(out_node_id) },
            GeneValue::create(weight, enabled),
        )
    }
}

/// Connection genes, always sorted by key. Node ids `0..n_sensor_nodes` are sensors, the
/// next `n_output_nodes` ids are outputs and everything above is hidden.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "GenomeRecord", into = "GenomeRecord")]
pub struct Genome {
    data: FxIndexMap<GeneKey, GeneValue>,
    next_node_id: NodeId,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
}

impl Genome {
    pub fn iter(&self) -> indexmap::map::Iter<GeneKey, GeneValue> {
        self.data.iter()
    }

    pub fn create(genes: Vec<Gene>, n_sensor_nodes: usize, n_output_nodes: usize) -> Genome {
        let max_node_id = genes
            .iter()
            .map(|(key, _)| key.in_node_id.max(key.out_node_id))
            .max()
            .unwrap_or(NodeId(0));
        let first_hidden = NodeId(n_sensor_nodes + n_output_nodes);
        let data = genes.into_iter().sorted_by_key(|x| x.0).collect();
        let next_node_id = max_node_id.inc().max(first_hidden);
        Genome { data, next_node_id, n_sensor_nodes, n_output_nodes }
    }

    /// Every sensor wired straight to every output with a uniform weight in `[-1, 1)`.
    pub fn init<R: RngCore>(rng: &mut R, n_sensor_nodes: usize, n_output_nodes: usize) -> Genome {
        let between = Uniform::from(-1.0..1.0);

        let n_connections = n_sensor_nodes * n_output_nodes;
        let mut data = IndexMap::with_capacity_and_hasher(n_connections, FxBuildHasher);

        for in_node_id in 0..n_sensor_nodes {
            for out_node_ind in 0..n_output_nodes {
                let out_node_id = out_node_ind + n_sensor_nodes;
                let (gene_key, gene_val) = Gene::create(in_node_id, out_node_id, between.sample(rng), true);
                data.insert(gene_key, gene_val);
            }
        }

        let next_node_id = NodeId(n_sensor_nodes + n_output_nodes);
        Genome { data, next_node_id, n_sensor_nodes, n_output_nodes }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    pub fn get(&self, key: &GeneKey) -> Option<&GeneValue> {
        self.data.get(key)
    }

    pub fn get_index(&self, index: GeneIndex) -> Option<(&GeneKey, &GeneValue)> {
        self.data.get_index(index.0)
    }

    pub fn add_connection(&mut self, in_node_id: NodeId, out_node_id: NodeId, weight: f64) {
        debug_assert!(in_node_id != out_node_id, "Tried to add a connection where input is the same node as output");
        debug_assert!(in_node_id < self.next_node_id, "Tried to add a connection with an input node that does not exist");
        debug_assert!(out_node_id < self.next_node_id, "Tried to add a connection with an output node that does not exist");
        debug_assert!(out_node_id.0 >= self.n_sensor_nodes, "Tried to add a connection with an output node that is a sensor node");

        let gene_key = GeneKey { in_node_id, out_node_id };
        let insertion_result = self.data.insert(gene_key, GeneValue::create(weight, true));
        debug_assert!(insertion_result.is_none(), "Tried to add a connection that already exists");
        self.data.sort_keys();
    }

    /// Splits an enabled connection with a new hidden node. The incoming half gets weight 1,
    /// the outgoing half keeps the old weight.
    pub fn add_node(&mut self, existing_conn_index: GeneIndex) {
        let Some((&gene_key, gene_val)) = self.data.get_index_mut(existing_conn_index.0) else {
            return;
        };
        if !gene_val.enabled {
            return;
        }
        gene_val.enabled = false;
        let weight = gene_val.weight;

        let new_node_id = self.next_node_id;
        self.next_node_id = self.next_node_id.inc();
        self.add_connection(gene_key.in_node_id, new_node_id, 1.);
        self.add_connection(new_node_id, gene_key.out_node_id, weight);
    }

    /// Compatibility distance: excess and disjoint gene counts plus total weight difference
    /// of matching genes, each normalised by the larger genome size.
    pub fn distance(&self, other: &Genome, excess_coef: f64, disjoint_coef: f64, weight_diff_coef: f64) -> f64 {
        #[derive(PartialEq)]
        enum ExcessSide {
            Left,
            Right,
            Neither,
        }

        let mut total_weight_diff = 0.;
        let mut excess_side = ExcessSide::Neither;
        let mut excess_count = 0;
        let mut disjoint_count = 0;

        for pair in self.data.iter().merge_join_by(other.data.iter(), |a, b| a.0.cmp(b.0)) {
            match pair {
                EitherOrBoth::Both((_, left), (_, right)) => {
                    excess_side = ExcessSide::Neither;
                    disjoint_count += excess_count;
                    excess_count = 0;
                    total_weight_diff += (left.weight - right.weight).abs();
                }
                EitherOrBoth::Left(_) | EitherOrBoth::Right(_) => {
                    let side = if pair.is_left() { ExcessSide::Left } else { ExcessSide::Right };
                    if side == excess_side {
                        excess_count += 1;
                    } else {
                        disjoint_count += excess_count;
                        excess_count = 1;
                        excess_side = side;
                    }
                }
            }
        }

        let n = self.len().max(other.len()).max(1) as f64;
        let excess_term = excess_coef * (excess_count as f64) / n;
        let disjoint_term = disjoint_coef * (disjoint_count as f64) / n;
        let weight_term = weight_diff_coef * total_weight_diff / n;
        excess_term + disjoint_term + weight_term
    }

    pub fn mutate<R: RngCore>(&mut self, rng: &mut R, settings: &Settings) {
        let between = Uniform::from(0.0..1.0);
        self.mutate_add_connection(rng, &between, settings);
        self.mutate_add_node(rng, &between, settings);
        self.mutate_weight(rng, &between, settings);
        self.mutate_toggle_connection(rng, &between, settings);
    }

    fn mutate_add_connection<R: RngCore>(&mut self, rng: &mut R, between: &Uniform<f64>, settings: &Settings) {
        let r = between.sample(rng);
        if r < settings.mutate_add_connection_rate {
            let in_node_id = NodeId(rng.gen_range(0..self.next_node_id.0));
            let out_node_id = NodeId(rng.gen_range(self.n_sensor_nodes..self.next_node_id.0));
            if in_node_id != out_node_id {
                let gene_key = GeneKey { in_node_id, out_node_id };
                if !self.data.contains_key(&gene_key) {
                    self.add_connection(in_node_id, out_node_id, rng.gen_range(-1.0..1.0));
                }
            }
        }
    }

    fn mutate_add_node<R: RngCore>(&mut self, rng: &mut R, between: &Uniform<f64>, settings: &Settings) {
        let r = between.sample(rng);
        if r < settings.mutate_add_node_rate && !self.is_empty() {
            let gene_index = GeneIndex(rng.gen_range(0..self.len()));
            self.add_node(gene_index);
        }
    }

    fn mutate_weight<R: RngCore>(&mut self, rng: &mut R, between: &Uniform<f64>, settings: &Settings) {
        let Ok(normal) = Normal::new(0., settings.mutate_weight_scale) else {
            return;
        };
        for (_, gene_value) in self.data.iter_mut() {
            let r = between.sample(rng);
            if r < settings.mutate_weight_rate {
                gene_value.weight += normal.sample(rng);
            }
        }
    }

    fn mutate_toggle_connection<R: RngCore>(&mut self, rng: &mut R, between: &Uniform<f64>, settings: &Settings) {
        let r = between.sample(rng);
        if r < settings.mutate_toggle_connection_rate && !self.is_empty() {
            let i = rng.gen_range(0..self.len());
            if let Some((_, gene_value)) = self.data.get_index_mut(i) {
                gene_value.enabled = !gene_value.enabled;
            }
        }
    }
}

/// Matching genes are inherited at random; disjoint and excess genes come from the fitter
/// parent, or from the first parent on a tie so that both halves of a split stay together.
pub fn cross_over<R: RngCore>(rng: &mut R, genome_1: &Genome, fitness_1: f64, genome_2: &Genome, fitness_2: f64) -> Genome {
    debug_assert!(genome_1.n_sensor_nodes == genome_2.n_sensor_nodes, "Genomes with mismatching input size cannot be crossed");
    debug_assert!(genome_1.n_output_nodes == genome_2.n_output_nodes, "Genomes with mismatching output size cannot be crossed");

    let data = genome_1
        .data
        .iter()
        .merge_join_by(genome_2.data.iter(), |a, b| a.0.cmp(b.0))
        .filter_map(|pair| match pair {
            EitherOrBoth::Both(left, right) => Some(if rng.gen_bool(0.5) { left } else { right }),
            EitherOrBoth::Left(left) if fitness_1 >= fitness_2 => Some(left),
            EitherOrBoth::Right(right) if fitness_2 > fitness_1 => Some(right),
            _ => None,
        })
        .map(|(key, value)| (*key, *value))
        .collect();

    Genome {
        data,
        next_node_id: genome_1.next_node_id.max(genome_2.next_node_id),
        n_sensor_nodes: genome_1.n_sensor_nodes,
        n_output_nodes: genome_1.n_output_nodes,
    }
}

#[derive(Serialize, Deserialize)]
struct GeneRecord {
    in_node: usize,
    out_node: usize,
    weight: f64,
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct GenomeRecord {
    n_sensor_nodes: usize,
    n_output_nodes: usize,
    next_node_id: usize,
    genes: Vec<GeneRecord>,
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> GenomeRecord {
        let genes = genome
            .iter()
            .map(|(key, value)| GeneRecord {
                in_node: key.in_node_id.0,
                out_node: key.out_node_id.0,
                weight: value.weight,
                enabled: value.enabled,
            })
            .collect();
        GenomeRecord {
            n_sensor_nodes: genome.n_sensor_nodes,
            n_output_nodes: genome.n_output_nodes,
            next_node_id: genome.next_node_id.0,
            genes,
        }
    }
}

impl From<GenomeRecord> for Genome {
    fn from(record: GenomeRecord) -> Genome {
        let genes = record
            .genes
            .into_iter()
            .map(|g| Gene::create(g.in_node, g.out_node, g.weight, g.enabled))
            .collect();
        let mut genome = Genome::create(genes, record.n_sensor_nodes, record.n_output_nodes);
        genome.next_node_id = genome.next_node_id.max(NodeId(record.next_node_id));
        genome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn genome_sample_1() -> Genome {
        Genome::create(
            vec![
                Gene::create(0, 3, 0.0, true),
                Gene::create(1, 3, 0.0, true),
                Gene::create(1, 4, 0.0, true),
                Gene::create(2, 4, 0.0, true),
                Gene::create(3, 4, 0.0, true),
            ],
            2,
            2,
        )
    }

    fn is_sorted(genome: &Genome) -> bool {
        genome.iter().tuple_windows().all(|(a, b)| a.0 < b.0)
    }

    #[test]
    fn test_genome_max_node_id() {
        let genome = genome_sample_1();
        assert_eq!(genome.next_node_id.0, 5);
    }

    #[test]
    fn test_genome_init() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let genome = Genome::init(&mut rng, 2, 2);
        assert_eq!(genome.next_node_id.0, 4);
        assert_eq!(genome.len(), 4);
        assert!(is_sorted(&genome));
    }

    #[test]
    fn test_genome_add_connection() {
        let mut genome = genome_sample_1();
        genome.add_connection(NodeId(0), NodeId(4), 0.0);
        assert_eq!(genome.len(), 6);
        assert!(is_sorted(&genome));
    }

    #[test]
    fn test_genome_add_node() {
        let mut genome = genome_sample_1();
        genome.add_node(GeneIndex(0));
        assert_eq!(genome.len(), 7);
        assert_eq!(genome.next_node_id, NodeId(6));
        let split = GeneKey { in_node_id: NodeId(0), out_node_id: NodeId(3) };
        assert!(!genome.get(&split).is_some_and(|g| g.enabled));
        assert!(is_sorted(&genome));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let genome = genome_sample_1();
        assert_approx_eq!(genome.distance(&genome, 1.0, 1.0, 0.4), 0.0);
    }

    #[test]
    fn distance_counts_excess_and_disjoint() {
        let a = genome_sample_1();
        let b = Genome::create(
            vec![
                Gene::create(0, 3, 1.0, true),
                Gene::create(0, 4, 0.0, true),
                Gene::create(1, 3, 0.0, true),
            ],
            2,
            2,
        );
        // matching: (0,3) diff 1 and (1,3); disjoint: (0,4); excess: (1,4) (2,4) (3,4)
        let d = a.distance(&b, 1.0, 2.0, 0.5);
        assert_approx_eq!(d, (3.0 + 2.0 * 1.0 + 0.5 * 1.0) / 5.0);
    }

    #[test]
    fn crossover_takes_structure_from_fitter_parent() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let small = Genome::create(vec![Gene::create(0, 3, 0.5, true)], 2, 2);
        let big = genome_sample_1();

        let child = cross_over(&mut rng, &small, 1.0, &big, 5.0);
        assert_eq!(child.len(), big.len());
        assert!(is_sorted(&child));

        let child = cross_over(&mut rng, &small, 5.0, &big, 1.0);
        assert_eq!(child.len(), 1);
    }

    #[test]
    fn mutation_keeps_genes_sorted() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut settings = Settings::standard(3, 2);
        settings.mutate_add_connection_rate = 0.5;
        settings.mutate_add_node_rate = 0.5;
        let mut genome = Genome::init(&mut rng, 3, 2);
        for _ in 0..50 {
            genome.mutate(&mut rng, &settings);
        }
        assert!(genome.len() > 6);
        assert!(is_sorted(&genome));
    }

    #[test]
    fn json_round_trip() {
        let mut genome = genome_sample_1();
        genome.add_node(GeneIndex(2));
        let json = serde_json::to_string(&genome).unwrap();
        let back: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.next_node_id(), genome.next_node_id());
        assert_eq!(back.iter().collect_vec(), genome.iter().collect_vec());
    }
}
