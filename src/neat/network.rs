use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef, Reversed};
use petgraph::Direction;
use rustc_hash::FxHashMap;

use super::genome::{Genome, NodeId};
use super::settings::Activation;

#[derive(PartialEq, Default, Clone, Copy, Debug)]
pub enum NodeType {
    Sensor,
    #[default]
    Hidden,
    Output,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub value: f64,
    pub node_type: NodeType,
}

/// Phenotype of a genome. Nodes that cannot reach an output are never activated. Edges that
/// close a loop read the value their source had on the previous activation.
#[derive(Clone, Debug)]
pub struct Network {
    phenome: DiGraph<Node, f64>,
    sensor_nodes: Vec<NodeIndex>,
    output_nodes: Vec<NodeIndex>,
    activation_order: Vec<NodeIndex>,
    activation: Activation,
}

impl Network {
    pub fn create_from_genome(genome: &Genome, activation: Activation) -> Network {
        fn get_node_index(
            node_map: &mut FxHashMap<NodeId, NodeIndex>,
            phenome: &mut DiGraph<Node, f64>,
            n_sensor_nodes: usize,
            n_output_nodes: usize,
            id: NodeId,
        ) -> NodeIndex {
            *node_map.entry(id).or_insert_with(|| {
                let node_type =
                    if id.0 < n_sensor_nodes {
                        NodeType::Sensor
                    } else if id.0 < n_sensor_nodes + n_output_nodes {
                        NodeType::Output
                    } else {
                        NodeType::Hidden
                    };
                phenome.add_node(Node { id, value: 0., node_type })
            })
        }

        let (n_sensor_nodes, n_output_nodes) = (genome.n_sensor_nodes, genome.n_output_nodes);
        let mut phenome = DiGraph::with_capacity(genome.next_node_id().0, genome.len());
        let mut node_map = FxHashMap::default();
        let mut node = |phenome: &mut DiGraph<Node, f64>, id: usize| {
            get_node_index(&mut node_map, phenome, n_sensor_nodes, n_output_nodes, NodeId(id))
        };

        let sensor_nodes: Vec<_> = (0..n_sensor_nodes).map(|i| node(&mut phenome, i)).collect();
        let output_nodes: Vec<_> = (n_sensor_nodes..n_sensor_nodes + n_output_nodes).map(|i| node(&mut phenome, i)).collect();

        for (gene_key, gene_val) in genome.iter() {
            if gene_val.enabled {
                let in_node_index = node(&mut phenome, gene_key.in_node_id.0);
                let out_node_index = node(&mut phenome, gene_key.out_node_id.0);
                phenome.add_edge(in_node_index, out_node_index, gene_val.weight);
            }
        }

        // walking back from the outputs, post order puts every node after its inputs
        let reversed = Reversed(&phenome);
        let mut dfs = DfsPostOrder::empty(reversed);
        let mut activation_order = Vec::new();
        for &output in &output_nodes {
            dfs.move_to(output);
            while let Some(node_index) = dfs.next(reversed) {
                if phenome[node_index].node_type != NodeType::Sensor {
                    activation_order.push(node_index);
                }
            }
        }

        Network { phenome, sensor_nodes, output_nodes, activation_order, activation }
    }

    pub fn n_sensor_nodes(&self) -> usize {
        self.sensor_nodes.len()
    }

    pub fn n_output_nodes(&self) -> usize {
        self.output_nodes.len()
    }

    pub fn node_count(&self) -> usize {
        self.phenome.node_count()
    }

    pub fn n_active_nodes(&self) -> usize {
        self.activation_order.len()
    }

    pub fn activate(&mut self, sensor_values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(sensor_values.len(), self.sensor_nodes.len());

        for (&node_index, &input) in self.sensor_nodes.iter().zip(sensor_values) {
            self.phenome[node_index].value = input;
        }

        for &node_index in &self.activation_order {
            let active_sum: f64 = self
                .phenome
                .edges_directed(node_index, Direction::Incoming)
                .map(|edge| *edge.weight() * self.phenome[edge.source()].value)
                .sum();
            self.phenome[node_index].value = self.activation.apply(active_sum);
        }

        self.output_nodes.iter().map(|&node_index| self.phenome[node_index].value).collect()
    }

    pub fn clear_values(&mut self) {
        for node in self.phenome.node_weights_mut() {
            node.value = 0.;
        }
    }
}
