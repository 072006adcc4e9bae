//! Similarity graph construction and analysis. Kept as a plain
//! adjacency-list structure manipulated with `HashMap`/`HashSet` rather
//! than pulling in a graph crate, building and walking groupings by hand.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::Write as _;
use std::path::Path;

use ctk_error::CtkResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::metrics::SimilarityMetric;
use crate::similarity::compute_similarity_matrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLink {
    pub source: Uuid,
    pub target: Uuid,
    pub weight: f64,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationGraph {
    pub nodes: Vec<Uuid>,
    pub links: Vec<ConversationLink>,
    pub metadata: Value,
}

impl ConversationGraph {
    fn adjacency(&self) -> HashMap<Uuid, Vec<(Uuid, f64)>> {
        let mut adj: HashMap<Uuid, Vec<(Uuid, f64)>> = self.nodes.iter().map(|n| (*n, Vec::new())).collect();
        for link in &self.links {
            adj.entry(link.source).or_default().push((link.target, link.weight));
            adj.entry(link.target).or_default().push((link.source, link.weight));
        }
        adj
    }

    /// `{ nodes: [...], edges: [(source, target, weight)...] }` shape
    /// suitable for handing to a networkx-style consumer.
    pub fn to_networkx(&self) -> Value {
        json!({
            "nodes": self.nodes,
            "edges": self.links.iter().map(|l| json!({
                "source": l.source,
                "target": l.target,
                "weight": l.weight,
            })).collect::<Vec<_>>(),
        })
    }

    pub fn export_gephi(&self, path: &Path) -> CtkResult<()> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<gexf xmlns=\"http://www.gexf.net/1.2draft\" version=\"1.2\">\n");
        out.push_str("  <graph mode=\"static\" defaultedgetype=\"undirected\">\n");
        out.push_str("    <nodes>\n");
        for node in &self.nodes {
            out.push_str(&format!("      <node id=\"{node}\" label=\"{node}\" />\n"));
        }
        out.push_str("    </nodes>\n");
        out.push_str("    <edges>\n");
        for (idx, link) in self.links.iter().enumerate() {
            out.push_str(&format!(
                "      <edge id=\"{idx}\" source=\"{}\" target=\"{}\" weight=\"{}\" />\n",
                link.source, link.target, link.weight
            ));
        }
        out.push_str("    </edges>\n");
        out.push_str("  </graph>\n");
        out.push_str("</gexf>\n");

        let mut file = fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }

    pub fn export_cytoscape(&self, path: &Path) -> CtkResult<()> {
        let doc = json!({
            "elements": {
                "nodes": self.nodes.iter().map(|n| json!({"data": {"id": n}})).collect::<Vec<_>>(),
                "edges": self.links.iter().map(|l| json!({
                    "data": { "source": l.source, "target": l.target, "weight": l.weight }
                })).collect::<Vec<_>>(),
            }
        });
        fs::write(path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }

    /// Label propagation community detection: every node starts in its own
    /// label, then repeatedly adopts the majority label among neighbors
    /// (weighted by edge weight) until labels stop changing or a round
    /// cap is hit. Ties favor the numerically smallest label for
    /// determinism.
    pub fn label_propagation(&self) -> HashMap<Uuid, usize> {
        let adj = self.adjacency();
        let mut labels: HashMap<Uuid, usize> = self.nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        for _ in 0..100 {
            let mut changed = false;
            for node in &self.nodes {
                let neighbors = match adj.get(node) {
                    Some(n) if !n.is_empty() => n,
                    _ => continue,
                };
                let mut weight_by_label: HashMap<usize, f64> = HashMap::new();
                for (neighbor, weight) in neighbors {
                    let label = labels[neighbor];
                    *weight_by_label.entry(label).or_insert(0.0) += weight;
                }
                let best = weight_by_label
                    .into_iter()
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(b.0.cmp(&a.0)))
                    .map(|(label, _)| label);
                if let Some(best) = best {
                    if labels[node] != best {
                        labels.insert(*node, best);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        normalize_labels(labels, &self.nodes)
    }

    /// Greedy modularity maximization: starts with each node in its own
    /// community and repeatedly merges the pair of communities giving the
    /// largest modularity gain, until no merge improves modularity.
    pub fn greedy_modularity(&self) -> HashMap<Uuid, usize> {
        let total_weight: f64 = self.links.iter().map(|l| l.weight).sum();
        if total_weight <= 0.0 || self.nodes.is_empty() {
            return normalize_labels(self.nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect(), &self.nodes);
        }

        let degree: HashMap<Uuid, f64> = self
            .nodes
            .iter()
            .map(|n| {
                let d: f64 = self
                    .links
                    .iter()
                    .filter(|l| l.source == *n || l.target == *n)
                    .map(|l| l.weight)
                    .sum();
                (*n, d)
            })
            .collect();

        let mut community: HashMap<Uuid, usize> = self.nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        loop {
            let mut best_gain = 0.0;
            let mut best_pair: Option<(usize, usize)> = None;

            let communities: HashSet<usize> = community.values().copied().collect();
            let communities: Vec<usize> = {
                let mut v: Vec<usize> = communities.into_iter().collect();
                v.sort_unstable();
                v
            };

            for (i, &ci) in communities.iter().enumerate() {
                for &cj in &communities[i + 1..] {
                    let e_ij: f64 = self
                        .links
                        .iter()
                        .filter(|l| {
                            let (sc, tc) = (community[&l.source], community[&l.target]);
                            (sc == ci && tc == cj) || (sc == cj && tc == ci)
                        })
                        .map(|l| l.weight)
                        .sum();
                    if e_ij <= 0.0 {
                        continue;
                    }
                    let deg_i: f64 = community.iter().filter(|(_, &c)| c == ci).map(|(n, _)| degree[n]).sum();
                    let deg_j: f64 = community.iter().filter(|(_, &c)| c == cj).map(|(n, _)| degree[n]).sum();
                    let gain = e_ij / total_weight - (deg_i * deg_j) / (2.0 * total_weight * total_weight);
                    if gain > best_gain {
                        best_gain = gain;
                        best_pair = Some((ci, cj));
                    }
                }
            }

            match best_pair {
                Some((ci, cj)) => {
                    for label in community.values_mut() {
                        if *label == cj {
                            *label = ci;
                        }
                    }
                }
                None => break,
            }
        }

        normalize_labels(community, &self.nodes)
    }

    /// Top-`k` nodes by betweenness centrality (fraction of all-pairs
    /// shortest paths passing through the node), computed via unweighted
    /// BFS from every node — a direct Brandes-style count without the
    /// accumulator bookkeeping, adequate at conversation-graph scale.
    pub fn bridges(&self, top_k: usize) -> Vec<(Uuid, f64)> {
        let adj = self.adjacency();
        let mut betweenness: HashMap<Uuid, f64> = self.nodes.iter().map(|n| (*n, 0.0)).collect();

        for source in &self.nodes {
            let (dist, sigma, order) = bfs_shortest_paths(source, &adj);
            let mut delta: HashMap<Uuid, f64> = self.nodes.iter().map(|n| (*n, 0.0)).collect();

            for node in order.iter().rev() {
                if let Some(preds) = predecessors(node, &dist, &adj) {
                    for pred in preds {
                        let contrib = (sigma[&pred] / sigma[node]) * (1.0 + delta[node]);
                        *delta.get_mut(&pred).unwrap() += contrib;
                    }
                }
                if node != source {
                    *betweenness.get_mut(node).unwrap() += delta[node];
                }
            }
        }

        let mut ranked: Vec<(Uuid, f64)> = betweenness.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        ranked.truncate(top_k);
        ranked
    }

    /// `{ num_nodes, num_edges, density, avg_degree, most_connected[5] }`.
    pub fn summary(&self) -> Value {
        let n = self.nodes.len();
        let m = self.links.len();
        let density = if n > 1 { m as f64 / (n as f64 * (n as f64 - 1.0) / 2.0) } else { 0.0 };
        let avg_degree = if n > 0 { (2 * m) as f64 / n as f64 } else { 0.0 };

        let mut degree: HashMap<Uuid, usize> = self.nodes.iter().map(|n| (*n, 0)).collect();
        for link in &self.links {
            *degree.get_mut(&link.source).unwrap() += 1;
            *degree.get_mut(&link.target).unwrap() += 1;
        }
        let mut most_connected: Vec<(Uuid, usize)> = degree.into_iter().collect();
        most_connected.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        most_connected.truncate(5);

        json!({
            "num_nodes": n,
            "num_edges": m,
            "density": density,
            "avg_degree": avg_degree,
            "most_connected": most_connected.into_iter().map(|(id, deg)| json!({"id": id, "degree": deg})).collect::<Vec<_>>(),
        })
    }
}

fn normalize_labels(labels: HashMap<Uuid, usize>, nodes: &[Uuid]) -> HashMap<Uuid, usize> {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut out = HashMap::new();
    for node in nodes {
        let raw = labels[node];
        let next = remap.len();
        let mapped = *remap.entry(raw).or_insert(next);
        out.insert(*node, mapped);
    }
    out
}

fn bfs_shortest_paths(source: &Uuid, adj: &HashMap<Uuid, Vec<(Uuid, f64)>>) -> (HashMap<Uuid, i64>, HashMap<Uuid, f64>, Vec<Uuid>) {
    let mut dist: HashMap<Uuid, i64> = HashMap::new();
    let mut sigma: HashMap<Uuid, f64> = HashMap::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    dist.insert(*source, 0);
    sigma.insert(*source, 1.0);
    queue.push_back(*source);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        if let Some(neighbors) = adj.get(&node) {
            for (neighbor, _) in neighbors {
                if !dist.contains_key(neighbor) {
                    dist.insert(*neighbor, dist[&node] + 1);
                    queue.push_back(*neighbor);
                }
                if dist[neighbor] == dist[&node] + 1 {
                    *sigma.entry(*neighbor).or_insert(0.0) += sigma[&node];
                }
            }
        }
    }

    (dist, sigma, order)
}

fn predecessors(node: &Uuid, dist: &HashMap<Uuid, i64>, adj: &HashMap<Uuid, Vec<(Uuid, f64)>>) -> Option<Vec<Uuid>> {
    let d = *dist.get(node)?;
    let preds = adj
        .get(node)?
        .iter()
        .filter(|(neighbor, _)| dist.get(neighbor).map(|nd| *nd == d - 1).unwrap_or(false))
        .map(|(neighbor, _)| *neighbor)
        .collect();
    Some(preds)
}

/// Builds a threshold-filtered similarity graph over `items`, optionally
/// capping each node's degree via greedy descending-weight pruning.
pub fn build_graph(items: &[(Uuid, Vec<f32>)], metric: SimilarityMetric, threshold: f64, max_links_per_node: Option<usize>) -> ConversationGraph {
    let nodes: Vec<Uuid> = items.iter().map(|(id, _)| *id).collect();
    let matrix = compute_similarity_matrix(items, metric);

    let mut candidates: Vec<ConversationLink> = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let weight = matrix[i][j];
            if weight >= threshold {
                candidates.push(ConversationLink {
                    source: items[i].0,
                    target: items[j].0,
                    weight,
                    metadata: json!({}),
                });
            }
        }
    }

    let links = match max_links_per_node {
        Some(cap) => prune_by_degree_cap(candidates, cap),
        None => candidates,
    };

    ConversationGraph {
        metadata: json!({
            "threshold": threshold,
            "max_links_per_node": max_links_per_node,
            "total_nodes": nodes.len(),
            "total_links": links.len(),
        }),
        nodes,
        links,
    }
}

/// Greedy degree-capped pruning: process candidate links by descending
/// weight, keep a link iff both endpoints still have remaining capacity.
fn prune_by_degree_cap(mut candidates: Vec<ConversationLink>, cap: usize) -> Vec<ConversationLink> {
    candidates.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));

    let mut remaining: HashMap<Uuid, usize> = HashMap::new();
    let mut kept = Vec::new();
    for link in candidates {
        let source_cap = remaining.entry(link.source).or_insert(cap);
        if *source_cap == 0 {
            continue;
        }
        let target_cap = *remaining.entry(link.target).or_insert(cap);
        if target_cap == 0 {
            continue;
        }
        *remaining.get_mut(&link.source).unwrap() -= 1;
        *remaining.get_mut(&link.target).unwrap() -= 1;
        kept.push(link);
    }
    kept
}
