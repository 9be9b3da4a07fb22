//! Routing paths over the compatibility graph.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use super::component::ComponentInstance;

/// An ordered chain of components leading from one capability to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPath {
    pub components: Vec<String>,
    /// Sum of the members' average latencies (ms)
    pub total_latency: f64,
    /// Product of the members' success rates
    pub success_probability: f64,
}

impl ComponentPath {
    /// Build a path from member ids, reading metrics from the component map.
    pub(crate) fn from_ids(ids: Vec<String>, components: &HashMap<String, ComponentInstance>) -> Self {
        let (total_latency, success_probability) =
            ids.iter()
                .filter_map(|id| components.get(id))
                .fold((0.0, 1.0), |(lat, prob), c| {
                    (
                        lat + c.metadata.metrics.average_latency,
                        prob * c.metadata.metrics.success_rate,
                    )
                });
        Self {
            components: ids,
            total_latency,
            success_probability,
        }
    }

    /// Cache key for a capability pair.
    pub fn cache_key(input: &str, output: &str) -> String {
        format!("{}->{}", input, output)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.iter().any(|c| c == id)
    }

    pub fn hops(&self) -> usize {
        self.components.len()
    }
}

/// Frontier entry ordered so that `BinaryHeap` pops the cheapest first.
#[derive(Debug)]
struct Candidate {
    cost: f64,
    hops: usize,
    id: String,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Lowest-latency path from any source to any component satisfying `is_target`.
///
/// Node weights are component latencies. Only ready components are traversed,
/// and every component is expanded at most once: the `visited` set is what
/// keeps compatibility cycles from looping.
pub(crate) fn lowest_latency_path<F>(
    components: &HashMap<String, ComponentInstance>,
    edges: &HashMap<String, BTreeSet<String>>,
    sources: &[String],
    is_target: F,
) -> Option<ComponentPath>
where
    F: Fn(&ComponentInstance) -> bool,
{
    let latency = |id: &str| {
        components
            .get(id)
            .filter(|c| c.status.is_ready())
            .map(|c| c.metadata.metrics.average_latency.max(0.0))
    };

    let mut best: HashMap<String, f64> = HashMap::new();
    let mut previous: HashMap<String, String> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = BinaryHeap::new();

    for source in sources {
        if let Some(cost) = latency(source) {
            best.insert(source.clone(), cost);
            frontier.push(Candidate {
                cost,
                hops: 1,
                id: source.clone(),
            });
        }
    }

    while let Some(Candidate { cost, hops, id }) = frontier.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }

        let Some(component) = components.get(&id) else {
            continue;
        };
        if is_target(component) {
            return Some(ComponentPath::from_ids(
                reconstruct(&previous, &id),
                components,
            ));
        }

        let Some(neighbors) = edges.get(&id) else {
            continue;
        };
        for next in neighbors {
            if visited.contains(next) {
                continue;
            }
            let Some(step) = latency(next) else {
                continue;
            };
            let next_cost = cost + step;
            if best.get(next).is_none_or(|known| next_cost < *known) {
                best.insert(next.clone(), next_cost);
                previous.insert(next.clone(), id.clone());
                frontier.push(Candidate {
                    cost: next_cost,
                    hops: hops + 1,
                    id: next.clone(),
                });
            }
        }
    }

    None
}

fn reconstruct(previous: &HashMap<String, String>, end: &str) -> Vec<String> {
    let mut ids = vec![end.to_string()];
    let mut current = end;
    while let Some(prev) = previous.get(current) {
        ids.push(prev.clone());
        current = prev;
    }
    ids.reverse();
    ids
}
