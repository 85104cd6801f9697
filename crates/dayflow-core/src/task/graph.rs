//! Dependency graph over a user's open tasks.
//!
//! Edges come from explicit `depends_on` links: "A must complete or be
//! placed before B". `parent_task` is progress grouping and contributes no
//! edge. Kahn's algorithm yields a deterministic topological order; tasks
//! caught in a cycle are reported per connected component and excluded from
//! the run.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::task::{Priority, Task};

/// Outcome of ordering a task set.
#[derive(Debug, Clone)]
pub struct TopoResult {
    /// Task ids in dependency-consistent order, cycle members excluded
    pub order: Vec<String>,
    /// Cycle components, each a sorted list of member task ids
    pub cycles: Vec<Vec<String>>,
}

/// Sort key for tasks with no remaining predecessors.
///
/// Priority (High first), then deadline proximity (earlier first, none
/// last), then creation order, then id for full determinism.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ReadyKey {
    priority_rank: u8,
    deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    id: String,
}

impl ReadyKey {
    fn for_task(task: &Task) -> Self {
        Self {
            priority_rank: match task.priority {
                Priority::High => 0,
                Priority::Medium => 1,
                Priority::Low => 2,
            },
            deadline: task.kind.deadline().unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: task.created_at,
            id: task.id.clone(),
        }
    }
}

/// Dependency graph restricted to the tasks of one planning run.
///
/// Links to tasks outside the set (completed or unknown) are not edges;
/// whether such predecessors actually satisfy the gate is the scheduler's
/// concern.
pub struct DependencyGraph {
    /// predecessor id -> successor ids
    successors: HashMap<String, Vec<String>>,
    /// task id -> unresolved predecessor count
    in_degree: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build the graph from the run's task set.
    pub fn build(tasks: &[Task]) -> Self {
        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let mut successors: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();

        for task in tasks {
            in_degree.entry(task.id.clone()).or_insert(0);
            for dep in &task.depends_on {
                if dep == &task.id || !ids.contains(dep.as_str()) {
                    continue;
                }
                successors
                    .entry(dep.clone())
                    .or_default()
                    .push(task.id.clone());
                *in_degree.entry(task.id.clone()).or_insert(0) += 1;
            }
        }

        // Deterministic successor visit order.
        for succs in successors.values_mut() {
            succs.sort();
        }

        Self {
            successors,
            in_degree,
        }
    }

    /// Direct predecessors declared by `task` within the run's set.
    pub fn predecessors_of<'a>(&self, task: &'a Task) -> impl Iterator<Item = &'a str> {
        task.depends_on
            .iter()
            .map(|s| s.as_str())
            .filter(move |dep| *dep != task.id)
    }

    /// Kahn's algorithm with the deterministic ready-set tie-break.
    pub fn topological_order(&self, tasks: &[Task]) -> TopoResult {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut in_degree = self.in_degree.clone();

        let mut ready: BinaryHeap<Reverse<ReadyKey>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .filter_map(|(id, _)| by_id.get(id.as_str()))
            .map(|t| Reverse(ReadyKey::for_task(t)))
            .collect();

        let mut order = Vec::with_capacity(tasks.len());
        while let Some(Reverse(key)) = ready.pop() {
            order.push(key.id.clone());
            if let Some(succs) = self.successors.get(&key.id) {
                for succ in succs {
                    let deg = in_degree
                        .get_mut(succ)
                        .expect("successor is always a known node");
                    *deg -= 1;
                    if *deg == 0 {
                        if let Some(task) = by_id.get(succ.as_str()) {
                            ready.push(Reverse(ReadyKey::for_task(task)));
                        }
                    }
                }
            }
        }

        // Anything with remaining in-degree sits on a cycle (or behind one).
        let stuck: HashSet<String> = in_degree
            .iter()
            .filter(|(_, deg)| **deg > 0)
            .map(|(id, _)| id.clone())
            .collect();

        TopoResult {
            order,
            cycles: self.components(&stuck),
        }
    }

    /// Group stuck nodes into connected components (edges both ways) so each
    /// cycle is reported once.
    fn components(&self, stuck: &HashSet<String>) -> Vec<Vec<String>> {
        let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
        for (pred, succs) in &self.successors {
            if !stuck.contains(pred) {
                continue;
            }
            for succ in succs {
                if stuck.contains(succ) {
                    undirected.entry(pred).or_default().push(succ);
                    undirected.entry(succ).or_default().push(pred);
                }
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut components = Vec::new();
        let mut roots: Vec<&String> = stuck.iter().collect();
        roots.sort();

        for root in roots {
            if seen.contains(root.as_str()) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![root.as_str()];
            while let Some(node) = stack.pop() {
                if !seen.insert(node) {
                    continue;
                }
                component.push(node.to_string());
                if let Some(neighbors) = undirected.get(node) {
                    stack.extend(neighbors.iter().copied());
                }
            }
            component.sort();
            components.push(component);
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, h, 0, 0).unwrap()
    }

    fn task(id: &str, priority: Priority, deps: &[&str]) -> Task {
        let mut t = Task::new("u1", id, TaskKind::Flexible, 30);
        t.id = id.to_string();
        t.priority = priority;
        t.depends_on = deps.iter().map(|s| s.to_string()).collect();
        t.created_at = utc(1, 0);
        t
    }

    #[test]
    fn orders_predecessors_first() {
        let tasks = vec![
            task("b", Priority::Medium, &["a"]),
            task("a", Priority::Medium, &[]),
            task("c", Priority::Medium, &["b"]),
        ];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert_eq!(result.order, vec!["a", "b", "c"]);
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn ready_ties_break_by_priority_then_deadline() {
        let mut early = task("early-deadline", Priority::Medium, &[]);
        early.kind = TaskKind::Deadline { due_at: utc(6, 12) };
        let mut late = task("late-deadline", Priority::Medium, &[]);
        late.kind = TaskKind::Deadline { due_at: utc(9, 12) };
        let high = task("high", Priority::High, &[]);
        let low = task("low", Priority::Low, &[]);

        let tasks = vec![low.clone(), late.clone(), early.clone(), high.clone()];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert_eq!(
            result.order,
            vec!["high", "early-deadline", "late-deadline", "low"]
        );
    }

    #[test]
    fn cycle_members_are_excluded_and_reported_once() {
        let tasks = vec![
            task("a", Priority::Medium, &["b"]),
            task("b", Priority::Medium, &["a"]),
            task("free", Priority::Medium, &[]),
        ];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert_eq!(result.order, vec!["free"]);
        assert_eq!(result.cycles, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn task_behind_a_cycle_is_reported_with_it() {
        let tasks = vec![
            task("a", Priority::Medium, &["b"]),
            task("b", Priority::Medium, &["a"]),
            task("c", Priority::Medium, &["a"]),
        ];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert!(result.order.is_empty());
        assert_eq!(
            result.cycles,
            vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
        );
    }

    #[test]
    fn links_to_unknown_tasks_are_not_edges() {
        let tasks = vec![task("a", Priority::Medium, &["completed-elsewhere"])];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert_eq!(result.order, vec!["a"]);
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn self_reference_is_ignored() {
        let tasks = vec![task("a", Priority::Medium, &["a"])];
        let graph = DependencyGraph::build(&tasks);
        let result = graph.topological_order(&tasks);
        assert_eq!(result.order, vec!["a"]);
    }
}
