//! Cycle detection over the dependency edges of a declared graph.
//!
//! Edges run from a declaration to the declarations it depends on. Declaration
//! order already rules out cycles for graphs built through `Graph::declare`; this
//! check runs on the finished graph so the emitted template is verified as a
//! whole, not just per insertion.

use crate::error::BuildError;
use std::collections::BTreeMap;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Temp,
    Perm,
}

/// DFS coloring from every node. Fails with the first cycle found, rendered
/// as `A -> B -> A`.
pub fn check_acyclic(edges: &BTreeMap<String, Vec<String>>) -> Result<(), BuildError> {
    fn dfs(
        v: &str,
        edges: &BTreeMap<String, Vec<String>>,
        marks: &mut BTreeMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        match marks.get(v) {
            Some(Mark::Perm) => return Ok(()),
            Some(Mark::Temp) => {
                // v is on the current path => cycle
                let start = stack.iter().position(|s| s == v).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(v.to_string());
                return Err(BuildError::Cycle(path.join(" -> ")));
            }
            None => {}
        }

        marks.insert(v.to_string(), Mark::Temp);
        stack.push(v.to_string());

        if let Some(next) = edges.get(v) {
            for n in next {
                dfs(n, edges, marks, stack)?;
            }
        }

        stack.pop();
        marks.insert(v.to_string(), Mark::Perm);
        Ok(())
    }

    let mut marks = BTreeMap::<String, Mark>::new();
    let mut stack = Vec::<String>::new();
    for v in edges.keys() {
        stack.clear();
        dfs(v, edges, &mut marks, &mut stack)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edges(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn accepts_diamond() {
        let g = edges(&[("D", &["B", "C"]), ("B", &["A"]), ("C", &["A"]), ("A", &[])]);
        assert!(check_acyclic(&g).is_ok());
    }

    #[test]
    fn reports_cycle_path() {
        let g = edges(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        match check_acyclic(&g) {
            Err(BuildError::Cycle(path)) => assert_eq!(path, "A -> B -> C -> A"),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn reports_self_loop() {
        let g = edges(&[("A", &["A"])]);
        assert!(matches!(check_acyclic(&g), Err(BuildError::Cycle(p)) if p == "A -> A"));
    }
}
