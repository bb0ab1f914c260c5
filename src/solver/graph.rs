//! Directed acyclic graph of named derived scalar expressions.
//!
//! Nodes own their parsed definition; other nodes refer to them by
//! identifier only. The graph resolves a deterministic topological
//! evaluation order (insertion order breaks ties, via `IndexMap`), rejects
//! cycles and undefined references eagerly, and validates every checked
//! node's declared dimension against the dimension inferred from its
//! definition. A failed insertion leaves the graph unchanged.

use indexmap::{IndexMap, IndexSet};

use crate::solver::error::{ConfigError, Result};
use crate::solver::expr::{self, Expr};
use crate::solver::units::Dim;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A fixed numeric value exposed as a named global parameter.
    Constant,
    /// Derived from experiment parameters by a scaling law.
    ScalingDerived,
    /// A transported species concentration; leaf supplied by the solver.
    SpeciesConcentration,
    /// A primitive the solver computes itself (wall distance, density,
    /// Pitzer user functions); leaf, never emitted.
    SolverProvided,
    /// Part of the bulk/wall reaction-kinetics family.
    ReactionTerm,
}

/// Whether a node's declared dimension is validated against inference.
///
/// The empirical kinetics family declares physically intended dimensions
/// that molality algebra cannot reproduce (its rate constants absorb the
/// unit multiplicity), so those nodes opt out of the equality check while
/// still exposing their declared dimension to everything that reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimPolicy {
    Checked,
    Declared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    id: String,
    display_name: String,
    expr: Option<Expr>,
    dim: Dim,
    kind: NodeKind,
    policy: DimPolicy,
}

impl ExprNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The parsed definition; leaves have none.
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn policy(&self) -> DimPolicy {
        self.policy
    }

    /// Leaves exist solver-side already; only defined nodes are emitted.
    pub fn is_emitted(&self) -> bool {
        self.expr.is_some()
    }

    /// Definition text the solver receives.
    pub fn definition(&self) -> Option<String> {
        self.expr.as_ref().map(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExprGraph {
    nodes: IndexMap<String, ExprNode>,
}

impl ExprGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ExprNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExprNode> {
        self.nodes.values()
    }

    /// Identifiers a node's definition reads (empty for leaves).
    pub fn references(&self, id: &str) -> IndexSet<String> {
        self.nodes
            .get(id)
            .and_then(|node| node.expr.as_ref())
            .map(|expr| expr.references())
            .unwrap_or_default()
    }

    fn insert(&mut self, node: ExprNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ConfigError::DuplicateIdentifier {
                id: node.id.clone(),
            });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// A leaf the solver supplies (species concentration or solver
    /// primitive); it participates in reference resolution and dimension
    /// inference but is never emitted.
    pub fn add_leaf(&mut self, id: impl Into<String>, dim: Dim, kind: NodeKind) -> Result<()> {
        let id = id.into();
        self.insert(ExprNode {
            display_name: id.clone(),
            id,
            expr: None,
            dim,
            kind,
            policy: DimPolicy::Checked,
        })
    }

    /// A fixed named value (the solver sees it as a global parameter).
    pub fn add_constant(&mut self, id: impl Into<String>, value: f64, dim: Dim) -> Result<()> {
        let id = id.into();
        if !value.is_finite() {
            return Err(ConfigError::invalid(id, format!("not finite: {value}")));
        }
        self.insert(ExprNode {
            display_name: id.clone(),
            id,
            expr: Some(Expr::literal(value)),
            dim,
            kind: NodeKind::Constant,
            policy: DimPolicy::Checked,
        })
    }

    /// A derived expression whose declared dimension must match inference.
    pub fn add_expr(
        &mut self,
        id: impl Into<String>,
        display_name: impl Into<String>,
        definition: &str,
        dim: Dim,
        kind: NodeKind,
    ) -> Result<()> {
        let expr = expr::parse(definition)?;
        self.insert(ExprNode {
            id: id.into(),
            display_name: display_name.into(),
            expr: Some(expr),
            dim,
            kind,
            policy: DimPolicy::Checked,
        })
    }

    /// A derived expression whose declared dimension is trusted as-is
    /// (empirical kinetics terms with unit multiplicity).
    pub fn add_expr_declared(
        &mut self,
        id: impl Into<String>,
        display_name: impl Into<String>,
        definition: &str,
        dim: Dim,
        kind: NodeKind,
    ) -> Result<()> {
        let expr = expr::parse(definition)?;
        self.insert(ExprNode {
            id: id.into(),
            display_name: display_name.into(),
            expr: Some(expr),
            dim,
            kind,
            policy: DimPolicy::Declared,
        })
    }

    /// A dependency-respecting evaluation order over all nodes.
    ///
    /// Fails with `UndefinedReference` if any definition reads an identifier
    /// that was never added, and with `CyclicDependency` (naming an actual
    /// cycle path) if the reference graph is not acyclic. Ties are broken by
    /// insertion order, so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        // Reference resolution first: a cycle report should never hide a
        // plain typo.
        for node in self.nodes.values() {
            for reference in self.references(&node.id) {
                if !self.nodes.contains_key(reference.as_str()) {
                    return Err(ConfigError::UndefinedReference {
                        node: node.id.clone(),
                        missing: reference,
                    });
                }
            }
        }

        let mut in_degree: IndexMap<&str, usize> = IndexMap::new();
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (id, _) in &self.nodes {
            in_degree.insert(id.as_str(), 0);
        }
        for (id, node) in &self.nodes {
            if let Some(expr) = &node.expr {
                for reference in expr.references() {
                    let (upstream, _) = self.nodes.get_key_value(reference.as_str()).unwrap();
                    dependents
                        .entry(upstream.as_str())
                        .or_default()
                        .push(id.as_str());
                    *in_degree.get_mut(id.as_str()).unwrap() += 1;
                }
            }
        }

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut head = 0;
        while head < queue.len() {
            let id = queue[head];
            head += 1;
            order.push(id);
            if let Some(children) = dependents.get(id) {
                for child in children {
                    let degree = in_degree.get_mut(child).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(child);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(ConfigError::CyclicDependency {
                cycle: self.find_cycle(&order),
            });
        }
        Ok(order)
    }

    /// Walk references among the nodes Kahn could not order until one
    /// repeats; the slice from its first occurrence is a genuine cycle.
    fn find_cycle(&self, ordered: &[&str]) -> Vec<String> {
        let placed: IndexSet<&str> = ordered.iter().copied().collect();
        let start = self
            .nodes
            .keys()
            .find(|id| !placed.contains(id.as_str()))
            .expect("cycle detection called without leftover nodes");

        let mut path: Vec<&str> = Vec::new();
        let mut current = start.as_str();
        loop {
            if let Some(at) = path.iter().position(|id| *id == current) {
                return path[at..].iter().map(|id| id.to_string()).collect();
            }
            path.push(current);
            let next = self
                .references(current)
                .into_iter()
                .find(|reference| !placed.contains(reference.as_str()))
                .expect("unordered node must have an unordered reference");
            let (key, _) = self.nodes.get_key_value(next.as_str()).unwrap();
            current = key.as_str();
        }
    }

    /// Full build-time validation: topological order plus dimension
    /// inference of every checked node against its declared dimension.
    /// Returns the evaluation order.
    pub fn validate(&self) -> Result<Vec<&str>> {
        let order = self.topological_order()?;

        let lookup = |name: &str| self.nodes.get(name).map(|node| node.dim);
        for id in &order {
            let node = &self.nodes[*id];
            let (Some(expr), DimPolicy::Checked) = (&node.expr, node.policy) else {
                continue;
            };
            if let Some(found) = expr.infer_dim_opt(&node.id, &lookup)? {
                if found != node.dim {
                    return Err(ConfigError::DimensionMismatch {
                        context: format!("node '{}'", node.id),
                        expected: node.dim,
                        found,
                    });
                }
            }
        }
        Ok(order)
    }
}
