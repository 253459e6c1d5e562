//! Circuit graphs: networks of connected blocks carrying a live value

use std::collections::HashMap;

use crate::core::types::IVec3;

/// Identifies one network within a circuit
pub type NetId = u32;

/// Value currently carried by a network
#[derive(Clone, Debug, Default, PartialEq)]
pub enum NetValue {
    /// Not evaluated yet
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    /// Anything else a circuit can carry (text, compound values)
    Other(String),
}

/// A connection between two blocks belonging to one network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitEdge {
    pub net: NetId,
    pub from: IVec3,
    pub to: IVec3,
}

/// A circuit graph, identified by its origin block
#[derive(Clone, Debug, PartialEq)]
pub struct Circuit {
    origin: IVec3,
    edges: Vec<CircuitEdge>,
    values: HashMap<NetId, NetValue>,
}

impl Circuit {
    pub fn new(origin: IVec3) -> Self {
        Self {
            origin,
            edges: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Builder-style edge addition
    pub fn with_edge(mut self, net: NetId, from: IVec3, to: IVec3) -> Self {
        self.edges.push(CircuitEdge { net, from, to });
        self
    }

    pub fn add_edge(&mut self, net: NetId, from: IVec3, to: IVec3) {
        self.edges.push(CircuitEdge { net, from, to });
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    pub fn edges(&self) -> &[CircuitEdge] {
        &self.edges
    }

    /// Current value of a network; unknown nets are undefined
    pub fn net_value(&self, net: NetId) -> NetValue {
        self.values.get(&net).cloned().unwrap_or_default()
    }

    pub fn set_net_value(&mut self, net: NetId, value: NetValue) {
        self.values.insert(net, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_and_values() {
        let mut circuit = Circuit::new(IVec3::new(1, 2, 3))
            .with_edge(0, IVec3::new(1, 2, 3), IVec3::new(2, 2, 3))
            .with_edge(1, IVec3::new(2, 2, 3), IVec3::new(2, 3, 3));

        assert_eq!(circuit.edges().len(), 2);
        assert_eq!(circuit.net_value(0), NetValue::Undefined);

        circuit.set_net_value(0, NetValue::Number(2.5));
        assert_eq!(circuit.net_value(0), NetValue::Number(2.5));
        assert_eq!(circuit.net_value(7), NetValue::Undefined);
    }
}
