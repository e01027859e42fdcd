//! CPU force simulation for the class graph layout.
//!
//! Iteratively assigns 2D positions by summing four force contributions per
//! tick: many-body repulsion, a weak centering pull toward the canvas center,
//! link springs along edges, and pairwise collision separation. Pinned nodes
//! (`fx`/`fy` set by the drag controller) are held exactly at their pinned
//! coordinates and accumulate no velocity.

use crate::graph::{CANVAS_HEIGHT, CANVAS_WIDTH, GraphModel};

/// Configuration for the force simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Repulsion strength (negative = repulsion).
    pub charge: f32,
    /// Link rest length.
    pub link_distance: f32,
    /// Link spring stiffness.
    pub link_strength: f32,
    /// Centering force strength.
    pub center_strength: f32,
    /// Node circle radius for collision separation.
    pub collide_radius: f32,
    /// Velocity decay (friction).
    pub velocity_decay: f32,
    /// Minimum alpha before the simulation settles.
    pub alpha_min: f32,
    /// Per-tick rate at which alpha approaches its target.
    pub alpha_decay: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            charge: -240.0,
            link_distance: 120.0,
            link_strength: 1.0,
            center_strength: 0.05,
            collide_radius: 28.0,
            velocity_decay: 0.6,
            alpha_min: 0.001,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
        }
    }
}

/// The layout simulator. Owns the node arena while the layout is live; the
/// drag controller writes pins through [`GraphModel::node_mut`], everything
/// else goes through [`LayoutSimulator::tick`].
#[derive(Debug)]
pub struct LayoutSimulator {
    model: GraphModel,
    /// Edge endpoints resolved to node indices once, at construction.
    links: Vec<(usize, usize)>,
    config: SimulationConfig,
    alpha: f32,
    alpha_target: f32,
}

impl LayoutSimulator {
    pub fn new(model: GraphModel) -> Self {
        Self::with_config(model, SimulationConfig::default())
    }

    pub fn with_config(model: GraphModel, config: SimulationConfig) -> Self {
        let links = model
            .edges
            .iter()
            .filter_map(|e| {
                Some((model.node_index(&e.source)?, model.node_index(&e.target)?))
            })
            .collect();
        Self {
            model,
            links,
            config,
            alpha: 1.0,
            alpha_target: 0.0,
        }
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut GraphModel {
        &mut self.model
    }

    /// Take the model back out, ending the simulation.
    pub fn into_model(self) -> GraphModel {
        self.model
    }

    /// Whether the next tick will still move anything. A positive alpha
    /// target keeps the simulation live even once alpha has decayed to it.
    pub fn is_running(&self) -> bool {
        self.alpha >= self.config.alpha_min || self.alpha_target > 0.0
    }

    /// Simulation temperature target. Near zero lets the layout settle and
    /// stop; a positive value keeps it actively perturbing (used while the
    /// user is dragging).
    pub fn set_alpha_target(&mut self, target: f32) {
        self.alpha_target = target.clamp(0.0, 1.0);
        if self.alpha_target > self.alpha {
            self.alpha = self.alpha.max(self.alpha_target);
        }
    }

    /// Re-heat the simulation to full temperature.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
    }

    /// Run one simulation step. Non-blocking, O(n^2) in the node count.
    /// A zero-node model is a no-op.
    pub fn tick(&mut self) {
        if self.model.nodes.is_empty() || !self.is_running() {
            return;
        }

        self.apply_many_body_force();
        self.apply_link_force();
        self.apply_center_force();

        let decay = self.config.velocity_decay;
        for node in &mut self.model.nodes {
            if let (Some(fx), Some(fy)) = (node.fx, node.fy) {
                node.x = fx;
                node.y = fy;
                node.vx = 0.0;
                node.vy = 0.0;
                continue;
            }
            node.vx *= decay;
            node.vy *= decay;
            node.x += node.vx * self.alpha;
            node.y += node.vy * self.alpha;
        }

        self.apply_collision();

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
    }

    /// Pairwise repulsion between all nodes.
    fn apply_many_body_force(&mut self) {
        let n = self.model.nodes.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = self.model.nodes[j].x - self.model.nodes[i].x;
                let dy = self.model.nodes[j].y - self.model.nodes[i].y;

                let dist_sq = (dx * dx + dy * dy).max(1.0);
                let dist = dist_sq.sqrt();

                let force = self.config.charge / dist_sq;

                let fx = force * dx / dist;
                let fy = force * dy / dist;

                self.model.nodes[i].vx += fx;
                self.model.nodes[i].vy += fy;
                self.model.nodes[j].vx -= fx;
                self.model.nodes[j].vy -= fy;
            }
        }
    }

    /// Spring force along every edge toward the rest length.
    fn apply_link_force(&mut self) {
        for &(source, target) in &self.links {
            if source == target {
                // Self-loops render fine but exert no spring force.
                continue;
            }
            let dx = self.model.nodes[target].x - self.model.nodes[source].x;
            let dy = self.model.nodes[target].y - self.model.nodes[source].y;

            let dist = (dx * dx + dy * dy).sqrt().max(1.0);
            let stretch = dist - self.config.link_distance;
            let force = self.config.link_strength * stretch / dist * 0.5;

            let fx = force * dx;
            let fy = force * dy;

            self.model.nodes[source].vx += fx;
            self.model.nodes[source].vy += fy;
            self.model.nodes[target].vx -= fx;
            self.model.nodes[target].vy -= fy;
        }
    }

    /// Weak pull toward the canvas center.
    fn apply_center_force(&mut self) {
        let strength = self.config.center_strength;
        for node in &mut self.model.nodes {
            node.vx += (CANVAS_WIDTH / 2.0 - node.x) * strength;
            node.vy += (CANVAS_HEIGHT / 2.0 - node.y) * strength;
        }
    }

    /// Position-based separation so that no two node circles overlap.
    /// Pinned nodes do not move; their share of the correction is dropped.
    fn apply_collision(&mut self) {
        let min_dist = self.config.collide_radius * 2.0;
        let n = self.model.nodes.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = self.model.nodes[j].x - self.model.nodes[i].x;
                let dy = self.model.nodes[j].y - self.model.nodes[i].y;
                let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
                if dist >= min_dist {
                    continue;
                }
                let overlap = (min_dist - dist) / 2.0;
                let ux = dx / dist;
                let uy = dy / dist;
                if !self.model.nodes[i].pinned() {
                    self.model.nodes[i].x -= ux * overlap;
                    self.model.nodes[i].y -= uy * overlap;
                }
                if !self.model.nodes[j].pinned() {
                    self.model.nodes[j].x += ux * overlap;
                    self.model.nodes[j].y += uy * overlap;
                }
            }
        }
    }

    /// Run ticks until the simulation settles (or the iteration cap hits).
    pub fn run_to_convergence(&mut self, max_iterations: usize) {
        for _ in 0..max_iterations {
            if !self.is_running() {
                break;
            }
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;
    use crate::model::{IriRef, ObjectProperty};

    fn iri(value: &str) -> IriRef {
        IriRef {
            iri: value.to_string(),
            label: None,
            local_name: None,
        }
    }

    fn two_linked_nodes() -> GraphModel {
        let prop = ObjectProperty {
            iri: "ex:rel".to_string(),
            label: None,
            local_name: None,
            domains: vec![iri("ex:A")],
            ranges: vec![iri("ex:B")],
        };
        graph::build(&[iri("ex:A"), iri("ex:B")], &[prop])
    }

    #[test]
    fn empty_model_tick_is_noop() {
        let mut sim = LayoutSimulator::new(GraphModel::default());
        sim.tick();
        sim.run_to_convergence(100);
        assert!(sim.model().nodes.is_empty());
    }

    #[test]
    fn alpha_decays_and_simulation_settles() {
        let mut sim = LayoutSimulator::new(two_linked_nodes());
        assert!(sim.is_running());
        sim.run_to_convergence(2000);
        assert!(!sim.is_running());
    }

    #[test]
    fn positive_alpha_target_keeps_simulation_warm() {
        let mut sim = LayoutSimulator::new(two_linked_nodes());
        sim.set_alpha_target(0.2);
        sim.run_to_convergence(2000);
        assert!(sim.is_running());

        sim.set_alpha_target(0.0);
        sim.run_to_convergence(2000);
        assert!(!sim.is_running());
    }

    #[test]
    fn pinned_node_stays_exactly_at_pin() {
        let mut sim = LayoutSimulator::new(two_linked_nodes());
        {
            let node = sim.model_mut().node_mut("ex:A").unwrap();
            node.fx = Some(100.0);
            node.fy = Some(50.0);
        }
        for _ in 0..50 {
            sim.tick();
            let node = sim.model().node("ex:A").unwrap();
            assert_eq!(node.x, 100.0);
            assert_eq!(node.y, 50.0);
        }
        // The other endpoint still moves freely.
        let free = sim.model().node("ex:B").unwrap();
        assert!(!free.pinned());
    }

    #[test]
    fn disconnected_nodes_spread_apart() {
        let model = graph::build(&[iri("ex:A"), iri("ex:B"), iri("ex:C")], &[]);
        let mut sim = LayoutSimulator::new(model);
        sim.run_to_convergence(2000);
        let nodes = &sim.model().nodes;
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let dx = nodes[j].x - nodes[i].x;
                let dy = nodes[j].y - nodes[i].y;
                let dist = (dx * dx + dy * dy).sqrt();
                assert!(dist > 10.0, "nodes should not collapse together");
            }
        }
    }

    #[test]
    fn collision_enforces_minimum_separation() {
        let model = graph::build(&[iri("ex:A"), iri("ex:B")], &[]);
        let mut sim = LayoutSimulator::new(model);
        // Force the two nodes onto almost the same point.
        sim.model_mut().nodes[0].x = 400.0;
        sim.model_mut().nodes[0].y = 210.0;
        sim.model_mut().nodes[1].x = 400.5;
        sim.model_mut().nodes[1].y = 210.0;
        sim.run_to_convergence(500);

        let nodes = &sim.model().nodes;
        let dx = nodes[1].x - nodes[0].x;
        let dy = nodes[1].y - nodes[0].y;
        let dist = (dx * dx + dy * dy).sqrt();
        assert!(dist >= 2.0 * sim.config.collide_radius * 0.9);
    }

    #[test]
    fn linked_nodes_approach_rest_length() {
        let mut sim = LayoutSimulator::new(two_linked_nodes());
        sim.run_to_convergence(2000);
        let a = sim.model().node("ex:A").unwrap();
        let b = sim.model().node("ex:B").unwrap();
        let dist = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        // Spring, repulsion and centering balance near the rest length.
        assert!(dist > 40.0 && dist < 300.0, "settled distance {dist}");
    }

    #[test]
    fn restart_reheats_alpha() {
        let mut sim = LayoutSimulator::new(two_linked_nodes());
        sim.run_to_convergence(2000);
        assert!(!sim.is_running());
        sim.restart();
        assert!(sim.is_running());
    }
}
