use apexsim_shared::TrackConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("track needs at least 2 nodes, got {0}")]
    TooFewNodes(usize),
    #[error("track length must exceed 1 m, got {0}")]
    BadLength(f32),
}

/// Closed-loop track sampled at arc-length nodes. Curvature and elevation
/// are total functions of `s`; sampling wraps into `[0, length)` and
/// interpolates linearly, with the wrap span running from the last node to
/// `length + s_nodes[0]`.
#[derive(Debug, Clone)]
pub struct TrackProfile {
    s_nodes: Vec<f32>,
    curvature: Vec<f32>,
    elevation: Vec<f32>,
    length_m: f32,
}

impl TrackProfile {
    pub fn load(cfg: &TrackConfig) -> Result<Self, TrackError> {
        if cfg.nodes.len() < 2 {
            return Err(TrackError::TooFewNodes(cfg.nodes.len()));
        }
        if cfg.length_m <= 1.0 {
            return Err(TrackError::BadLength(cfg.length_m));
        }

        Ok(Self {
            s_nodes: cfg.nodes.iter().map(|n| n.s).collect(),
            curvature: cfg.nodes.iter().map(|n| n.curvature).collect(),
            elevation: cfg.nodes.iter().map(|n| n.elevation).collect(),
            length_m: cfg.length_m,
        })
    }

    pub fn length(&self) -> f32 {
        self.length_m
    }

    pub fn curvature(&self, s: f32) -> f32 {
        self.sample(&self.curvature, s)
    }

    pub fn elevation(&self, s: f32) -> f32 {
        self.sample(&self.elevation, s)
    }

    fn wrap(&self, s: f32) -> f32 {
        let w = s % self.length_m;
        if w < 0.0 {
            w + self.length_m
        } else {
            w
        }
    }

    fn sample(&self, values: &[f32], s: f32) -> f32 {
        let s = self.wrap(s);
        let n = self.s_nodes.len();

        // Smallest index whose node lies strictly beyond s.
        let i1 = self.s_nodes.partition_point(|&node| node <= s);
        if i1 == 0 {
            return values[0];
        }
        if i1 == n {
            // Wrap span: last node back around to the first.
            let s0 = self.s_nodes[n - 1];
            let s1 = self.length_m + self.s_nodes[0];
            let span = s1 - s0;
            if span <= 0.0 {
                return values[n - 1];
            }
            let t = (s - s0) / span;
            return values[n - 1] + (values[0] - values[n - 1]) * t;
        }

        let i0 = i1 - 1;
        let s0 = self.s_nodes[i0];
        let s1 = self.s_nodes[i1];
        if s1 <= s0 {
            return values[i0];
        }
        let t = (s - s0) / (s1 - s0);
        values[i0] + (values[i1] - values[i0]) * t
    }
}
