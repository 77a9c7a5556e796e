use serde::{Deserialize, Serialize};

// Chart model handed to the rendering collaborator. A figure is whatever the
// executed plot script drew: zero or more layers plus decorations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Histogram {
        column: String,
        bin_edges: Vec<f64>,
        counts: Vec<usize>,
    },
    Bar {
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Line {
        x_column: String,
        y_column: String,
        x: Vec<f64>,
        y: Vec<f64>,
    },
    Scatter {
        x_column: String,
        y_column: String,
        x: Vec<f64>,
        y: Vec<f64>,
    },
}

impl Figure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_layers(&self) -> bool {
        !self.layers.is_empty()
    }
}
