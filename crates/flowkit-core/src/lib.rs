pub mod builder;
pub mod config;
pub mod coords;
pub mod document;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod id;
pub mod lint;
pub mod model;
pub mod svg;
pub mod transform;

pub use builder::{NodeSpec, PortSpec, create_node, create_node_with_ports, create_package_node, example_package};
pub use config::GraphConfig;
pub use coords::{ScreenTransform, Viewport, screen_to_logical};
pub use document::GraphDocument;
pub use error::{EdgeError, ImportError, LoadError, ModelError};
pub use hit::{Hit, hit_test};
pub use id::ElementId;
pub use lint::{LintDiagnostic, LintSeverity, lint_graph};
pub use model::*;
pub use svg::{SvgImport, import_svg_node};
pub use transform::{FlipAxis, RotateDirection};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
