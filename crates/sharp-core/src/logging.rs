//! Logging and debugging facilities for SHARP.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output
//! - Debug visualization for scene trees and coordinators
//! - Performance spans for timing discovery queries
//!
//! # Tracing Integration
//!
//! SHARP emits events through the `tracing` crate and never installs a
//! subscriber itself. To see them, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("sharp_core::coordinator=debug,sharp::perf=info")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```ignore
//! use sharp_core::logging::{CoordinatorDebug, SceneTreeDebug};
//!
//! println!("{}", SceneTreeDebug::new(&scene));
//! println!("{}", CoordinatorDebug::new(&coordinator));
//! ```

use std::fmt;

use crate::coordinator::Coordinator;
use crate::scene::{NodeId, SceneGraph, SceneResult, SharedSceneGraph};
use crate::view::ViewModel;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Coordinator mutations and lifecycle.
    pub const COORDINATOR: &str = "sharp_core::coordinator";
    /// Coordinator registry.
    pub const REGISTRY: &str = "sharp_core::registry";
    /// Discovery query execution.
    pub const DISCOVERY: &str = "sharp_core::discovery";
    /// Scene graph mutations.
    pub const SCENE: &str = "sharp_core::scene";
    /// Instance providers.
    pub const PROVIDER: &str = "sharp_core::provider";
    /// Performance spans.
    pub const PERF: &str = "sharp::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for scene tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node IDs.
    pub show_ids: bool,
    /// Whether to show how many views are attached to each node.
    pub show_views: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_views: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_views: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_views: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing a scene graph.
#[derive(Clone)]
pub struct SceneTreeDebug<'a> {
    scene: &'a SharedSceneGraph,
    options: TreeFormatOptions,
}

impl<'a> SceneTreeDebug<'a> {
    /// Create a visualizer with default options.
    pub fn new(scene: &'a SharedSceneGraph) -> Self {
        Self::with_options(scene, TreeFormatOptions::default())
    }

    /// Create a visualizer with custom options.
    pub fn with_options(scene: &'a SharedSceneGraph, options: TreeFormatOptions) -> Self {
        Self { scene, options }
    }

    /// Format every tree in the scene, one root at a time.
    pub fn format_all(&self) -> SceneResult<String> {
        self.scene.with_read(|graph| {
            let mut output = format!("Scene Tree ({} total nodes):\n", graph.node_count());
            let roots: Vec<NodeId> = graph.root_nodes().collect();
            if roots.is_empty() {
                output.push_str("  (empty)\n");
            }
            for root in roots {
                self.format_subtree_into(graph, root, 0, true, &mut Vec::new(), &mut output)?;
            }
            Ok(output)
        })
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree(&self, root: NodeId) -> SceneResult<String> {
        self.scene.with_read(|graph| {
            let mut output = String::new();
            self.format_subtree_into(graph, root, 0, true, &mut Vec::new(), &mut output)?;
            Ok(output)
        })
    }

    fn format_subtree_into(
        &self,
        graph: &SceneGraph,
        id: NodeId,
        depth: usize,
        is_last: bool,
        open: &mut Vec<bool>,
        output: &mut String,
    ) -> SceneResult<()> {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        let name = graph.name(id)?;
        output.push_str(&self.build_prefix(depth, is_last, open.as_slice()));
        output.push_str(if name.is_empty() { "(unnamed)" } else { name });

        if self.options.show_ids {
            output.push_str(&format!(" [{}]", id.as_raw()));
        }
        if self.options.show_views {
            let views = graph.component_count(id)?;
            if views > 0 {
                output.push_str(&format!(" <{} view{}>", views, if views == 1 { "" } else { "s" }));
            }
        }
        output.push('\n');

        // One entry per non-root ancestor: whether it still has siblings below.
        if depth > 0 {
            open.push(!is_last);
        }
        let children = graph.children(id)?;
        let child_count = children.len();
        for (i, &child) in children.iter().enumerate() {
            self.format_subtree_into(graph, child, depth + 1, i + 1 == child_count, open, output)?;
        }
        if depth > 0 {
            open.pop();
        }
        Ok(())
    }

    fn build_prefix(&self, depth: usize, is_last: bool, open: &[bool]) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let gap = if branch.is_empty() { "" } else { " " };

        let mut prefix = String::new();
        for &continues in open {
            prefix.push_str(if continues { branch } else { gap });
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}

impl fmt::Display for SceneTreeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format_all() {
            Ok(output) => f.write_str(&output),
            Err(e) => write!(f, "Error formatting scene tree: {e}"),
        }
    }
}

/// Debug utility summarizing a coordinator's contexts and bindings.
///
/// Every line is produced from a separate snapshot, so output taken while
/// other threads mutate the coordinator may mix two points in time.
pub struct CoordinatorDebug<'a, VM> {
    coordinator: &'a Coordinator<VM>,
}

impl<'a, VM: ViewModel> CoordinatorDebug<'a, VM> {
    /// Create a summary view over `coordinator`.
    pub fn new(coordinator: &'a Coordinator<VM>) -> Self {
        Self { coordinator }
    }
}

impl<VM: ViewModel> fmt::Display for CoordinatorDebug<'_, VM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.coordinator.counts();
        writeln!(
            f,
            "Coordinator<{}>: {} active, {} orphaned{}",
            std::any::type_name::<VM>(),
            counts.active,
            counts.orphan,
            if self.coordinator.is_disposed() { " (disposed)" } else { "" }
        )?;

        let mut contexts = self.coordinator.all_contexts();
        contexts.sort();
        for context in contexts {
            let mut names: Vec<String> = self
                .coordinator
                .view_model(&context)
                .map(|vm| self.coordinator.views_for(&vm))
                .unwrap_or_default()
                .iter()
                .map(|view| view.name().to_string())
                .collect();
            names.sort();
            writeln!(f, "  [{context}] {}", names.join(", "))?;
        }

        let mut loose: Vec<String> = self
            .coordinator
            .views_without_context()
            .iter()
            .map(|view| view.name().to_string())
            .collect();
        if !loose.is_empty() {
            loose.sort();
            writeln!(f, "  (no context) {}", loose.join(", "))?;
        }
        Ok(())
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to time discovery queries under the `sharp::perf` target.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self { _span: span.entered() }
    }
}
