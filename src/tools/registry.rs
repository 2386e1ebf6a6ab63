//! Tool registry: kind and task dispatch.

use crate::model::{AnnotationKind, TaskType};
use crate::tools::{BboxTool, ClassifyTool, SelectTool, Tool, ToolKind};

/// Owns the tool instances and maps annotation kinds and tasks onto them.
///
/// Dispatch is data-driven so the render pass and pointer routing never
/// match on annotation kinds directly; adding a geometry kind means adding
/// a tool here and nowhere else.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    select: SelectTool,
    bbox: BboxTool,
    classify: ClassifyTool,
}

impl ToolRegistry {
    /// Create a registry with one instance of every tool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tool for a given kind.
    pub fn tool(&self, kind: ToolKind) -> &dyn Tool {
        match kind {
            ToolKind::Select => &self.select,
            ToolKind::Bbox => &self.bbox,
            ToolKind::Classify => &self.classify,
        }
    }

    /// Mutable access to the tool for a given kind.
    pub fn tool_mut(&mut self, kind: ToolKind) -> &mut dyn Tool {
        match kind {
            ToolKind::Select => &mut self.select,
            ToolKind::Bbox => &mut self.bbox,
            ToolKind::Classify => &mut self.classify,
        }
    }

    /// The tool responsible for rendering and hit-testing an annotation kind.
    pub fn for_annotation(&self, kind: AnnotationKind) -> &dyn Tool {
        match kind {
            AnnotationKind::Bbox => &self.bbox,
            // No-object markers render as badges like classification labels
            AnnotationKind::Classification | AnnotationKind::NoObject => &self.classify,
        }
    }

    /// Direct access to the select tool's drag state machine.
    pub fn select(&mut self) -> &mut SelectTool {
        &mut self.select
    }

    /// Tools available while the given task is active.
    pub fn tools_for_task(&self, task: TaskType) -> &'static [ToolKind] {
        match task {
            TaskType::Detection => &[ToolKind::Select, ToolKind::Bbox],
            TaskType::Classification => &[ToolKind::Select, ToolKind::Classify],
            TaskType::Segmentation => &[ToolKind::Select],
        }
    }

    /// Whether a tool may be activated under the given task.
    pub fn is_permitted(&self, tool: ToolKind, task: TaskType) -> bool {
        self.tools_for_task(task).contains(&tool)
    }

    /// Abandon every in-progress draft and drag.
    pub fn cancel_all(&mut self) {
        self.select.cancel();
        self.bbox.cancel();
        self.classify.cancel();
    }
}
