//! Requests the grid sends to whatever draws drawers, popovers and previews.
//!
//! Each interactive command carries a `oneshot` reply. Sending on it completes
//! the flow; dropping it cancels.

use std::fmt;

use serde_json::{Map, Value};
use shared::domain::{ColumnDescriptor, OperationDescriptor, ParameterDescriptor};
use tokio::sync::{mpsc, oneshot};

pub const POPOVER_WIDTH: f32 = 240.0;

/// Screen rectangle of the control that triggered a popover.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopoverDirection {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl fmt::Display for PopoverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PopoverDirection::TopLeft => "TL",
            PopoverDirection::TopRight => "TR",
            PopoverDirection::BottomLeft => "BL",
            PopoverDirection::BottomRight => "BR",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopoverAnchor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub direction: PopoverDirection,
}

impl PopoverAnchor {
    /// Centered under `rect`, opening towards the top-right corner.
    pub fn below(rect: Rect) -> Self {
        Self {
            x: rect.left + rect.width / 2.0,
            y: rect.bottom(),
            width: POPOVER_WIDTH,
            direction: PopoverDirection::TopRight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSelection {
    pub operation: OperationDescriptor,
    pub row_index: usize,
}

#[derive(Debug)]
pub enum PresentationCommand {
    /// Editable form for `operation`. Reply once the operation succeeded.
    OperationDrawer {
        operation: OperationDescriptor,
        initial_value: Map<String, Value>,
        primary: Option<String>,
        reply: oneshot::Sender<()>,
    },
    /// Browse rows one at a time; replying picks an operation for a row.
    PreviewDrawer {
        parameters: Vec<ParameterDescriptor>,
        data_list: Vec<Map<String, Value>>,
        selected_index: usize,
        operations: Vec<OperationDescriptor>,
        reply: oneshot::Sender<PreviewSelection>,
    },
    SearchDrawer {
        parameters: Vec<ParameterDescriptor>,
        initial_value: Map<String, Value>,
        reply: oneshot::Sender<Map<String, Value>>,
    },
    FilterDrawer {
        columns: Vec<ColumnDescriptor>,
        selected: Option<Vec<String>>,
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    OperationsPopover {
        operations: Vec<OperationDescriptor>,
        anchor: PopoverAnchor,
        reply: oneshot::Sender<OperationDescriptor>,
    },
    /// Open `url`; a `target` asks for a new context instead of the current one.
    Navigate {
        url: String,
        target: Option<String>,
    },
    ReportError {
        error: String,
    },
    CloseFloats,
}

pub type Presenter = mpsc::UnboundedSender<PresentationCommand>;
