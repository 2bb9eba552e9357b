use crate::DomainError;

/// Lifecycle of one export session. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Exporting,
    Completed,
    Cancelled,
}

impl ExportState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn start(self) -> Result<Self, DomainError> {
        match self {
            Self::Idle => Ok(Self::Exporting),
            from => Err(DomainError::InvalidTransition {
                from,
                action: "start export",
            }),
        }
    }

    pub fn cancel_before_beginning(self) -> Result<Self, DomainError> {
        match self {
            Self::Idle => Ok(Self::Cancelled),
            from => Err(DomainError::InvalidTransition {
                from,
                action: "cancel before beginning",
            }),
        }
    }

    pub fn cancel(self) -> Result<Self, DomainError> {
        match self {
            Self::Exporting => Ok(Self::Cancelled),
            from => Err(DomainError::InvalidTransition {
                from,
                action: "cancel export",
            }),
        }
    }

    pub fn complete(self) -> Result<Self, DomainError> {
        match self {
            Self::Exporting => Ok(Self::Completed),
            from => Err(DomainError::InvalidTransition {
                from,
                action: "finish export",
            }),
        }
    }

    pub fn reset(self) -> Result<Self, DomainError> {
        if self.is_terminal() {
            return Ok(Self::Idle);
        }
        Err(DomainError::InvalidTransition {
            from: self,
            action: "reset",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportProgress {
    pub current_item: usize,
    pub total_items: usize,
    pub message: String,
    pub finished: bool,
}

impl ExportProgress {
    pub fn fraction(&self) -> f32 {
        if self.total_items == 0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.current_item.min(self.total_items) as f32) / (self.total_items as f32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
}
