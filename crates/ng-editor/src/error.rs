use ng_core::StoreError;

/// Recoverable drag-gesture failures. None of these are fatal: the worst
/// outcome is a gesture that does not complete.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DragError {
    #[error("malformed drag payload: {0}")]
    MalformedPayload(String),

    #[error("drag started while another gesture was active; controller reset")]
    StaleController,

    #[error("drop received with no active gesture and no payload")]
    NoActiveSession,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DragError>;
