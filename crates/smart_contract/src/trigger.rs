//! Engine triggers.

/// Why an application engine was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TriggerType {
    /// Running native lifecycle hooks before the block's transactions.
    OnPersist = 0x01,
    /// Running native lifecycle hooks after the block's transactions.
    PostPersist = 0x02,
    /// Running a witness verification script.
    Verification = 0x20,
    /// Running a transaction script.
    Application = 0x40,
}
