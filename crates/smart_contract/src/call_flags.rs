//! Call flags restricting what a context may invoke.

use bitflags::bitflags;

bitflags! {
    /// The permission bits of an execution context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CallFlags: u8 {
        /// No permissions.
        const NONE = 0;
        /// May read chain state.
        const READ_STATES = 0b0000_0001;
        /// May write chain state.
        const WRITE_STATES = 0b0000_0010;
        /// May call other contracts.
        const ALLOW_CALL = 0b0000_0100;
        /// May emit notifications.
        const ALLOW_NOTIFY = 0b0000_1000;
        /// Read and write states.
        const STATES = Self::READ_STATES.bits() | Self::WRITE_STATES.bits();
        /// Everything but writing states.
        const READ_ONLY = Self::READ_STATES.bits() | Self::ALLOW_CALL.bits();
        /// All permissions.
        const ALL = Self::STATES.bits() | Self::ALLOW_CALL.bits() | Self::ALLOW_NOTIFY.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composites() {
        assert!(CallFlags::ALL.contains(CallFlags::WRITE_STATES));
        assert!(CallFlags::READ_ONLY.contains(CallFlags::READ_STATES));
        assert!(!CallFlags::READ_ONLY.contains(CallFlags::WRITE_STATES));
    }

    #[test]
    fn test_from_bits_rejects_garbage() {
        assert!(CallFlags::from_bits(0b1000_0000).is_none());
        assert_eq!(CallFlags::from_bits(0b1111).unwrap(), CallFlags::ALL);
    }
}
