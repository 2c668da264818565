//! Cell flags.

use bitflags::bitflags;

bitflags! {
    /// Validity and state flags of a value cell.
    ///
    /// A public `*_OK` flag means the slot holds the value exactly. A
    /// private `P_*` flag alone means the slot holds a best-effort
    /// conversion of a value that was not fully numeric; readers reparse
    /// rather than trust it.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct SvFlags: u32 {
        const INT_OK = 1 << 0;
        const NUM_OK = 1 << 1;
        const STR_OK = 1 << 2;
        const ROK = 1 << 3;
        const P_INT_OK = 1 << 4;
        const P_NUM_OK = 1 << 5;
        /// String bytes are UTF-8 characters.
        const UTF8 = 1 << 6;
        const READONLY = 1 << 7;
        const TAINTED = 1 << 8;
        /// Reference does not own its referent.
        const WEAKREF = 1 << 9;
        /// Blessed into a package.
        const OBJECT = 1 << 10;
        /// Magic hooks are running on this cell.
        const IN_MAGIC = 1 << 11;

        /// Any defined scalar value.
        const OK = Self::INT_OK.bits() | Self::NUM_OK.bits() | Self::STR_OK.bits()
            | Self::ROK.bits() | Self::P_INT_OK.bits() | Self::P_NUM_OK.bits();
    }
}
