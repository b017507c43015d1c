use std::fmt;

/// Unsigned integer value of a CoAP message option.
///
/// Equality and hashing are defined by the wrapped value only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UintOptionValue(u32);

impl UintOptionValue {
    /// Wrap an option value.
    pub const fn new(value: u32) -> Self {
        UintOptionValue(value)
    }

    /// The wrapped value.
    #[inline(always)]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for UintOptionValue {
    fn from(value: u32) -> Self {
        UintOptionValue(value)
    }
}

impl From<UintOptionValue> for u32 {
    fn from(value: UintOptionValue) -> Self {
        value.0
    }
}

impl fmt::Display for UintOptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
