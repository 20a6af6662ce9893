//! Identifier types for pages and processes.
//!
//! Lookups go through the owning collection by id; neither a [`Page`](crate::Page)
//! nor a [`Process`](crate::Process) compares equal to a bare number.

use core::fmt;
use core::ops::Add;

/// Macro to define common identifier functionality.
macro_rules! impl_id_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            pub const fn new(number: usize) -> Self {
                Self(number)
            }

            /// Returns the raw identifier.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(number: usize) -> Self {
                Self(number)
            }
        }
    };
}

impl_id_common!(
    PageId,
    "A virtual page identifier.\n\n\
     Page ids are zero-indexed and stable for the life of the system. A page's id is also\n\
     its page number in the virtual address space."
);

impl Add<usize> for PageId {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl_id_common!(
    ProcessId,
    "A process identifier.\n\n\
     Handed out from a monotonic counter and never reused."
);

impl ProcessId {
    /// Returns the id following this one.
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
