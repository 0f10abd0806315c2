use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::num::NonZeroU32;


/// An enumeration identifying a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pid {
    /// The current process.
    Slf,
    /// The process identified by the provided ID.
    Pid(NonZeroU32),
}

impl Display for Pid {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Slf => write!(f, "self"),
            Self::Pid(pid) => write!(f, "{pid}"),
        }
    }
}

impl From<u32> for Pid {
    /// Convert a numeric process ID into a [`Pid`].
    ///
    /// `0` refers to the calling process itself.
    fn from(pid: u32) -> Self {
        NonZeroU32::new(pid).map(Pid::Pid).unwrap_or(Pid::Slf)
    }
}


#[cfg(test)]
mod tests {
    use super::*;


    /// Check the textual representation used in `/proc` paths.
    #[test]
    fn display_repr() {
        assert_eq!(Pid::Slf.to_string(), "self");
        assert_eq!(Pid::from(1234).to_string(), "1234");
    }

    /// A process ID of zero refers to the calling process.
    #[test]
    fn zero_is_self() {
        assert_eq!(Pid::from(0), Pid::Slf);
    }
}
