use std::io;

use thiserror::Error;

/// Errors that can occur when configuring or executing a parallel pattern.
///
/// Every error is detected before the requested computation produces any result. There is
/// no partial output: if an operation returns an error, nothing was computed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller provided an argument the engines cannot work with, such as a zero-sized
    /// index range, a zero thread count or an unknown variant selector.
    #[error("invalid argument '{name}': {problem}")]
    InvalidArgument {
        /// Name of the argument that was rejected.
        name: &'static str,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// An input sample does not fall into any histogram bin.
    #[error("sample {index} has value {value} which is outside the {bins} histogram bins")]
    SampleOutOfRange {
        /// Position of the offending sample in the input.
        index: usize,

        /// The offending value.
        value: usize,

        /// Number of bins the histogram was configured with.
        bins: usize,
    },

    /// A vector or histogram could not be sized as required.
    #[error("failed to allocate {what} with {len} elements")]
    Allocation {
        /// What was being allocated.
        what: &'static str,

        /// Number of elements requested.
        len: usize,
    },

    /// The operating system refused to create a worker thread.
    #[error("failed to spawn worker thread")]
    WorkerSpawn(#[source] io::Error),
}

impl Error {
    pub(crate) fn invalid_argument(name: &'static str, problem: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            problem: problem.into(),
        }
    }
}

/// A specialized `Result` type for parallel pattern operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Allocates a vector of `len` elements produced by `init`, reporting allocation failure as an
/// error instead of aborting the process.
pub(crate) fn try_filled<T>(
    what: &'static str,
    len: usize,
    init: impl FnMut() -> T,
) -> Result<Vec<T>> {
    let mut values = Vec::new();

    if values.try_reserve_exact(len).is_err() {
        return Err(Error::Allocation { what, len });
    }

    values.resize_with(len, init);
    Ok(values)
}

/// Allocates a vector of `len` default (zero) elements. See [`try_filled()`].
pub(crate) fn try_zeroed<T: Default>(what: &'static str, len: usize) -> Result<Vec<T>> {
    try_filled(what, len, T::default)
}

/// Rejects a zero size or count, naming the argument in the error.
pub(crate) fn require_positive(name: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(Error::invalid_argument(name, "must be greater than zero"));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn zero_is_rejected_with_argument_name() {
        let error = require_positive("thread_count", 0).unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidArgument {
                name: "thread_count",
                ..
            }
        ));
        assert_eq!(
            error.to_string(),
            "invalid argument 'thread_count': must be greater than zero"
        );
    }

    #[test]
    fn positive_is_passed_through() {
        assert_eq!(require_positive("len", 17).unwrap(), 17);
    }

    #[test]
    fn try_zeroed_produces_zeroes() {
        let values = try_zeroed::<u64>("test vector", 5).unwrap();

        assert_eq!(values, vec![0; 5]);
    }

    #[test]
    fn try_zeroed_reports_impossible_allocation() {
        let error = try_zeroed::<u64>("test vector", usize::MAX).unwrap_err();

        assert!(matches!(
            error,
            Error::Allocation {
                what: "test vector",
                len: usize::MAX
            }
        ));
    }
}
