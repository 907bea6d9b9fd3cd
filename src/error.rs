/// A type alias for handling errors throughout meshlet-prep
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned when the pipeline rejects its input or configuration.
///
/// The individual passes assume validated input and panic on broken invariants instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Index buffer length isn't a whole number of triangles.
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    /// An index references a vertex past the end of the vertex buffer.
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },

    /// The buffer is too large to be addressed with 32-bit indices without reaching the reserved value.
    #[error("{0} elements exceed the 32-bit index range")]
    TooLarge(usize),

    /// An error occurred while validating a configuration
    #[error("config error: {0}")]
    Config(std::borrow::Cow<'static, str>),
}

impl Error {
    #[inline]
    pub(crate) fn config(msg: &'static str) -> Self {
        Self::Config(std::borrow::Cow::Borrowed(msg))
    }
}
