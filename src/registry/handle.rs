use derive_more::Display;
use serde::{Serialize, Serializer};

/// An ephemeral, in-memory address for one module's executable text.
///
/// Handles are unique across generations: the generation number is part of
/// the address, so a handle released by a rebuild is never issued again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("blob:preview/{generation:x}-{sequence:x}")]
pub struct ResourceHandle {
    generation: u64,
    sequence: u64,
}

impl ResourceHandle {
    pub(crate) fn new(generation: u64, sequence: u64) -> Self {
        ResourceHandle {
            generation,
            sequence,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Serialize for ResourceHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_as_blob_address() {
        assert_eq!(ResourceHandle::new(1, 0).to_string(), "blob:preview/1-0");
        assert_eq!(ResourceHandle::new(26, 255).to_string(), "blob:preview/1a-ff");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&ResourceHandle::new(2, 10)).unwrap();
        assert_eq!(json, "\"blob:preview/2-a\"");
    }
}
