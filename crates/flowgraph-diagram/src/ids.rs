use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
  ($name:ident) => {
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(pub String);

    impl $name {
      pub fn as_str(&self) -> &str {
        &self.0
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<String> for $name {
      fn from(s: String) -> Self {
        Self(s)
      }
    }

    impl From<&str> for $name {
      fn from(s: &str) -> Self {
        Self(s.to_string())
      }
    }

    impl std::borrow::Borrow<str> for $name {
      fn borrow(&self) -> &str {
        &self.0
      }
    }
  };
}

opaque_id!(NodeId);
opaque_id!(ArrowId);
opaque_id!(HandleId);
opaque_id!(ExecutionId);
