use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($name:ident, $repr:ty) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            pub fn new(raw: $repr) -> Self {
                Self(raw)
            }

            pub fn get(&self) -> $repr {
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
    };
}

row_id!(EntityTypeId, i64);
row_id!(NodeId, i64);
row_id!(FactId, i64);

/// The unit of identity facts attach to: a registered entity type plus the
/// caller's numeric id within that type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityTypeId,
    pub entity_id: u64,
}

impl EntityRef {
    pub fn new(entity_type: EntityTypeId, entity_id: u64) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({}:{})", self.entity_type.get(), self.entity_id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type.get(), self.entity_id)
    }
}
