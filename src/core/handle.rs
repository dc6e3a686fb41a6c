//! Typed object handles.
//!
//! Every object a [`Context`](crate::runtime::Context) creates is addressed by
//! a uuid-backed handle. Handles are never reused, so a stale handle (object
//! deleted) or a foreign one (object owned by another context) simply fails
//! the arena lookup instead of aliasing a newer object.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an ID from a UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Raw bytes of the ID, as written by info queries.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }
    };
}

object_id!(
    /// Identifier of a [`Context`](crate::runtime::Context).
    ContextId
);
object_id!(
    /// Handle of an image owned by a context.
    ImageId
);
object_id!(
    /// Handle of a filter owned by a context.
    FilterId
);
object_id!(
    /// Handle of a command queue owned by a context.
    QueueId
);

/// Any object handle, used by the polymorphic delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Object {
    Image(ImageId),
    Filter(FilterId),
    Queue(QueueId),
}

impl Object {
    /// Name of the object kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Image(_) => "image",
            Object::Filter(_) => "filter",
            Object::Queue(_) => "command queue",
        }
    }
}

impl From<ImageId> for Object {
    fn from(id: ImageId) -> Self {
        Object::Image(id)
    }
}

impl From<FilterId> for Object {
    fn from(id: FilterId) -> Self {
        Object::Filter(id)
    }
}

impl From<QueueId> for Object {
    fn from(id: QueueId) -> Self {
        Object::Queue(id)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Image(id) => write!(f, "image {}", id),
            Object::Filter(id) => write!(f, "filter {}", id),
            Object::Queue(id) => write!(f, "queue {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = ImageId::new();
        assert_eq!(format!("{}", id).len(), 8);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(FilterId::new(), FilterId::new());
    }

    #[test]
    fn test_object_from_handle() {
        let id = QueueId::new();
        let object: Object = id.into();
        assert_eq!(object, Object::Queue(id));
        assert_eq!(object.kind_name(), "command queue");
    }
}
