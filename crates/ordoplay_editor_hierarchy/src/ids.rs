// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier newtypes shared by the hierarchy core.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a live runtime entity
    EntityId
);

uuid_id!(
    /// Unique identifier for a template asset
    AssetId
);

uuid_id!(
    /// Unique identifier for one instantiation of a template asset
    InstanceId
);

uuid_id!(
    /// Identifies the command stack a command was created for
    StackId
);
