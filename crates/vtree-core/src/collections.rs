#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{BTreeMap, HashMap};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::HashMap;
    pub use std::collections::BTreeMap;
}
