use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::vm::SlotId;

/// Passed to a stop callback when its slot reaches `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopNotice {
    pub slot: SlotId,
    pub script: i32,
    pub data: i32,
}

pub type SlotCallback = Arc<dyn Fn(&StopNotice, &mut dyn Host) + Send + Sync>;

/// A callback attached to a slot, referenced by its registered name.
///
/// Only the name and the user data are saved. Whether a name still resolves
/// to the same behaviour in a later build is up to the embedder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackBinding {
    pub name: String,
    pub data: i32,
}

/// Stable-name registry of slot callbacks.
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    fns: HashMap<String, SlotCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&StopNotice, &mut dyn Host) + Send + Sync + 'static,
    {
        self.fns.insert(name.into(), Arc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SlotCallback> {
        self.fns.get(name)
    }

    /// Resolves every binding or reports the first unknown name.
    pub fn check(&self, bindings: &[CallbackBinding]) -> Result<()> {
        for b in bindings {
            if !self.contains(&b.name) {
                return Err(anyhow!("unknown slot callback {:?}", b.name));
            }
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fns.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort();
        f.debug_struct("CallbackRegistry").field("names", &names).finish()
    }
}
