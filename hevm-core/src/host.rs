//! The boundary between the VM and the embedding engine.
//!
//! The VM never reaches for global engine state. Asset lookups and side
//! effects (sound, cursor, INI files, actor waits) go through [`Host`], which
//! is handed to every tick explicitly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ScriptFault;
use crate::vm::SlotId;

/// Asset ids understood by the resource mediator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKey {
    Script(i32),
    ObjectVerb { object: i32, verb: i32 },
    Room(i32),
    Sound(i32),
    Image(i32),
    Costume(i32),
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKey::Script(id) => write!(f, "script {id}"),
            AssetKey::ObjectVerb { object, verb } => write!(f, "object {object} verb {verb}"),
            AssetKey::Room(id) => write!(f, "room {id}"),
            AssetKey::Sound(id) => write!(f, "sound {id}"),
            AssetKey::Image(id) => write!(f, "image {id}"),
            AssetKey::Costume(id) => write!(f, "costume {id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IniKey {
    pub file: String,
    pub section: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IniValue {
    Number(i32),
    Text(String),
}

/// Conditions polled by the wait opcode family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitCondition {
    ActorMoving(i32),
    Message,
    Camera,
    Sentence,
    ActorAnimating(i32),
    ActorTurning(i32),
}

/// Structured notifications delivered to the embedding application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmEvent {
    Fault(ScriptFault),
    SlotStopped { slot: SlotId, script: i32 },
    UserInterrupt,
    Trace { slot: SlotId, value: i32, message: String },
    Restart,
    Quit,
}

/// Engine services the VM calls into. Every call is synchronous and must
/// return a definite hit or miss.
pub trait Host {
    fn request_asset(&mut self, key: &AssetKey) -> Option<Arc<[u8]>>;

    fn start_sound(&mut self, _id: i32) {}

    fn queue_sound(&mut self, _id: i32) {}

    fn stop_sound(&mut self, _id: i32) {}

    fn is_sound_running(&mut self, _id: i32) -> bool {
        false
    }

    fn set_cursor_image(&mut self, _image: i32, _inventory_state: bool) {}

    fn set_charset(&mut self, _id: i32) {}

    fn set_charset_colors(&mut self, _colors: &[u8]) {}

    fn read_ini(&mut self, _key: &IniKey) -> Option<IniValue> {
        None
    }

    fn write_ini(&mut self, _key: &IniKey, _value: IniValue) {}

    /// `true` once the condition no longer blocks the waiting script.
    fn wait_done(&mut self, _cond: WaitCondition) -> bool {
        true
    }

    fn event(&mut self, _event: VmEvent) {}
}

/// A host with no assets and no side effects.
pub struct NullHost;

impl Host for NullHost {
    fn request_asset(&mut self, _key: &AssetKey) -> Option<Arc<[u8]>> {
        None
    }
}

/// Map-backed host that records everything it is asked to do.
#[derive(Default)]
pub struct MemoryHost {
    pub assets: HashMap<AssetKey, Arc<[u8]>>,
    pub ini: HashMap<IniKey, IniValue>,
    pub running_sounds: HashSet<i32>,
    pub queued_sounds: Vec<i32>,
    pub stopped_sounds: Vec<i32>,
    pub cursor_images: Vec<(i32, bool)>,
    pub charset: Option<i32>,
    pub charset_colors: Vec<u8>,
    pub blocked: HashSet<WaitCondition>,
    pub events: Vec<VmEvent>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: AssetKey, bytes: impl Into<Vec<u8>>) {
        self.assets.insert(key, Arc::from(bytes.into()));
    }

    pub fn faults(&self) -> Vec<&ScriptFault> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VmEvent::Fault(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

impl Host for MemoryHost {
    fn request_asset(&mut self, key: &AssetKey) -> Option<Arc<[u8]>> {
        self.assets.get(key).cloned()
    }

    fn start_sound(&mut self, id: i32) {
        self.running_sounds.insert(id);
    }

    fn queue_sound(&mut self, id: i32) {
        self.queued_sounds.push(id);
        self.running_sounds.insert(id);
    }

    fn stop_sound(&mut self, id: i32) {
        self.stopped_sounds.push(id);
        self.running_sounds.remove(&id);
    }

    fn is_sound_running(&mut self, id: i32) -> bool {
        self.running_sounds.contains(&id)
    }

    fn set_cursor_image(&mut self, image: i32, inventory_state: bool) {
        self.cursor_images.push((image, inventory_state));
    }

    fn set_charset(&mut self, id: i32) {
        self.charset = Some(id);
    }

    fn set_charset_colors(&mut self, colors: &[u8]) {
        self.charset_colors = colors.to_vec();
    }

    fn read_ini(&mut self, key: &IniKey) -> Option<IniValue> {
        self.ini.get(key).cloned()
    }

    fn write_ini(&mut self, key: &IniKey, value: IniValue) {
        self.ini.insert(key.clone(), value);
    }

    fn wait_done(&mut self, cond: WaitCondition) -> bool {
        !self.blocked.contains(&cond)
    }

    fn event(&mut self, event: VmEvent) {
        self.events.push(event);
    }
}
