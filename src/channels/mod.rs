//! Versioned channel storage backing [`crate::state::VersionedState`].
//!
//! Each channel wraps a collection (a `Vec<T>` for append-only channels, a
//! `FxHashMap<String, Value>` for the free-form `extra` channel) together
//! with a monotonically increasing version counter. Reducers bump the
//! version only when a merge actually changes the collection; the scheduler
//! uses the version to decide whether a node needs to re-run.

pub mod errors;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::reason_card::ReasonCard;
use crate::types::ChannelType;
pub use errors::{ErrorEvent, ErrorScope, LadderError};

/// Common interface implemented by every channel kind.
pub trait Channel {
    /// The collection type this channel stores (`Vec<T>` or a map).
    type Item;

    fn get_channel_type(&self) -> ChannelType;
    fn version(&self) -> u32;
    fn set_version(&mut self, version: u32);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Whether this channel's contents should survive a checkpoint/restore
    /// round trip. All channels in this crate are persistent; the flag
    /// exists so future transient (in-memory-only) channels can opt out.
    fn persistent(&self) -> bool {
        true
    }
    fn get_mut(&mut self) -> &mut Self::Item;
    fn snapshot(&self) -> Self::Item;
}

macro_rules! vec_channel {
    ($name:ident, $item:ty, $kind:expr) => {
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
        pub struct $name {
            #[serde(default)]
            items: Vec<$item>,
            #[serde(default = "default_version")]
            version: u32,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    items: Vec::new(),
                    version: 1,
                }
            }
        }

        impl $name {
            pub fn new(items: Vec<$item>, version: u32) -> Self {
                Self { items, version }
            }
        }

        impl Channel for $name {
            type Item = Vec<$item>;

            fn get_channel_type(&self) -> ChannelType {
                $kind
            }
            fn version(&self) -> u32 {
                self.version
            }
            fn set_version(&mut self, version: u32) {
                self.version = version;
            }
            fn len(&self) -> usize {
                self.items.len()
            }
            fn get_mut(&mut self) -> &mut Vec<$item> {
                &mut self.items
            }
            fn snapshot(&self) -> Vec<$item> {
                self.items.clone()
            }
        }
    };
}

fn default_version() -> u32 {
    1
}

vec_channel!(MessagesChannel, Message, ChannelType::Message);
vec_channel!(ErrorsChannel, ErrorEvent, ChannelType::Error);
vec_channel!(ReasonCardsChannel, ReasonCard, ChannelType::ReasonCard);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtrasChannel {
    #[serde(default)]
    map: FxHashMap<String, Value>,
    #[serde(default = "default_version")]
    version: u32,
}

impl Default for ExtrasChannel {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            version: 1,
        }
    }
}

impl ExtrasChannel {
    pub fn new(map: FxHashMap<String, Value>, version: u32) -> Self {
        Self { map, version }
    }
}

impl Channel for ExtrasChannel {
    type Item = FxHashMap<String, Value>;

    fn get_channel_type(&self) -> ChannelType {
        ChannelType::Extra
    }
    fn version(&self) -> u32 {
        self.version
    }
    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
    fn len(&self) -> usize {
        self.map.len()
    }
    fn get_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.map
    }
    fn snapshot(&self) -> FxHashMap<String, Value> {
        self.map.clone()
    }
}

