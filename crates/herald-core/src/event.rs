//! Event definitions
//!
//! Every gateway event has a shape (a payload struct) and a stable tag, the
//! gateway's own event name. [`Event`] is the tagged union over all shapes;
//! [`EventCatalog`] maps tag names back to constructors and decoders so that
//! events arriving as raw payloads can be rebuilt.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    ChannelId, Guild, GuildId, HeraldError, HeraldResult, Member, Message, MessageId, Role,
    RoleId, User, UserId,
};

/// Stable identifier of an event shape
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTag(&'static str);

impl EventTag {
    /// Matches every event regardless of shape
    pub const ANY: EventTag = EventTag("__ANY__");

    pub const fn new(name: &'static str) -> Self {
        EventTag(name)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        self.0
    }

    #[inline]
    pub fn is_any(self) -> bool {
        self == EventTag::ANY
    }
}

impl fmt::Debug for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A payload type that can travel as an [`Event`]
pub trait EventShape: DeserializeOwned + Default + Clone + Send + Sync + 'static {
    const TAG: EventTag;

    fn from_event(event: &Event) -> Option<&Self>;

    fn into_event(self) -> Event;
}

/// Synthetic: the gateway connection came up
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Connect {}

/// Synthetic: the gateway connection went away
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Disconnect {}

/// Initial state after identifying
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    #[serde(rename = "v", default)]
    pub version: i32,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<Guild>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildCreate {
    #[serde(flatten)]
    pub guild: Guild,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildUpdate {
    #[serde(flatten)]
    pub guild: Guild,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildDelete {
    #[serde(flatten)]
    pub guild: Guild,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleCreate {
    pub guild_id: GuildId,
    pub role: Role,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleUpdate {
    pub guild_id: GuildId,
    pub role: Role,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: GuildId,
    pub role_id: RoleId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCreate {
    #[serde(flatten)]
    pub message: Message,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user: User,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypingStart {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub timestamp: i64,
}

macro_rules! gateway_events {
    ($($shape:ident => $tag:literal),+ $(,)?) => {
        /// A decoded gateway event
        #[derive(Clone, Debug, PartialEq)]
        pub enum Event {
            $($shape($shape),)+
        }

        impl Event {
            /// Tag of this event's shape
            pub fn tag(&self) -> EventTag {
                match self {
                    $(Event::$shape(_) => <$shape as EventShape>::TAG,)+
                }
            }
        }

        $(
            impl EventShape for $shape {
                const TAG: EventTag = EventTag($tag);

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$shape(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_event(self) -> Event {
                    Event::$shape(self)
                }
            }

            impl From<$shape> for Event {
                fn from(inner: $shape) -> Self {
                    Event::$shape(inner)
                }
            }
        )+

        impl EventCatalog {
            /// Catalog of every shape this crate knows about
            pub fn standard() -> Self {
                let mut catalog = EventCatalog::empty();
                $(catalog.register::<$shape>();)+
                catalog
            }
        }
    };
}

gateway_events! {
    Connect => "__CONNECT__",
    Disconnect => "__DISCONNECT__",
    Ready => "READY",
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageDelete => "MESSAGE_DELETE",
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",
}

fn empty_event<T: EventShape>() -> Event {
    T::default().into_event()
}

fn decode_event<T: EventShape>(payload: &[u8]) -> serde_json::Result<Event> {
    serde_json::from_slice::<T>(payload).map(T::into_event)
}

/// Constructor and decoder for one event shape
#[derive(Clone, Copy)]
pub struct EventProvider {
    tag: EventTag,
    new: fn() -> Event,
    decode: fn(&[u8]) -> serde_json::Result<Event>,
}

impl EventProvider {
    pub fn of<T: EventShape>() -> Self {
        EventProvider {
            tag: T::TAG,
            new: empty_event::<T>,
            decode: decode_event::<T>,
        }
    }

    pub fn tag(&self) -> EventTag {
        self.tag
    }

    /// A fresh, empty value of this shape
    pub fn new_event(&self) -> Event {
        (self.new)()
    }

    /// Decode a JSON payload into this shape
    pub fn decode(&self, payload: &[u8]) -> HeraldResult<Event> {
        (self.decode)(payload).map_err(|e| HeraldError::Decode {
            tag: self.tag.as_str().to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for EventProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventProvider").field("tag", &self.tag).finish()
    }
}

/// Tag name to provider lookup
///
/// Built once when a session starts and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct EventCatalog {
    providers: HashMap<&'static str, EventProvider>,
}

impl EventCatalog {
    pub fn empty() -> Self {
        EventCatalog::default()
    }

    /// Register a shape. The first registration of a tag wins.
    pub fn register<T: EventShape>(&mut self) {
        self.register_provider(EventProvider::of::<T>());
    }

    pub fn register_provider(&mut self, provider: EventProvider) {
        self.providers
            .entry(provider.tag.as_str())
            .or_insert(provider);
    }

    pub fn get(&self, name: &str) -> Option<&EventProvider> {
        self.providers.get(name)
    }

    /// Resolve a shape name to its tag. The wildcard resolves to itself.
    pub fn tag_for(&self, name: &str) -> Option<EventTag> {
        if name == EventTag::ANY.as_str() {
            return Some(EventTag::ANY);
        }
        self.providers.get(name).map(|p| p.tag)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn new_event(&self, name: &str) -> Option<Event> {
        self.providers.get(name).map(|p| p.new_event())
    }

    pub fn decode(&self, name: &str, payload: &[u8]) -> HeraldResult<Event> {
        self.providers
            .get(name)
            .ok_or_else(|| HeraldError::UnknownEventType(name.to_string()))?
            .decode(payload)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = EventTag> + '_ {
        self.providers.values().map(|p| p.tag)
    }
}

/// Internal state hook run before any user handler sees an event
pub trait StateUpdate: Send + Sync {
    fn apply(&self, event: &Event) -> HeraldResult<()>;
}
