//! Client for the Zabbix JSON-RPC management API.
//!
//! [`client`] carries the wire plumbing (envelope, authentication, one typed
//! Get/Create/Update/DeleteByIds family per object kind); [`types`] carries
//! the object model with the string-tolerant numeric codecs the server's
//! responses require.

pub mod client;
pub mod types;

pub use client::{HttpTransport, Transport, ZabbixClient};
pub use types::{
    Host, HostGroup, HostGroupRef, HostInterface, HostRef, Item, ItemPrototype, LldCondition,
    LldFilter, LldRule, Macro, Template, TemplateRef, Trigger, TriggerFunction, TriggerPrototype,
    TriggerRef,
};
