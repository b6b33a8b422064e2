//! Data model shared by the store, the reconciler and the API clients.
//!
//! Wire names are camelCase to match the inbox backend and the realtime
//! payloads.

pub mod conversation;
pub mod message;
pub mod template;

pub use conversation::{Conversation, PriceInfo, Reaction};
pub use message::{
    Direction, InteractiveData, InteractiveKind, ListRow, ListSection, MediaType, Message,
    MessageStatus, MessageType, OutgoingContent, ReplyButton, TEMP_ID_PREFIX, is_temp_id,
    new_client_temp_id,
};
pub use template::{ComponentKind, MessageTemplate, TemplateButton, TemplateComponent, TemplateSend};

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod tests;
