//! Wire and domain types shared across the fleet backend.
//!
//! Nothing in this crate performs I/O. It holds the shapes the rest of the
//! workspace agrees on: JIDs, phone normalization, pairing-code formatting,
//! the template interpreter, the disconnect-code taxonomy, and the HTTP
//! error envelope.

pub mod disconnect;
pub mod envelope;
pub mod jid;
pub mod pairing;
pub mod phone;
pub mod template;

pub use disconnect::DisconnectReason;
pub use envelope::HttpErrorEnvelope;
pub use jid::Jid;
pub use pairing::format_pairing_code;
pub use phone::{normalize_phone, PhoneError};
pub use template::{RewriteContext, Template, TemplateError};
