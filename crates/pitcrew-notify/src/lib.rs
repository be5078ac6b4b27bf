//! # Pitcrew Notify
//!
//! Groups due maintenance tasks per owner, builds one consolidated email with
//! signed one-click action links, and delivers it through the [`Mailer`]
//! collaborator.
//!
//! [`Mailer`]: pitcrew_core::Mailer

pub mod coordinator;
pub mod email;
pub mod token;

pub use coordinator::NotificationCoordinator;
pub use email::SmtpMailer;
pub use token::{TokenAction, TokenClaims, TokenSigner};
