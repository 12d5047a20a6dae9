//! Boundaries to external services, kept behind traits so the pipeline can
//! run against fakes in tests.

pub mod mail;
pub mod model;

pub use mail::{MailAttachment, MailError, MailGateway, MailMessage, ResendMailer};
pub use model::{ChatPrompt, ModelCallError, ModelGateway, OpenAiChatClient};
