//! Repositories over the allocator tables.
//!
//! Every function takes the caller's `&mut SqliteConnection`, normally
//! borrowed from a [`crate::StoreTx`].

pub mod fcp;
pub mod template;
pub mod template_fcp;
pub mod template_sp;

pub use fcp::FcpRepository;
pub use template::TemplateRepository;
pub use template_fcp::TemplateFcpRepository;
pub use template_sp::TemplateSpRepository;
