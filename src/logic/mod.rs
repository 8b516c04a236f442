mod digest;
pub mod ssh_encoding;

pub use digest::signing_input;
pub use ssh_encoding::{SshReader, SshWriter};
