mod backend;
mod codec;
mod file;
mod github;
mod history;
mod sync;

pub use backend::Backend;
pub use codec::{decode, encode, DataFormat};
pub use history::{AppendMode, History};
pub use sync::commit_with_retry;
