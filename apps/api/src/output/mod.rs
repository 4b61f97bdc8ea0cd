// Output boundary: Markdown is produced in-process; PDF rendering and export are
// delegated to external collaborators behind traits.

pub mod export;
pub mod handlers;
pub mod markdown;
pub mod render;
