pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    list_chapters_handler, mark_chapter_read_handler, next_chapter_handler,
    unlock_chapter_handler,
};
