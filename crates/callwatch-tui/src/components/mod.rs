pub mod header;
pub mod help_overlay;
pub mod transcript_list;
