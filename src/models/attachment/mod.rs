pub mod attachment_meta;
pub mod attachment_row;
