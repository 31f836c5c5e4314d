pub mod message_row;
pub mod message_summary;
pub mod new_message;
pub mod stored_message;
