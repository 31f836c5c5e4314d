pub mod failed_message;
