pub mod extracted_content;
